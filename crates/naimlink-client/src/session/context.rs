use std::sync::{Arc, Mutex};

use naimlink_core::error::{NaimError, Result};
use naimlink_core::protocol::NvmFramer;

use crate::device_state::DeviceState;
use crate::dispatch::Dispatcher;
use crate::session::Outbox;

/// Everything a handler may touch while one connection is up.
///
/// Built fresh for every connection so inner-line reassembly never carries
/// bytes across a reconnect. State and outbox outlive it.
pub struct SessionCtx {
    pub state: DeviceState,
    pub outbox: Arc<Outbox>,
    pub dispatcher: Arc<Dispatcher>,
    nvm_framer: Mutex<NvmFramer>,
}

impl SessionCtx {
    pub fn new(state: DeviceState, outbox: Arc<Outbox>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            state,
            outbox,
            dispatcher,
            nvm_framer: Mutex::new(NvmFramer::new()),
        }
    }

    /// Feed tunnel bytes and take every completed line.
    pub fn push_tunnel_bytes(&self, data: &[u8]) -> Result<Vec<Result<String>>> {
        let mut framer = self
            .nvm_framer
            .lock()
            .map_err(|_| NaimError::Internal("nvm framer lock poisoned".into()))?;
        Ok(framer.push(data))
    }

    /// Bytes of an unfinished inner line, if any.
    pub fn pending_tunnel_bytes(&self) -> usize {
        self.nvm_framer.lock().map(|f| f.pending().len()).unwrap_or(0)
    }
}
