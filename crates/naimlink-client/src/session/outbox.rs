use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::{watch, Mutex as AsyncMutex};

use naimlink_core::error::{NaimError, Result};
use naimlink_core::protocol::{CommandEncoder, OutgoingCommand, TunnelCodec};

use crate::transport::TransportWriter;

/// Single outbound path shared by the application, handlers and the
/// heartbeat.
///
/// The writer lock is held across encode + write, so ids reach the wire in
/// increasing order. The id and `last_send` are taken at encode time, so a
/// command whose write fails still uses up its id.
///
/// A failed write drops the writer and bumps a failure counter the
/// supervisor watches to tear the connection down.
pub struct Outbox {
    encoder: Mutex<CommandEncoder>,
    writer: AsyncMutex<Option<Box<dyn TransportWriter>>>,
    write_failures: watch::Sender<u64>,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            encoder: Mutex::new(CommandEncoder::new()),
            writer: AsyncMutex::new(None),
            write_failures: watch::channel(0).0,
        }
    }

    /// Encode and write one command; returns its correlation id.
    pub async fn send(&self, cmd: &OutgoingCommand) -> Result<u64> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(NaimError::NotConnected)?;

        let (bytes, id) = {
            let mut enc = self.encoder()?;
            enc.encode_at(cmd, tokio::time::Instant::now().into_std())
        };

        let sent = writer.send(&bytes).await;
        if let Err(e) = sent {
            tracing::warn!(command = cmd.name(), id, error = %e, "send failed; dropping writer");
            *guard = None;
            self.write_failures.send_modify(|n| *n += 1);
            return Err(e);
        }
        tracing::debug!(command = cmd.name(), id, "sent");
        Ok(id)
    }

    /// Send an NVM command through the tunnel (`*NVM ` is prepended).
    pub async fn send_nvm(&self, command: &str) -> Result<u64> {
        self.send(&TunnelCodec::encode_nvm(command)).await
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.encoder().ok().and_then(|e| e.last_send())
    }

    /// Number of correlation ids handed out over the client's lifetime.
    pub fn issued(&self) -> u64 {
        self.encoder().map(|e| e.issued()).unwrap_or(0)
    }

    /// Receiver that changes on every failed write from now on.
    pub fn watch_write_failures(&self) -> watch::Receiver<u64> {
        self.write_failures.subscribe()
    }

    pub async fn is_attached(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    pub async fn attach(&self, writer: Box<dyn TransportWriter>) {
        *self.writer.lock().await = Some(writer);
    }

    /// Remove and close the current writer, if any.
    pub async fn detach(&self) {
        let taken = self.writer.lock().await.take();
        if let Some(mut w) = taken {
            if let Err(e) = w.close().await {
                tracing::debug!(error = %e, "writer close failed");
            }
        }
    }

    fn encoder(&self) -> Result<std::sync::MutexGuard<'_, CommandEncoder>> {
        self.encoder
            .lock()
            .map_err(|_| NaimError::Internal("command encoder lock poisoned".into()))
    }
}
