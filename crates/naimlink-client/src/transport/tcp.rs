use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpStream;

use naimlink_core::error::{NaimError, Result};

use super::{halves, ConnectionHalves, Connector};

/// Plain TCP connection to the device control port.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: SocketAddr,
    read_chunk: usize,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr, read_chunk: usize) -> Self {
        Self { addr, read_chunk }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<ConnectionHalves> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|e| NaimError::Transport(format!("connect {} failed: {e}", self.addr)))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "set_nodelay failed");
        }
        let (r, w) = stream.into_split();
        Ok(halves(r, w, self.read_chunk))
    }
}
