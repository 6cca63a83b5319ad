//! Byte transport seam.
//!
//! The session only needs "read some bytes", "write these bytes" and "open a
//! new connection". TCP is the production implementation; tests plug in
//! in-memory duplex streams through the same traits.

pub mod tcp;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use naimlink_core::error::Result;

pub use tcp::TcpConnector;

/// Receiving half of a connection.
#[async_trait]
pub trait TransportReader: Send {
    /// Next chunk of bytes, or `None` once the peer closed the stream.
    async fn receive(&mut self) -> Result<Option<Bytes>>;
}

/// Sending half of a connection.
#[async_trait]
pub trait TransportWriter: Send {
    async fn send(&mut self, data: &[u8]) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

pub type ConnectionHalves = (Box<dyn TransportReader>, Box<dyn TransportWriter>);

/// Opens connections to the device. Called again on every reconnect.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<ConnectionHalves>;
}

/// Reader over any `AsyncRead`, one bounded read per call.
pub struct StreamReader<R> {
    inner: R,
    chunk: usize,
}

impl<R> StreamReader<R> {
    pub fn new(inner: R, chunk: usize) -> Self {
        Self {
            inner,
            chunk: chunk.max(1),
        }
    }
}

#[async_trait]
impl<R> TransportReader for StreamReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(self.chunk);
        let n = self.inner.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf.freeze()))
    }
}

/// Writer over any `AsyncWrite`; each send is written whole and flushed.
pub struct StreamWriter<W> {
    inner: W,
}

impl<W> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> TransportWriter for StreamWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Wrap any split stream as transport halves.
pub fn halves<R, W>(reader: R, writer: W, chunk: usize) -> ConnectionHalves
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    (
        Box::new(StreamReader::new(reader, chunk)),
        Box::new(StreamWriter::new(writer)),
    )
}
