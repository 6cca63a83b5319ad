#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, Mutex};

use naimlink_client::config::ClientConfig;
use naimlink_client::transport::{
    halves, ConnectionHalves, Connector, StreamReader, StreamWriter, TransportReader,
    TransportWriter,
};
use naimlink_core::error::{NaimError, Result};

struct Scripted {
    stream: DuplexStream,
    writes_before_failure: Option<usize>,
}

/// Queue of connections the next `connect` calls will return.
pub struct Streams(mpsc::UnboundedSender<Scripted>);

impl Streams {
    pub fn send(&self, stream: DuplexStream) -> std::result::Result<(), &'static str> {
        self.push(stream, None)
    }

    /// Connection whose writer fails once `writes` sends went through.
    pub fn send_failing_after(
        &self,
        stream: DuplexStream,
        writes: usize,
    ) -> std::result::Result<(), &'static str> {
        self.push(stream, Some(writes))
    }

    fn push(
        &self,
        stream: DuplexStream,
        writes_before_failure: Option<usize>,
    ) -> std::result::Result<(), &'static str> {
        self.0
            .send(Scripted {
                stream,
                writes_before_failure,
            })
            .map_err(|_| "connector dropped")
    }
}

/// Hands out pre-made in-memory connections, one per `connect` call.
pub struct ScriptedConnector {
    streams: Mutex<mpsc::UnboundedReceiver<Scripted>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new() -> (Arc<Self>, Streams) {
        let (tx, rx) = mpsc::unbounded_channel();
        let c = Arc::new(Self {
            streams: Mutex::new(rx),
            attempts: AtomicUsize::new(0),
        });
        (c, Streams(tx))
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<ConnectionHalves> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .streams
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| NaimError::Transport("no more scripted connections".into()))?;
        let (r, w) = tokio::io::split(scripted.stream);
        match scripted.writes_before_failure {
            None => Ok(halves(r, w, 2000)),
            Some(remaining) => {
                let reader: Box<dyn TransportReader> = Box::new(StreamReader::new(r, 2000));
                let writer: Box<dyn TransportWriter> = Box::new(FailingWriter {
                    inner: StreamWriter::new(w),
                    remaining,
                });
                Ok((reader, writer))
            }
        }
    }
}

/// Writer that breaks after a fixed number of sends; the read side stays open.
struct FailingWriter<W> {
    inner: StreamWriter<W>,
    remaining: usize,
}

#[async_trait]
impl<W> TransportWriter for FailingWriter<W>
where
    W: tokio::io::AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.remaining == 0 {
            return Err(NaimError::Transport("broken pipe".into()));
        }
        self.remaining -= 1;
        self.inner.send(data).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

pub fn config(heartbeat_secs: Option<u64>) -> ClientConfig {
    let mut cfg = ClientConfig::for_address("127.0.0.1");
    cfg.session.heartbeat_timeout_secs = heartbeat_secs;
    cfg
}

/// Device side of one in-memory connection.
pub struct Device {
    io: DuplexStream,
    buf: String,
}

/// Returns (client end, device end).
pub fn pair() -> (DuplexStream, Device) {
    let (client, device) = tokio::io::duplex(64 * 1024);
    (
        client,
        Device {
            io: device,
            buf: String::new(),
        },
    )
}

impl Device {
    /// Next complete `<command>` element, or `None` once the client closed.
    pub async fn next_command(&mut self) -> Option<Command> {
        loop {
            if let Some(end) = complete_command_end(&self.buf) {
                let start = self.buf.find("<command").unwrap();
                let raw = self.buf[start..end].to_string();
                self.buf.drain(..end);
                return Some(Command { raw });
            }
            let mut chunk = [0u8; 4096];
            let n = self.io.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            self.buf.push_str(std::str::from_utf8(&chunk[..n]).unwrap());
        }
    }

    pub async fn commands(&mut self, n: usize) -> Vec<Command> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next_command().await.expect("connection closed early"));
        }
        out
    }

    pub async fn send(&mut self, text: &str) {
        self.io.write_all(text.as_bytes()).await.unwrap();
    }

    /// Deliver inner lines through a `TunnelFromHost` event.
    pub async fn send_tunnel(&mut self, inner: &str) {
        let ev = format!(
            r#"<event name="TunnelFromHost"><map><item name="data" base64="{}"/></map></event>"#,
            STANDARD.encode(inner)
        );
        self.send(&ev).await;
    }
}

fn complete_command_end(buf: &str) -> Option<usize> {
    let start = buf.find("<command")?;
    let rest = &buf[start..];
    let gt = rest.find('>')?;
    if rest[..=gt].ends_with("/>") {
        return Some(start + gt + 1);
    }
    let close = "</command>";
    rest.find(close).map(|p| start + p + close.len())
}

#[derive(Debug, Clone)]
pub struct Command {
    pub raw: String,
}

impl Command {
    fn attr(&self, key: &str) -> Option<String> {
        let needle = format!(" {key}=\"");
        let at = self.raw.find(&needle)? + needle.len();
        let end = self.raw[at..].find('"')?;
        Some(self.raw[at..at + end].to_string())
    }

    pub fn name(&self) -> String {
        self.attr("name").unwrap()
    }

    pub fn id(&self) -> u64 {
        self.attr("id").unwrap().parse().unwrap()
    }

    /// (type tag, raw attribute text) of a named item.
    pub fn item(&self, key: &str) -> Option<(String, String)> {
        let needle = format!("<item name=\"{key}\" ");
        let at = self.raw.find(&needle)? + needle.len();
        let rest = &self.raw[at..];
        let eq = rest.find("=\"")?;
        let tag = rest[..eq].to_string();
        let val_start = eq + 2;
        let val_end = rest[val_start..].find('"')?;
        Some((tag, rest[val_start..val_start + val_end].to_string()))
    }

    /// Decoded inner command of a `TunnelToHost`.
    pub fn tunnel_text(&self) -> Option<String> {
        let (tag, v) = self.item("data")?;
        assert_eq!(tag, "base64");
        String::from_utf8(STANDARD.decode(v).ok()?).ok()
    }
}
