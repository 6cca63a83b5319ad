//! Connection supervisor.
//!
//! One task owns the whole connect / handshake / run / reconnect cycle:
//! - connect through the `Connector` (raced against stop)
//! - replay the handshake on every (re)connect
//! - run the receive loop and the heartbeat side by side
//! - on end-of-stream, read error or any failed write: tear down and retry
//!
//! Stop is observed at the next suspension point of either loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use naimlink_core::error::{NaimError, Result};
use naimlink_core::heartbeat::HeartbeatSchedule;
use naimlink_core::protocol::{MessageKind, OuterFramer, OutgoingCommand};

use crate::config::SessionSection;
use crate::device_state::DeviceState;
use crate::dispatch::Dispatcher;
use crate::session::{heartbeat, Outbox, SessionCtx};
use crate::transport::{Connector, TransportReader};

/// Published connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Running,
    Reconnecting,
    ShuttingDown,
    Stopped,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Running => "running",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::ShuttingDown => "shutting_down",
            ConnectionState::Stopped => "stopped",
        }
    }
}

/// Runtime knobs taken from the `session` config section.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub heartbeat: Option<Duration>,
    pub reconnect_delay: Duration,
    pub max_message_bytes: usize,
}

impl SessionSettings {
    pub fn from_config(s: &SessionSection) -> Self {
        Self {
            heartbeat: s.heartbeat_timeout(),
            reconnect_delay: s.reconnect_delay(),
            max_message_bytes: s.max_message_bytes,
        }
    }
}

/// Commands sent right after every successful connect.
pub fn handshake_commands(heartbeat: Option<Duration>) -> Vec<OutgoingCommand> {
    let mut cmds = vec![
        OutgoingCommand::new("RequestAPIVersion")
            .string("module", "NAIM")
            .string("version", "1"),
        OutgoingCommand::new("GetBridgeCoAppVersions"),
    ];
    if let Some(t) = heartbeat {
        let secs = i64::try_from(t.as_secs()).unwrap_or(i64::MAX);
        cmds.push(OutgoingCommand::new("SetHeartbeatTimeout").int("timeout", secs));
    }
    cmds
}

enum Exit {
    Stop,
    Lost(NaimError),
}

pub struct Supervisor {
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) state: DeviceState,
    pub(crate) outbox: Arc<Outbox>,
    pub(crate) settings: SessionSettings,
    pub(crate) conn_tx: Arc<watch::Sender<ConnectionState>>,
}

impl Supervisor {
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u64 = 0;
        self.publish(ConnectionState::Connecting);

        loop {
            attempt += 1;

            let connected = tokio::select! {
                r = self.connector.connect() => r,
                _ = wait_for_stop(&mut shutdown) => break,
            };

            let exit = match connected {
                Ok((reader, writer)) => {
                    tracing::info!(attempt, "connected");
                    self.outbox.attach(writer).await;
                    let exit = self.run_connection(reader, &mut shutdown).await;
                    self.outbox.detach().await;
                    exit
                }
                Err(e) => Exit::Lost(e),
            };

            match exit {
                Exit::Stop => break,
                Exit::Lost(e) => {
                    tracing::warn!(code = e.kind().as_str(), error = %e, "connection lost");
                    let current = *self.conn_tx.borrow();
                    if current != ConnectionState::Reconnecting {
                        self.publish(ConnectionState::Reconnecting);
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                _ = wait_for_stop(&mut shutdown) => break,
            }
        }

        self.publish(ConnectionState::ShuttingDown);
        self.outbox.detach().await;
        self.publish(ConnectionState::Stopped);
        tracing::info!("session stopped");
    }

    async fn run_connection(
        &self,
        mut reader: Box<dyn TransportReader>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Exit {
        let ctx = SessionCtx::new(
            self.state.clone(),
            Arc::clone(&self.outbox),
            Arc::clone(&self.dispatcher),
        );
        let mut write_failures = self.outbox.watch_write_failures();

        for cmd in handshake_commands(self.settings.heartbeat) {
            if let Err(e) = self.outbox.send(&cmd).await {
                return Exit::Lost(e);
            }
        }
        self.publish(ConnectionState::Running);

        let mut framer = OuterFramer::with_limit(self.settings.max_message_bytes);
        let receive = receive_loop(reader.as_mut(), &mut framer, &ctx);
        let keepalive = async {
            match self.settings.heartbeat {
                Some(t) => heartbeat::run(&self.outbox, HeartbeatSchedule::new(t)).await,
                None => std::future::pending::<Result<()>>().await,
            }
        };

        let ended = tokio::select! {
            r = receive => r,
            r = keepalive => r,
            _ = write_failed(&mut write_failures) => {
                Err(NaimError::Transport("write to device failed".into()))
            }
            _ = wait_for_stop(shutdown) => return Exit::Stop,
        };
        Exit::Lost(match ended {
            Err(e) => e,
            Ok(()) => NaimError::Internal("session loop ended without error".into()),
        })
    }

    fn publish(&self, s: ConnectionState) {
        tracing::debug!(state = s.as_str(), "connection state");
        self.conn_tx.send_replace(s);
    }
}

/// Read, frame and dispatch until the stream ends or fails.
async fn receive_loop(
    reader: &mut dyn TransportReader,
    framer: &mut OuterFramer,
    ctx: &SessionCtx,
) -> Result<()> {
    loop {
        let Some(chunk) = reader.receive().await? else {
            return Err(NaimError::Transport("connection closed by device".into()));
        };
        framer.feed(&chunk);

        for item in framer.read_messages() {
            let msg = match item {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(code = e.kind().as_str(), error = %e, "outer element dropped");
                    continue;
                }
            };
            if msg.kind == MessageKind::Reply {
                tracing::debug!(name = %msg.name, id = ?msg.correlation_id, "reply");
            }
            if let Err(e) = ctx.dispatcher.dispatch_outer(ctx, &msg).await {
                tracing::warn!(
                    name = %msg.name,
                    code = e.kind().as_str(),
                    error = %e,
                    "outer handler failed"
                );
            }
        }
    }
}

/// Resolves on the next failed write; never if the outbox is gone.
async fn write_failed(rx: &mut watch::Receiver<u64>) {
    if rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolves once stop was requested or the client handle is gone.
pub(crate) async fn wait_for_stop(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop || rx.changed().await.is_err() {
            return;
        }
    }
}
