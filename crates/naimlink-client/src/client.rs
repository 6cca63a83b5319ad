//! Application-facing client handle.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use naimlink_core::error::{NaimError, Result};
use naimlink_core::protocol::{OutgoingCommand, Param};

use crate::config::{ClientConfig, Power, StartupActions};
use crate::device_state::DeviceState;
use crate::dispatch::Dispatcher;
use crate::handlers;
use crate::session::{ConnectionState, Outbox, SessionSettings, Supervisor};
use crate::transport::{Connector, TcpConnector};

/// Inner queries issued by `refresh`.
const REFRESH_QUERIES: [&str; 10] = [
    "GETPRODUCT",
    "GETSERIALNUM",
    "GETROOMNAME",
    "GETSTANDBYSTATUS",
    "GETVOL",
    "GETINPUT",
    "GETVIEWSTATE",
    "GETBRIEFNP",
    "GETTOTALPRESETS",
    "GETTOTALINPUTS",
];

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Connection to one device.
///
/// `start` spawns the supervisor, which keeps reconnecting until `stop`.
/// Commands issued while no connection is up fail with `NotConnected`.
pub struct NaimClient {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    state: DeviceState,
    outbox: Arc<Outbox>,
    conn_tx: Arc<watch::Sender<ConnectionState>>,
    running: Mutex<Option<Running>>,
}

impl NaimClient {
    /// TCP client for the configured address. Fails on an invalid config.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let connector = TcpConnector::new(config.socket_addr()?, config.session.read_chunk_bytes);
        Self::with_connector(config, Arc::new(connector))
    }

    /// Client over a caller-supplied transport.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::new());
        handlers::register_builtin(&dispatcher);
        let (conn_tx, _rx) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            config,
            connector,
            dispatcher,
            state: DeviceState::new(),
            outbox: Arc::new(Outbox::new()),
            conn_tx: Arc::new(conn_tx),
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Handler registry; extra handlers may be registered before `start`.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(NaimError::Lifecycle("client already started".into()));
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let supervisor = Supervisor {
            connector: Arc::clone(&self.connector),
            dispatcher: Arc::clone(&self.dispatcher),
            state: self.state.clone(),
            outbox: Arc::clone(&self.outbox),
            settings: SessionSettings::from_config(&self.config.session),
            conn_tx: Arc::clone(&self.conn_tx),
        };
        let task = tokio::spawn(supervisor.run(shutdown_rx));
        *running = Some(Running { shutdown, task });
        tracing::info!(
            address = %self.config.device.address,
            port = self.config.device.port,
            "client started"
        );
        Ok(())
    }

    /// Request shutdown and wait for the supervisor to close the transport.
    pub async fn stop(&self) -> Result<()> {
        let Some(Running { shutdown, task }) = self.running.lock().await.take() else {
            return Err(NaimError::Lifecycle("client not started".into()));
        };
        let _ = shutdown.send(true);
        task.await
            .map_err(|e| NaimError::Internal(format!("supervisor task failed: {e}")))
    }

    /// Shared state handle (read-only for the application).
    pub fn device_state(&self) -> DeviceState {
        self.state.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.conn_tx.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.conn_tx.subscribe()
    }

    /// Wait until the handshake of the current connection has been sent.
    pub async fn wait_until_running(&self) -> Result<()> {
        let mut rx = self.watch_connection();
        loop {
            let current = *rx.borrow_and_update();
            match current {
                ConnectionState::Running => return Ok(()),
                ConnectionState::Stopped => {
                    return Err(NaimError::Lifecycle("client stopped".into()))
                }
                _ => {}
            }
            rx.changed()
                .await
                .map_err(|_| NaimError::Lifecycle("client dropped".into()))?;
        }
    }

    /// Number of commands sent since the client was created.
    pub fn commands_sent(&self) -> u64 {
        self.outbox.issued()
    }

    pub async fn send(&self, cmd: &OutgoingCommand) -> Result<u64> {
        self.outbox.send(cmd).await
    }

    /// Send an outer command with named, typed parameters.
    pub async fn send_command<I, K>(&self, name: &str, params: I) -> Result<u64>
    where
        I: IntoIterator<Item = (K, Param)>,
        K: Into<String>,
    {
        let cmd = params
            .into_iter()
            .fold(OutgoingCommand::new(name), |c, (k, v)| c.param(k, v));
        self.outbox.send(&cmd).await
    }

    /// Send an inner command (`GOTOPRESET 3`) through the tunnel.
    pub async fn send_nvm(&self, command: &str) -> Result<u64> {
        self.outbox.send_nvm(command).await
    }

    pub async fn on(&self) -> Result<u64> {
        self.send_nvm("SETSTANDBY OFF").await
    }

    pub async fn off(&self) -> Result<u64> {
        self.send_nvm("SETSTANDBY ON").await
    }

    pub async fn select_preset(&self, preset: u32) -> Result<u64> {
        if preset == 0 {
            return Err(NaimError::InvalidValue("presets are numbered from 1".into()));
        }
        self.send_nvm(&format!("GOTOPRESET {preset}")).await
    }

    pub async fn select_input(&self, input: &str) -> Result<u64> {
        let input = input.trim();
        if input.is_empty() || input.contains(char::is_whitespace) {
            return Err(NaimError::InvalidValue(format!("bad input name `{input}`")));
        }
        self.send_nvm(&format!("SETINPUT {input}")).await
    }

    pub async fn set_volume(&self, volume: u32) -> Result<u64> {
        if volume > 100 {
            return Err(NaimError::InvalidValue(format!("volume {volume} above 100")));
        }
        self.send_nvm(&format!("SETRVOL {volume}")).await
    }

    pub async fn request_now_playing(&self) -> Result<u64> {
        self.send(&OutgoingCommand::new("GetNowPlaying")).await
    }

    pub async fn request_view_state(&self) -> Result<u64> {
        self.send(&OutgoingCommand::new("GetViewState")).await
    }

    pub async fn request_active_list(&self) -> Result<u64> {
        self.send(&OutgoingCommand::new("GetActiveList")).await
    }

    /// Power, source and volume from the config's `startup` section, in that order.
    pub async fn apply_startup(&self, actions: &StartupActions) -> Result<()> {
        match actions.power {
            Some(Power::On) => {
                self.on().await?;
            }
            Some(Power::Off) => {
                self.off().await?;
            }
            None => {}
        }
        if let Some(preset) = actions.preset {
            self.select_preset(preset).await?;
        }
        if let Some(input) = &actions.input {
            self.select_input(input).await?;
        }
        if let Some(volume) = actions.volume {
            self.set_volume(volume).await?;
        }
        Ok(())
    }

    /// Ask the device to report everything `DeviceState` tracks.
    pub async fn refresh(&self) -> Result<()> {
        for q in REFRESH_QUERIES {
            self.send_nvm(q).await?;
        }
        Ok(())
    }
}
