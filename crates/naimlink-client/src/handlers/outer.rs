//! Built-in outer reply/event handlers.

use async_trait::async_trait;

use naimlink_core::error::{NaimError, Result};
use naimlink_core::protocol::{OuterMessage, TunnelCodec, Value};

use crate::device_state::DeviceSnapshot;
use crate::dispatch::OuterHandler;
use crate::session::SessionCtx;

/// `TunnelFromHost`: hands decoded inner bytes to the NVM stack.
pub struct TunnelFromHost;

#[async_trait]
impl OuterHandler for TunnelFromHost {
    fn name(&self) -> &'static str {
        naimlink_core::protocol::tunnel::TUNNEL_FROM_HOST
    }

    async fn handle(&self, ctx: &SessionCtx, msg: &OuterMessage) -> Result<()> {
        let data = TunnelCodec::payload(msg).ok_or_else(|| {
            NaimError::Frame(format!("{} without a data field", msg.name))
        })?;

        // Each line fails alone; the rest of the delivery still runs.
        for line in ctx.push_tunnel_bytes(data)? {
            let outcome = match line {
                Ok(raw) => ctx.dispatcher.dispatch_nvm_line(ctx, &raw).await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                tracing::warn!(code = e.kind().as_str(), error = %e, "nvm line dropped");
            }
        }
        Ok(())
    }
}

/// Stores a message's whole field map into one snapshot slot.
pub struct Projection {
    name: &'static str,
    apply: fn(&mut DeviceSnapshot, Value),
}

impl Projection {
    pub fn new(name: &'static str, apply: fn(&mut DeviceSnapshot, Value)) -> Self {
        Self { name, apply }
    }

    pub fn builtin() -> Vec<Projection> {
        vec![
            Projection::new("GetNowPlaying", |s, v| s.now_playing = Some(v)),
            Projection::new("GetNowPlayingTime", |s, v| s.now_playing_time = Some(v)),
            Projection::new("GetActiveList", |s, v| s.active_list = Some(v)),
            Projection::new("GetViewState", |s, v| s.view_state_legacy = Some(v)),
            Projection::new("GetBridgeCoAppVersions", |s, v| s.app_versions = Some(v)),
        ]
    }
}

#[async_trait]
impl OuterHandler for Projection {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, ctx: &SessionCtx, msg: &OuterMessage) -> Result<()> {
        let value = msg.to_value();
        let apply = self.apply;
        ctx.state.update(|s| apply(s, value));
        Ok(())
    }
}

/// Replies that carry nothing beyond "done".
pub struct Ack {
    name: &'static str,
}

impl Ack {
    pub const NAMES: [&'static str; 4] =
        ["RequestAPIVersion", "SetHeartbeatTimeout", "TunnelToHost", "Ping"];

    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl OuterHandler for Ack {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, _ctx: &SessionCtx, msg: &OuterMessage) -> Result<()> {
        tracing::trace!(name = self.name, id = ?msg.correlation_id, "ack");
        Ok(())
    }
}
