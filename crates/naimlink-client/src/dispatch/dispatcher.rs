use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use naimlink_core::error::Result;
use naimlink_core::protocol::{normalize_command_name, NvmLine, OuterMessage};

use crate::session::SessionCtx;

/// Handler for one outer reply/event name.
#[async_trait]
pub trait OuterHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, ctx: &SessionCtx, msg: &OuterMessage) -> Result<()>;
}

/// Handler for one or more inner (NVM) command names.
#[async_trait]
pub trait NvmHandler: Send + Sync {
    /// Raw command names as the device sends them (`VOL+`, not `VOL_PLUS_`).
    fn commands(&self) -> &'static [&'static str];
    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()>;
}

/// Name-keyed registries for both protocol layers.
#[derive(Default)]
pub struct Dispatcher {
    outer: DashMap<&'static str, Arc<dyn OuterHandler>>,
    nvm: DashMap<String, Arc<dyn NvmHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            outer: DashMap::new(),
            nvm: DashMap::new(),
        }
    }

    pub fn register_outer(&self, handler: Arc<dyn OuterHandler>) {
        self.outer.insert(handler.name(), handler);
    }

    pub fn register_nvm(&self, handler: Arc<dyn NvmHandler>) {
        for name in handler.commands() {
            self.nvm
                .insert(normalize_command_name(name), Arc::clone(&handler));
        }
    }

    pub fn registered_outer(&self) -> Vec<&'static str> {
        self.outer.iter().map(|e| *e.key()).collect()
    }

    pub fn registered_nvm(&self) -> Vec<String> {
        self.nvm.iter().map(|e| e.key().clone()).collect()
    }

    /// Route one outer message. Unknown names are logged and dropped.
    pub async fn dispatch_outer(&self, ctx: &SessionCtx, msg: &OuterMessage) -> Result<()> {
        let handler = match self.outer.get(msg.name.as_str()) {
            Some(h) => h.value().clone(),
            None => {
                tracing::warn!(
                    kind = msg.kind.as_str(),
                    name = %msg.name,
                    id = ?msg.correlation_id,
                    "no handler for outer message"
                );
                return Ok(());
            }
        };
        handler.handle(ctx, msg).await
    }

    /// Route one inner line. Unknown commands are logged and dropped.
    pub async fn dispatch_nvm(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let key = line.key();
        let handler = match self.nvm.get(&key) {
            Some(h) => h.value().clone(),
            None => {
                tracing::warn!(command = %line.command, key = %key, "no handler for nvm command");
                return Ok(());
            }
        };
        handler.handle(ctx, line).await
    }

    /// Tokenize and route one raw inner line.
    pub async fn dispatch_nvm_line(&self, ctx: &SessionCtx, raw: &str) -> Result<()> {
        match NvmLine::parse(raw)? {
            Some(line) => self.dispatch_nvm(ctx, &line).await,
            None => Ok(()),
        }
    }
}
