//! Per-connection runtime: shared outbox, handler context, heartbeat and the
//! reconnecting supervisor.

pub mod context;
pub mod heartbeat;
pub mod lifecycle;
pub mod outbox;

pub use context::SessionCtx;
pub use lifecycle::{handshake_commands, ConnectionState, SessionSettings, Supervisor};
pub use outbox::Outbox;
