//! naimlink client library entry.
//!
//! Wires the transport, dispatcher, built-in handlers, device state and the
//! reconnecting session supervisor into one `NaimClient`. Consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod client;
pub mod config;
pub mod device_state;
pub mod dispatch;
pub mod handlers;
pub mod session;
pub mod transport;

pub use client::NaimClient;
pub use device_state::{DeviceSnapshot, DeviceState};
pub use session::ConnectionState;
