//! Top-level facade crate for naimlink.
//!
//! Re-exports the protocol core and the client runtime so users can depend on a single crate.

pub mod core {
    pub use naimlink_core::*;
}

pub mod client {
    pub use naimlink_client::*;
}

pub use naimlink_client::{ConnectionState, DeviceSnapshot, DeviceState, NaimClient};
pub use naimlink_core::{NaimError, Result};
