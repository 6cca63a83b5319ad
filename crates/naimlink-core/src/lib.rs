//! naimlink core: transport-agnostic protocol primitives and the shared error type.
//!
//! This crate defines both framing layers of the device control protocol: the
//! outer tagged-element stream (commands, replies, events) and the line-based
//! NVM protocol tunneled inside `TunnelFromHost`/`TunnelToHost`. It carries no
//! runtime dependencies so the codecs can be driven by any I/O loop and tested
//! without sockets.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed input is
//! reported as `NaimError` and never aborts a stream.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod heartbeat;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, NaimError, Result};
