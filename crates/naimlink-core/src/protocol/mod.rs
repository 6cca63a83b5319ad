//! Protocol modules (outer tagged stream + tunneled NVM lines).
//!
//! This module hosts both framing layers:
//! - Outer: XML-like `reply`/`event` elements in, `command` elements out.
//! - Inner: `#NVM` token lines carried base64-armored inside one outer field.
//!
//! Both framers are incremental and byte-oriented: they accept arbitrary
//! chunks and keep any incomplete trailing fragment for the next call.

pub mod command;
pub mod markup;
pub mod nvm;
pub mod outer;
pub mod tunnel;
pub mod value;

pub use command::{CommandEncoder, OutgoingCommand, Param};
pub use nvm::{normalize_command_name, tokenize, NvmLine};
pub use outer::{MessageKind, OuterFramer, OuterMessage};
pub use tunnel::{NvmFramer, TunnelCodec};
pub use value::Value;
