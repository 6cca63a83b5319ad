//! Outgoing command builder and encoder.
//!
//! Wire shape:
//! `<command name="NAME" id="N"><map><item name="k" string="v"/></map></command>`
//! Binary parameters are base64-armored here; callers always pass raw bytes.

use std::fmt::Write as _;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::protocol::markup::escape;

/// Typed command parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Str(String),
    Int(i64),
    Binary(Vec<u8>),
}

impl Param {
    fn type_tag(&self) -> &'static str {
        match self {
            Param::Str(_) => "string",
            Param::Int(_) => "int",
            Param::Binary(_) => "base64",
        }
    }
}

/// A command before it has been assigned a correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCommand {
    name: String,
    params: Vec<(String, Param)>,
}

impl OutgoingCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: Param) -> Self {
        self.params.push((key.into(), value));
        self
    }

    pub fn string(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.param(key, Param::Str(value.into()))
    }

    pub fn int(self, key: impl Into<String>, value: i64) -> Self {
        self.param(key, Param::Int(value))
    }

    pub fn binary(self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.param(key, Param::Binary(value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, Param)] {
        &self.params
    }

    /// Serialize with the given correlation id.
    pub fn serialize(&self, id: u64) -> String {
        let mut out = String::with_capacity(64 + self.params.len() * 48);
        let _ = write!(out, "<command name=\"{}\" id=\"{id}\"", escape(&self.name));
        if self.params.is_empty() {
            out.push_str("/>");
            return out;
        }
        out.push_str("><map>");
        for (key, value) in &self.params {
            let rendered = match value {
                Param::Str(s) => escape(s),
                Param::Int(i) => i.to_string(),
                Param::Binary(b) => STANDARD.encode(b),
            };
            let _ = write!(
                out,
                "<item name=\"{}\" {}=\"{rendered}\"/>",
                escape(key),
                value.type_tag()
            );
        }
        out.push_str("</map></command>");
        out
    }
}

/// Session-wide id sequence plus the last-send timestamp the heartbeat reads.
#[derive(Debug)]
pub struct CommandEncoder {
    next_id: u64,
    last_send: Option<Instant>,
}

impl Default for CommandEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            last_send: None,
        }
    }

    /// Assign the next id, serialize, and stamp the send time as now.
    pub fn encode(&mut self, cmd: &OutgoingCommand) -> (Bytes, u64) {
        self.encode_at(cmd, Instant::now())
    }

    /// Same as `encode` with an explicit clock reading.
    pub fn encode_at(&mut self, cmd: &OutgoingCommand, now: Instant) -> (Bytes, u64) {
        let id = self.next_id;
        self.next_id += 1;
        self.last_send = Some(now);
        (Bytes::from(cmd.serialize(id)), id)
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }
}
