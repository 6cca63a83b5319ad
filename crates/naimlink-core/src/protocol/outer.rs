//! Outer stream framer: raw bytes in, `reply`/`event` messages out.
//!
//! Parsing rules:
//! - Work on bytes; validate UTF-8 only once an element is complete.
//! - One malformed element is one error; the stream keeps going.
//! - Never index past `remaining`; incomplete tails stay buffered verbatim.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Buf, BytesMut};

use crate::error::{NaimError, Result};
use crate::protocol::markup::{self, Element, Scan};
use crate::protocol::value::Value;

/// Upper bound for one buffered element before the framer gives up on it.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Inbound element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Reply,
    Event,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Reply => "reply",
            MessageKind::Event => "event",
        }
    }
}

/// One complete inbound message with all binary items already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterMessage {
    pub kind: MessageKind,
    /// Dispatch key (`name` attribute).
    pub name: String,
    /// Echoed command id; replies only.
    pub correlation_id: Option<u64>,
    pub fields: BTreeMap<String, Value>,
}

impl OuterMessage {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The whole field map as one value (used for state projections).
    pub fn to_value(&self) -> Value {
        Value::Map(self.fields.clone())
    }
}

/// Incremental framer for the outer element stream.
#[derive(Debug)]
pub struct OuterFramer {
    buf: BytesMut,
    max_message_bytes: usize,
}

impl Default for OuterFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl OuterFramer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_MESSAGE_BYTES)
    }

    pub fn with_limit(max_message_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_message_bytes: max_message_bytes.max(64),
        }
    }

    /// Append a chunk exactly as it came off the wire.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes currently held back as an incomplete fragment.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial element (used when the connection is lost).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Parse every complete element currently buffered.
    ///
    /// The iterator ends when only an incomplete fragment (or nothing) is
    /// left; calling again after more `feed` resumes from that fragment.
    pub fn read_messages(&mut self) -> ReadMessages<'_> {
        ReadMessages { framer: self }
    }

    fn next_message(&mut self) -> Option<Result<OuterMessage>> {
        loop {
            let ws = self
                .buf
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            self.buf.advance(ws);

            if self.buf.is_empty() {
                return None;
            }

            if self.buf[0] != b'<' {
                let stray = self
                    .buf
                    .iter()
                    .position(|&b| b == b'<')
                    .unwrap_or(self.buf.len());
                self.buf.advance(stray);
                return Some(Err(NaimError::Frame(format!(
                    "discarded {stray} bytes of text outside any element"
                ))));
            }

            // top-level declarations and comments carry nothing
            let skip_marker: Option<(&[u8], &[u8])> = if self.buf.starts_with(b"<?") {
                Some((&b"<?"[..], &b"?>"[..]))
            } else if self.buf.starts_with(b"<!--") {
                Some((&b"<!--"[..], &b"-->"[..]))
            } else {
                None
            };
            if let Some((open, close)) = skip_marker {
                let end = self.buf[open.len()..]
                    .windows(close.len())
                    .position(|w| w == close);
                match end {
                    Some(p) => {
                        self.buf.advance(open.len() + p + close.len());
                        continue;
                    }
                    None => return self.enforce_limit(),
                }
            }

            return match markup::scan_element(&self.buf) {
                Scan::Complete(len) => {
                    let raw = self.buf.split_to(len);
                    Some(decode_message(&raw))
                }
                Scan::Incomplete => self.enforce_limit(),
                Scan::Malformed { skip, reason } => {
                    self.buf.advance(skip);
                    Some(Err(NaimError::Frame(reason)))
                }
            };
        }
    }

    fn enforce_limit(&mut self) -> Option<Result<OuterMessage>> {
        if self.buf.len() <= self.max_message_bytes {
            return None;
        }
        let dropped = self.buf[1..]
            .iter()
            .position(|&b| b == b'<')
            .map(|p| p + 1)
            .unwrap_or(self.buf.len());
        self.buf.advance(dropped);
        Some(Err(NaimError::Frame(format!(
            "incomplete element exceeded {} bytes; dropped {dropped} bytes",
            self.max_message_bytes
        ))))
    }
}

/// Lazy, finite sequence of messages parsed from the framer's buffer.
pub struct ReadMessages<'a> {
    framer: &'a mut OuterFramer,
}

impl Iterator for ReadMessages<'_> {
    type Item = Result<OuterMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_message()
    }
}

/// Decode one complete element into a message.
pub fn decode_message(raw: &[u8]) -> Result<OuterMessage> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| NaimError::Decode(format!("element is not valid utf-8: {e}")))?;
    let el = markup::parse_element(text)?;

    let kind = match el.name.as_str() {
        "reply" => MessageKind::Reply,
        "event" => MessageKind::Event,
        other => {
            return Err(NaimError::Frame(format!(
                "unexpected top-level element <{other}>"
            )))
        }
    };

    let name = el
        .attr("name")
        .ok_or_else(|| NaimError::Frame(format!("<{}> without a name", kind.as_str())))?
        .to_string();

    let correlation_id = match kind {
        MessageKind::Reply => el
            .attr("id")
            .map(|id| {
                id.trim()
                    .parse::<u64>()
                    .map_err(|e| NaimError::Decode(format!("reply id `{id}`: {e}")))
            })
            .transpose()?,
        MessageKind::Event => None,
    };

    let fields = match el.children.iter().find(|c| c.name == "map") {
        Some(map) => decode_map(map)?,
        None => BTreeMap::new(),
    };

    Ok(OuterMessage {
        kind,
        name,
        correlation_id,
        fields,
    })
}

fn decode_map(map: &Element) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for item in &map.children {
        if item.name != "item" {
            return Err(NaimError::Frame(format!(
                "unexpected <{}> inside <map>",
                item.name
            )));
        }
        let key = item
            .attr("name")
            .ok_or_else(|| NaimError::Frame("<item> without a name".into()))?;
        out.insert(key.to_string(), decode_item(key, item)?);
    }
    Ok(out)
}

fn decode_item(key: &str, item: &Element) -> Result<Value> {
    if let Some(s) = item.attr("string") {
        return Ok(Value::Str(s.to_string()));
    }
    if let Some(i) = item.attr("int") {
        return i
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| NaimError::Decode(format!("item `{key}` int `{i}`: {e}")));
    }
    if let Some(armored) = item.attr("base64") {
        let compact: String = armored.chars().filter(|c| !c.is_whitespace()).collect();
        return STANDARD
            .decode(compact.as_bytes())
            .map(Value::Binary)
            .map_err(|e| NaimError::Decode(format!("item `{key}` base64: {e}")));
    }
    if let Some(map) = item.children.iter().find(|c| c.name == "map") {
        return decode_map(map).map(Value::Map);
    }
    Err(NaimError::Frame(format!("item `{key}` has no typed value")))
}
