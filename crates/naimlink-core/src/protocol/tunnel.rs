//! Tunnel codec and NVM line framer.
//!
//! Outbound inner commands are wrapped (CR appended) into the single binary
//! parameter of `TunnelToHost`; the encoder armors it. Inbound `TunnelFromHost`
//! payloads were already un-armored by the outer framer, so the codec only
//! hands their bytes to `NvmFramer`.

use bytes::{Buf, BytesMut};

use crate::error::{NaimError, Result};
use crate::protocol::command::OutgoingCommand;
use crate::protocol::outer::OuterMessage;

/// Outer command carrying inner-protocol bytes to the device.
pub const TUNNEL_TO_HOST: &str = "TunnelToHost";
/// Outer event carrying inner-protocol bytes from the device.
pub const TUNNEL_FROM_HOST: &str = "TunnelFromHost";
/// Field holding the tunneled payload in both directions.
pub const TUNNEL_DATA_FIELD: &str = "data";
/// Prefix for outbound NVM commands.
pub const NVM_COMMAND_PREFIX: &str = "*NVM";

/// Inbound NVM line separator.
const LINE_SEPARATOR: &[u8] = b"\r\n";
/// A partial line longer than this is discarded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

pub struct TunnelCodec;

impl TunnelCodec {
    /// Wrap a raw inner-protocol string into one `TunnelToHost` command.
    pub fn encode(inner: &str) -> OutgoingCommand {
        let mut payload = Vec::with_capacity(inner.len() + 1);
        payload.extend_from_slice(inner.as_bytes());
        payload.push(b'\r');
        OutgoingCommand::new(TUNNEL_TO_HOST).binary(TUNNEL_DATA_FIELD, payload)
    }

    /// Wrap an NVM command body (`GOTOPRESET 2` becomes `*NVM GOTOPRESET 2`).
    pub fn encode_nvm(command: &str) -> OutgoingCommand {
        Self::encode(&format!("{NVM_COMMAND_PREFIX} {command}"))
    }

    /// Decoded tunnel bytes of a `TunnelFromHost` message.
    pub fn payload(msg: &OuterMessage) -> Option<&[u8]> {
        msg.field(TUNNEL_DATA_FIELD)?.as_bytes()
    }
}

/// Reassembles CR+LF separated NVM lines across tunnel deliveries.
#[derive(Debug, Default)]
pub struct NvmFramer {
    buf: BytesMut,
}

impl NvmFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append tunnel bytes and return every line completed by them.
    ///
    /// Each entry fails on its own (bad UTF-8, oversize) without affecting
    /// the lines around it.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<String>> {
        self.buf.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self
            .buf
            .windows(LINE_SEPARATOR.len())
            .position(|w| w == LINE_SEPARATOR)
        {
            let line = self.buf.split_to(pos);
            self.buf.advance(LINE_SEPARATOR.len());
            lines.push(
                String::from_utf8(line.to_vec())
                    .map_err(|e| NaimError::Decode(format!("nvm line is not utf-8: {e}"))),
            );
        }

        if self.buf.len() > MAX_LINE_BYTES {
            let dropped = self.buf.len();
            self.buf.clear();
            lines.push(Err(NaimError::Frame(format!(
                "nvm line exceeded {MAX_LINE_BYTES} bytes; dropped {dropped} bytes"
            ))));
        }
        lines
    }

    /// Bytes of the current partial line.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
