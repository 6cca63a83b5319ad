//! Built-in inner (NVM) command handlers.
//!
//! Token positions are counted after the command name.

use async_trait::async_trait;

use naimlink_core::error::{NaimError, Result};
use naimlink_core::protocol::NvmLine;

use crate::device_state::{BriefNowPlaying, InputEntry, PresetEntry, StandbyStatus, ViewState};
use crate::dispatch::NvmHandler;
use crate::session::SessionCtx;

/// Device error code that only means "not applicable right now".
pub const BENIGN_ERROR_CODE: &str = "14";

pub struct Volume;

#[async_trait]
impl NvmHandler for Volume {
    fn commands(&self) -> &'static [&'static str] {
        &["VOL", "GETVOL", "SETRVOL", "VOL+", "VOL-"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let volume = line.number_arg(0)?;
        ctx.state.update(|s| s.volume = Some(volume));
        Ok(())
    }
}

/// Combined preamp report: volume and the active input in one update.
pub struct Preamp;

#[async_trait]
impl NvmHandler for Preamp {
    fn commands(&self) -> &'static [&'static str] {
        &["PREAMP"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let volume = line.number_arg(0)?;
        let input = line.arg(3)?.to_string();
        ctx.state.update(|s| {
            s.volume = Some(volume);
            s.input = Some(input);
        });
        Ok(())
    }
}

pub struct Input;

#[async_trait]
impl NvmHandler for Input {
    fn commands(&self) -> &'static [&'static str] {
        &["INPUT", "GETINPUT", "SETINPUT"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let input = line.arg(0)?.to_string();
        ctx.state.update(|s| s.input = Some(input));
        Ok(())
    }
}

pub struct Standby;

#[async_trait]
impl NvmHandler for Standby {
    fn commands(&self) -> &'static [&'static str] {
        &["STANDBY", "GETSTANDBYSTATUS"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        line.require(2)?;
        let status = StandbyStatus {
            state: line.arg(0)?.to_string(),
            kind: line.arg(1)?.to_string(),
        };
        ctx.state.update(|s| s.standby_status = Some(status));
        Ok(())
    }
}

pub struct BufferState;

#[async_trait]
impl NvmHandler for BufferState {
    fn commands(&self) -> &'static [&'static str] {
        &["GETBUFFERSTATE"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let level = line.number_arg(0)?;
        ctx.state.update(|s| s.buffer_state = Some(level));
        Ok(())
    }
}

pub struct View;

#[async_trait]
impl NvmHandler for View {
    fn commands(&self) -> &'static [&'static str] {
        &["VIEWSTATE", "GETVIEWSTATE"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        line.require(10)?;
        let view = ViewState {
            state: line.optional_arg(0)?,
            phase: line.optional_arg(1)?,
            preset: line.optional_arg(2)?,
            input: line.optional_arg(6)?,
            compact_name: line.optional_arg(7)?,
            full_name: line.optional_arg(9)?,
        };
        ctx.state.update(|s| s.view_state = Some(view));
        Ok(())
    }
}

pub struct BriefNp;

#[async_trait]
impl NvmHandler for BriefNp {
    fn commands(&self) -> &'static [&'static str] {
        &["GETBRIEFNP"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        line.require(3)?;
        let np = BriefNowPlaying {
            state: line.optional_arg(0)?,
            description: line.optional_arg(1)?,
            logo_url: line.optional_arg(2)?,
        };
        ctx.state.update(|s| s.brief_now_playing = Some(np));
        Ok(())
    }
}

/// Single-token identity reports (product, serial number, room name).
pub struct Identity;

#[async_trait]
impl NvmHandler for Identity {
    fn commands(&self) -> &'static [&'static str] {
        &["PRODUCT", "GETPRODUCT", "GETSERIALNUM", "GETROOMNAME"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let value = line.arg(0)?.to_string();
        match line.command.as_str() {
            "GETSERIALNUM" => ctx.state.update(|s| s.serial_number = Some(value)),
            "GETROOMNAME" => ctx.state.update(|s| s.room_name = Some(value)),
            _ => ctx.state.update(|s| s.product = Some(value)),
        }
        Ok(())
    }
}

/// Preset total; asks for the whole preset table in one block request.
pub struct TotalPresets;

#[async_trait]
impl NvmHandler for TotalPresets {
    fn commands(&self) -> &'static [&'static str] {
        &["GETTOTALPRESETS"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let total = line.number_arg(0)?;
        ctx.state.update(|s| s.preset_count = Some(total));
        if total > 0 {
            let id = ctx.outbox.send_nvm(&format!("GETPRESETBLK 1 {total}")).await?;
            tracing::debug!(total, id, "requested preset table");
        }
        Ok(())
    }
}

pub struct PresetBlock;

#[async_trait]
impl NvmHandler for PresetBlock {
    fn commands(&self) -> &'static [&'static str] {
        &["GETPRESETBLK"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        line.require(5)?;
        let index = table_index(line)?;
        let entry = PresetEntry {
            state: line.arg(2)?.to_string(),
            name: line.arg(3)?.to_string(),
            transport: line.arg(4)?.to_string(),
        };
        ctx.state.update(|s| {
            s.preset_table.insert(index, entry);
        });
        Ok(())
    }
}

pub struct TotalInputs;

#[async_trait]
impl NvmHandler for TotalInputs {
    fn commands(&self) -> &'static [&'static str] {
        &["GETTOTALINPUTS"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let total = line.number_arg(0)?;
        ctx.state.update(|s| s.input_count = Some(total));
        Ok(())
    }
}

pub struct InputBlock;

#[async_trait]
impl NvmHandler for InputBlock {
    fn commands(&self) -> &'static [&'static str] {
        &["GETINPUTBLK"]
    }

    async fn handle(&self, ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        line.require(4)?;
        let index = table_index(line)?;
        let entry = InputEntry {
            id: line.arg(2)?.to_string(),
            name: line.arg(3)?.to_string(),
        };
        ctx.state.update(|s| {
            s.input_table.insert(index, entry);
        });
        Ok(())
    }
}

pub struct DeviceError;

#[async_trait]
impl NvmHandler for DeviceError {
    fn commands(&self) -> &'static [&'static str] {
        &["ERROR"]
    }

    async fn handle(&self, _ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        let code = line.arg(0)?;
        if code == BENIGN_ERROR_CODE {
            tracing::debug!(code, args = ?line.args, "device reported benign error");
        } else {
            tracing::warn!(code, args = ?line.args, "device reported error");
        }
        Ok(())
    }
}

pub struct Ack;

#[async_trait]
impl NvmHandler for Ack {
    fn commands(&self) -> &'static [&'static str] {
        &["OK"]
    }

    async fn handle(&self, _ctx: &SessionCtx, line: &NvmLine) -> Result<()> {
        tracing::trace!(args = ?line.args, "nvm ok");
        Ok(())
    }
}

/// Block index (t0) checked against the reported table size (t1).
fn table_index(line: &NvmLine) -> Result<u32> {
    let index = line.number_arg(0)?;
    let size = line.number_arg(1)?;
    if index == 0 || index > size {
        return Err(NaimError::InvalidValue(format!(
            "{} index {index} outside 1..={size}",
            line.command
        )));
    }
    Ok(index)
}
