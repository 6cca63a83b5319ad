//! Shared projection of device status.
//!
//! Writers replace whole sub-structures inside one `send_modify` call, so a
//! reader either sees the previous snapshot or the next one, never a mix.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use naimlink_core::protocol::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandbyStatus {
    pub state: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub state: Option<String>,
    pub phase: Option<String>,
    pub preset: Option<String>,
    pub input: Option<String>,
    pub compact_name: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefNowPlaying {
    pub state: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetEntry {
    pub state: String,
    pub name: String,
    pub transport: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputEntry {
    pub id: String,
    pub name: String,
}

/// Point-in-time copy of everything the client has learned.
///
/// Every field stays `None` (or empty, for the tables) until the message
/// that sets it has been seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub volume: Option<u32>,
    pub input: Option<String>,
    pub standby_status: Option<StandbyStatus>,
    pub buffer_state: Option<u32>,
    pub view_state: Option<ViewState>,
    pub brief_now_playing: Option<BriefNowPlaying>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub room_name: Option<String>,
    pub preset_count: Option<u32>,
    pub input_count: Option<u32>,
    pub preset_table: BTreeMap<u32, PresetEntry>,
    pub input_table: BTreeMap<u32, InputEntry>,

    pub now_playing: Option<Value>,
    pub now_playing_time: Option<Value>,
    pub active_list: Option<Value>,
    pub view_state_legacy: Option<Value>,
    pub app_versions: Option<Value>,
}

/// Cheap-to-clone handle; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct DeviceState {
    tx: Arc<watch::Sender<DeviceSnapshot>>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DeviceSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that is notified after every update.
    pub fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.tx.subscribe()
    }

    /// Apply one update atomically and notify subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut DeviceSnapshot),
    {
        self.tx.send_modify(f);
    }

    pub fn volume(&self) -> Option<u32> {
        self.tx.borrow().volume
    }

    pub fn input(&self) -> Option<String> {
        self.tx.borrow().input.clone()
    }

    pub fn view_state(&self) -> Option<ViewState> {
        self.tx.borrow().view_state.clone()
    }

    pub fn preset(&self, index: u32) -> Option<PresetEntry> {
        self.tx.borrow().preset_table.get(&index).cloned()
    }
}
