#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use naimlink_client::device_state::{DeviceSnapshot, PresetEntry, ViewState};
use naimlink_client::handlers::builtin_dispatcher;
use naimlink_client::session::{Outbox, SessionCtx};
use naimlink_client::transport::StreamWriter;
use naimlink_client::DeviceState;
use naimlink_core::protocol::{MessageKind, OuterMessage, Value};

use support::{pair, Device};

fn ctx() -> SessionCtx {
    SessionCtx::new(
        DeviceState::new(),
        Arc::new(Outbox::new()),
        Arc::new(builtin_dispatcher()),
    )
}

async fn ctx_with_device() -> (SessionCtx, Device) {
    let ctx = ctx();
    let (client_io, dev) = pair();
    ctx.outbox.attach(Box::new(StreamWriter::new(client_io))).await;
    (ctx, dev)
}

async fn line(ctx: &SessionCtx, raw: &str) -> naimlink_core::Result<()> {
    ctx.dispatcher.dispatch_nvm_line(ctx, raw).await
}

fn tunnel_event(bytes: &[u8]) -> OuterMessage {
    let mut fields = BTreeMap::new();
    fields.insert("data".to_string(), Value::Binary(bytes.to_vec()));
    OuterMessage {
        kind: MessageKind::Event,
        name: "TunnelFromHost".into(),
        correlation_id: None,
        fields,
    }
}

#[tokio::test]
async fn volume_updates_only_volume() {
    let ctx = ctx();
    line(&ctx, "#NVM VOL 35").await.unwrap();

    let s = ctx.state.snapshot();
    assert_eq!(s.volume, Some(35));
    assert_eq!(
        s,
        DeviceSnapshot {
            volume: Some(35),
            ..DeviceSnapshot::default()
        }
    );

    line(&ctx, "#NVM VOL- 34").await.unwrap();
    line(&ctx, "#NVM VOL+ 36").await.unwrap();
    assert_eq!(ctx.state.volume(), Some(36));
}

#[tokio::test]
async fn preamp_sets_volume_and_input_together() {
    let ctx = ctx();
    line(&ctx, r#"#NVM PREAMP 2 0 0 IRADIO OFF OFF OFF ON "iRadio" OFF"#)
        .await
        .unwrap();
    let s = ctx.state.snapshot();
    assert_eq!(s.volume, Some(2));
    assert_eq!(s.input.as_deref(), Some("IRADIO"));
}

#[tokio::test]
async fn view_state_maps_na_to_absent() {
    let ctx = ctx();
    line(
        &ctx,
        r#"#NVM GETVIEWSTATE PLAYING NA 3 x y z IRADIO "Radio X" a "Radio X Full""#,
    )
    .await
    .unwrap();

    assert_eq!(
        ctx.state.view_state(),
        Some(ViewState {
            state: Some("PLAYING".into()),
            phase: None,
            preset: Some("3".into()),
            input: Some("IRADIO".into()),
            compact_name: Some("Radio X".into()),
            full_name: Some("Radio X Full".into()),
        })
    );
    assert_eq!(ctx.state.volume(), None);
}

#[tokio::test]
async fn brief_now_playing_and_identity() {
    let ctx = ctx();
    line(&ctx, r#"#NVM GETBRIEFNP PLAYING "Jazz FM" NA"#).await.unwrap();
    line(&ctx, "#NVM GETPRODUCT UNITIQUTE").await.unwrap();
    line(&ctx, "#NVM GETSERIALNUM 123456").await.unwrap();
    line(&ctx, r#"#NVM GETROOMNAME "Living Room""#).await.unwrap();
    line(&ctx, "#NVM GETSTANDBYSTATUS ON NETWORK").await.unwrap();

    let s = ctx.state.snapshot();
    let np = s.brief_now_playing.unwrap();
    assert_eq!(np.state.as_deref(), Some("PLAYING"));
    assert_eq!(np.description.as_deref(), Some("Jazz FM"));
    assert_eq!(np.logo_url, None);
    assert_eq!(s.product.as_deref(), Some("UNITIQUTE"));
    assert_eq!(s.serial_number.as_deref(), Some("123456"));
    assert_eq!(s.room_name.as_deref(), Some("Living Room"));
    let standby = s.standby_status.unwrap();
    assert_eq!((standby.state.as_str(), standby.kind.as_str()), ("ON", "NETWORK"));
}

#[tokio::test]
async fn preset_table_is_sparse_and_bounded() {
    let ctx = ctx();
    line(&ctx, r#"#NVM GETPRESETBLK 2 4 USED "Radio One" iRadio"#)
        .await
        .unwrap();

    let s = ctx.state.snapshot();
    assert_eq!(s.preset_table.len(), 1);
    assert_eq!(
        ctx.state.preset(2),
        Some(PresetEntry {
            state: "USED".into(),
            name: "Radio One".into(),
            transport: "iRadio".into(),
        })
    );
    assert_eq!(ctx.state.preset(1), None);

    let err = line(&ctx, r#"#NVM GETPRESETBLK 5 4 USED "Too Far" iRadio"#)
        .await
        .unwrap_err();
    assert_eq!(err.kind().as_str(), "INVALID_VALUE");
    assert_eq!(ctx.state.snapshot().preset_table.len(), 1);

    line(&ctx, r#"#NVM GETINPUTBLK 1 2 ANA1 "Analogue 1""#).await.unwrap();
    let inputs = ctx.state.snapshot().input_table;
    assert_eq!(inputs.get(&1).unwrap().name, "Analogue 1");
}

#[tokio::test]
async fn total_presets_requests_the_preset_block() {
    let (ctx, mut dev) = ctx_with_device().await;
    line(&ctx, "#NVM GETTOTALPRESETS 4").await.unwrap();
    assert_eq!(ctx.state.snapshot().preset_count, Some(4));

    let cmd = dev.next_command().await.unwrap();
    assert_eq!(cmd.name(), "TunnelToHost");
    assert_eq!(cmd.id(), 1);
    assert_eq!(cmd.tunnel_text().unwrap(), "*NVM GETPRESETBLK 1 4\r");
}

#[tokio::test]
async fn zero_presets_sends_nothing() {
    let (ctx, _dev) = ctx_with_device().await;
    line(&ctx, "#NVM GETTOTALPRESETS 0").await.unwrap();
    assert_eq!(ctx.state.snapshot().preset_count, Some(0));
    assert_eq!(ctx.outbox.issued(), 0);
}

#[tokio::test]
async fn preset_count_is_kept_even_when_offline() {
    let ctx = ctx();
    let err = line(&ctx, "#NVM GETTOTALPRESETS 3").await.unwrap_err();
    assert_eq!(err.kind().as_str(), "NOT_CONNECTED");
    assert_eq!(ctx.state.snapshot().preset_count, Some(3));
}

#[tokio::test]
async fn unknown_and_informational_lines_leave_state_alone() {
    let ctx = ctx();
    line(&ctx, "#NVM FROBNICATE 1 2 3").await.unwrap();
    line(&ctx, "#NVM ERROR 14 GETBUFFERSTATE").await.unwrap();
    line(&ctx, "#NVM ERROR 3 SETINPUT").await.unwrap();
    line(&ctx, "#NVM OK").await.unwrap();
    line(&ctx, "").await.unwrap();
    assert_eq!(ctx.state.snapshot(), DeviceSnapshot::default());
}

#[tokio::test]
async fn short_lines_fail_alone() {
    let ctx = ctx();
    let err = line(&ctx, "#NVM VOL").await.unwrap_err();
    assert_eq!(err.kind().as_str(), "ARITY");

    ctx.dispatcher
        .dispatch_outer(&ctx, &tunnel_event(b"#NVM VOL\r\n#NVM GETVIEWSTATE A\r\n#NVM VOL 30\r\n"))
        .await
        .unwrap();
    let s = ctx.state.snapshot();
    assert_eq!(s.volume, Some(30));
    assert_eq!(s.view_state, None);
}

#[tokio::test]
async fn tunnel_lines_reassemble_across_events() {
    let ctx = ctx();
    let d = &ctx.dispatcher;
    d.dispatch_outer(&ctx, &tunnel_event(b"#NVM GETINPUT DIGITAL1\r\n#NVM GETBUFF"))
        .await
        .unwrap();
    assert_eq!(ctx.state.input().as_deref(), Some("DIGITAL1"));
    assert_eq!(ctx.state.snapshot().buffer_state, None);
    assert_eq!(ctx.pending_tunnel_bytes(), "#NVM GETBUFF".len());

    d.dispatch_outer(&ctx, &tunnel_event(b"ERSTATE 7\r\n")).await.unwrap();
    assert_eq!(ctx.state.snapshot().buffer_state, Some(7));
    assert_eq!(ctx.pending_tunnel_bytes(), 0);
}

#[tokio::test]
async fn outer_projections_and_unknown_names() {
    let ctx = ctx();
    let mut fields = BTreeMap::new();
    fields.insert("title".to_string(), Value::Str("Blue in Green".into()));
    fields.insert("elapsed".to_string(), Value::Int(61));
    let msg = OuterMessage {
        kind: MessageKind::Reply,
        name: "GetNowPlaying".into(),
        correlation_id: Some(7),
        fields: fields.clone(),
    };
    ctx.dispatcher.dispatch_outer(&ctx, &msg).await.unwrap();
    assert_eq!(ctx.state.snapshot().now_playing, Some(Value::Map(fields)));

    let before = ctx.state.snapshot();
    let unknown = OuterMessage {
        kind: MessageKind::Event,
        name: "SomethingNew".into(),
        correlation_id: None,
        fields: BTreeMap::new(),
    };
    ctx.dispatcher.dispatch_outer(&ctx, &unknown).await.unwrap();
    assert_eq!(ctx.state.snapshot(), before);
}

#[tokio::test]
async fn tunnel_event_without_data_is_a_frame_error() {
    let ctx = ctx();
    let msg = OuterMessage {
        kind: MessageKind::Event,
        name: "TunnelFromHost".into(),
        correlation_id: None,
        fields: BTreeMap::new(),
    };
    let err = ctx.dispatcher.dispatch_outer(&ctx, &msg).await.unwrap_err();
    assert_eq!(err.kind().as_str(), "FRAME");
}

#[test]
fn registry_keys_are_normalized() {
    let d = builtin_dispatcher();
    let nvm = d.registered_nvm();
    assert!(nvm.contains(&"VOL_PLUS_".to_string()));
    assert!(nvm.contains(&"VOL_MINUS_".to_string()));
    assert!(!nvm.iter().any(|k| k.contains('+') || k.contains('-')));
    assert!(d.registered_outer().contains(&"TunnelFromHost"));
}

#[tokio::test]
async fn snapshot_serializes_camel_case() {
    let ctx = ctx();
    line(&ctx, "#NVM GETSTANDBYSTATUS OFF NETWORK").await.unwrap();
    line(&ctx, r#"#NVM GETPRESETBLK 2 4 USED "Radio One" iRadio"#)
        .await
        .unwrap();

    let json = serde_json::to_value(ctx.state.snapshot()).unwrap();
    assert_eq!(json["standbyStatus"]["type"], "NETWORK");
    assert_eq!(json["presetTable"]["2"]["name"], "Radio One");
    assert!(json["volume"].is_null());
}
