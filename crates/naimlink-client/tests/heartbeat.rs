#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::time::Duration;

use tokio::time::Instant;

use naimlink_client::NaimClient;

use support::{config, pair, ScriptedConnector};

#[tokio::test(start_paused = true)]
async fn keepalive_follows_idle_timeout_minus_one_second() {
    let (connector, streams) = ScriptedConnector::new();
    let client = NaimClient::with_connector(config(Some(10)), connector).unwrap();

    let (client_io, mut dev) = pair();
    streams.send(client_io).unwrap();
    client.start().await.unwrap();
    dev.commands(3).await;
    let t0 = Instant::now();

    let ping = dev.next_command().await.unwrap();
    assert_eq!(ping.name(), "Ping");
    assert_eq!(ping.id(), 4);
    let waited = t0.elapsed();
    assert!(waited >= Duration::from_secs(9), "too early: {waited:?}");
    assert!(waited < Duration::from_secs(10), "too late: {waited:?}");

    let again = dev.next_command().await.unwrap();
    assert_eq!(again.name(), "Ping");
    assert_eq!(again.id(), 5);
    assert!(t0.elapsed() >= Duration::from_secs(18));

    client.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn application_traffic_postpones_the_keepalive() {
    let (connector, streams) = ScriptedConnector::new();
    let client = NaimClient::with_connector(config(Some(10)), connector).unwrap();

    let (client_io, mut dev) = pair();
    streams.send(client_io).unwrap();
    client.start().await.unwrap();
    dev.commands(3).await;
    let t0 = Instant::now();

    tokio::time::advance(Duration::from_secs(5)).await;
    client.set_volume(20).await.unwrap();
    let vol = dev.next_command().await.unwrap();
    assert_eq!(vol.tunnel_text().unwrap(), "*NVM SETRVOL 20\r");

    let ping = dev.next_command().await.unwrap();
    assert_eq!(ping.name(), "Ping");
    assert!(t0.elapsed() >= Duration::from_secs(14), "{:?}", t0.elapsed());

    client.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_keepalive_reconnects_and_replays_handshake() {
    let (connector, streams) = ScriptedConnector::new();
    let client = NaimClient::with_connector(config(Some(10)), connector.clone()).unwrap();

    let (first_io, mut first) = pair();
    streams.send_failing_after(first_io, 3).unwrap();
    let (second_io, mut second) = pair();
    streams.send(second_io).unwrap();

    client.start().await.unwrap();
    first.commands(3).await;
    let t0 = Instant::now();

    let cmds = second.commands(3).await;
    assert!(t0.elapsed() >= Duration::from_secs(9), "{:?}", t0.elapsed());
    assert_eq!(connector.attempts(), 2);
    let names: Vec<String> = cmds.iter().map(|c| c.name()).collect();
    assert_eq!(
        names,
        ["RequestAPIVersion", "GetBridgeCoAppVersions", "SetHeartbeatTimeout"]
    );
    // id 4 was the keepalive that never made it out
    assert_eq!(cmds[0].id(), 5);

    client.stop().await.unwrap();
    drop(first);
}

#[tokio::test(start_paused = true)]
async fn no_keepalive_without_heartbeat_config() {
    let (connector, streams) = ScriptedConnector::new();
    let client = NaimClient::with_connector(config(None), connector).unwrap();

    let (client_io, mut dev) = pair();
    streams.send(client_io).unwrap();
    client.start().await.unwrap();
    dev.commands(2).await;

    let idle = tokio::time::timeout(Duration::from_secs(3600), dev.next_command()).await;
    assert!(idle.is_err(), "nothing may be sent while idle");

    client.stop().await.unwrap();
}
