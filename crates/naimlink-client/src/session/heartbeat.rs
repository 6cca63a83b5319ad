use naimlink_core::error::Result;
use naimlink_core::heartbeat::{HeartbeatAction, HeartbeatSchedule, KEEPALIVE_COMMAND};
use naimlink_core::protocol::OutgoingCommand;

use crate::session::Outbox;

/// Keep the connection alive until a send fails.
///
/// Sleeps until `last_send + T - 1s` and re-reads the last send time on
/// wake-up, so any application or handler traffic in between postpones the
/// keepalive. Returns only with the error of a failed keepalive.
pub async fn run(outbox: &Outbox, schedule: HeartbeatSchedule) -> Result<()> {
    let keepalive = OutgoingCommand::new(KEEPALIVE_COMMAND);
    loop {
        let now = tokio::time::Instant::now().into_std();
        match schedule.poll(outbox.last_send(), now) {
            HeartbeatAction::SendKeepalive => {
                let id = outbox.send(&keepalive).await?;
                tracing::trace!(id, "keepalive sent");
            }
            HeartbeatAction::WaitUntil(at) => {
                tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await;
            }
        }
    }
}
