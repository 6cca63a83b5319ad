//! Keepalive scheduling without a timer service.
//!
//! The device drops a connection that stays silent for `T` seconds once
//! `SetHeartbeatTimeout` has been sent. Any outbound command counts as
//! traffic, so the schedule only looks at the encoder's last-send instant:
//! the next keepalive is due at `last_send + T - 1s`.

use std::time::{Duration, Instant};

/// No-op command used as keepalive.
pub const KEEPALIVE_COMMAND: &str = "Ping";

/// Safety margin subtracted from the device timeout.
const MARGIN: Duration = Duration::from_secs(1);

/// What the heartbeat loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Deadline reached: send a keepalive now.
    SendKeepalive,
    /// Nothing to do before this instant.
    WaitUntil(Instant),
}

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatSchedule {
    timeout: Duration,
}

impl HeartbeatSchedule {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `last_send + T - 1s`.
    pub fn deadline(&self, last_send: Instant) -> Instant {
        last_send + self.timeout.saturating_sub(MARGIN)
    }

    /// Decide based on the last send (if any) and the current time.
    pub fn poll(&self, last_send: Option<Instant>, now: Instant) -> HeartbeatAction {
        match last_send {
            None => HeartbeatAction::SendKeepalive,
            Some(last) => {
                let deadline = self.deadline(last);
                if now >= deadline {
                    HeartbeatAction::SendKeepalive
                } else {
                    HeartbeatAction::WaitUntil(deadline)
                }
            }
        }
    }
}
