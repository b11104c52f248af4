/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Heartbeat and TestRequest management.
//!
//! The manager tracks inbound and outbound traffic and, each time the
//! session's heartbeat timer ticks, says what the session should do:
//! - send a Heartbeat when nothing was sent within the interval
//! - send a TestRequest when nothing was received within interval + grace
//! - give up when a TestRequest goes unanswered for a full interval

use fixline_core::types::Timestamp;
use std::time::Duration;
use tokio::time::Instant;

/// Longest heartbeat interval a session will run with.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(86_400);

/// Action requested by [`HeartbeatManager::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing to do.
    Idle,
    /// Send a Heartbeat.
    SendHeartbeat,
    /// Send a TestRequest with this TestReqID.
    SendTestRequest(String),
    /// The pending TestRequest was not answered.
    TimedOut {
        /// Time since the TestRequest was sent.
        elapsed: Duration,
    },
}

/// Manages heartbeat timing for a FIX session.
#[derive(Debug)]
pub struct HeartbeatManager {
    /// Heartbeat interval.
    interval: Duration,
    /// Silence tolerated on top of the interval before a TestRequest.
    grace: Duration,
    /// Time of last message sent.
    last_sent: Instant,
    /// Time of last message received.
    last_received: Instant,
    /// Pending TestRequest ID and when it was sent.
    test_request: Option<(String, Instant)>,
}

impl HeartbeatManager {
    /// Creates a new heartbeat manager.
    ///
    /// # Arguments
    /// * `interval` - The heartbeat interval
    /// * `grace` - Extra silence tolerated before a TestRequest
    #[must_use]
    pub fn new(interval: Duration, grace: Duration) -> Self {
        let now = Instant::now();
        Self {
            interval,
            grace,
            last_sent: now,
            last_received: now,
            test_request: None,
        }
    }

    /// Records that a message was sent.
    #[inline]
    pub fn on_message_sent(&mut self) {
        self.last_sent = Instant::now();
    }

    /// Records that a message was received.
    ///
    /// A Heartbeat echoing the pending TestReqID clears the pending request.
    ///
    /// # Returns
    /// `true` if this message answered the pending TestRequest.
    pub fn on_message_received(&mut self, is_heartbeat: bool, test_req_id: Option<&str>) -> bool {
        self.last_received = Instant::now();
        let answered = is_heartbeat
            && matches!(
                (&self.test_request, test_req_id),
                (Some((pending, _)), Some(received)) if pending == received
            );
        if answered {
            self.test_request = None;
        }
        answered
    }

    /// Decides what to do on a timer tick.
    ///
    /// A returned `SendTestRequest` is recorded as pending.
    pub fn poll(&mut self) -> HeartbeatAction {
        if let Some((_, sent_at)) = &self.test_request {
            let elapsed = sent_at.elapsed();
            if elapsed >= self.interval {
                return HeartbeatAction::TimedOut { elapsed };
            }
        } else if self.last_received.elapsed() >= self.interval.saturating_add(self.grace) {
            let id = generate_test_req_id();
            let now = Instant::now();
            self.test_request = Some((id.clone(), now));
            self.last_sent = now;
            return HeartbeatAction::SendTestRequest(id);
        }

        if self.last_sent.elapsed() >= self.interval {
            return HeartbeatAction::SendHeartbeat;
        }
        HeartbeatAction::Idle
    }

    /// Returns the pending TestRequest ID, if any.
    #[must_use]
    pub fn pending_test_request(&self) -> Option<&str> {
        self.test_request.as_ref().map(|(id, _)| id.as_str())
    }

    /// Returns the heartbeat interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Changes the interval, e.g. after the peer's Logon.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Resets the manager state.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last_sent = now;
        self.last_received = now;
        self.test_request = None;
    }
}

/// Generates a TestReqID from the current time.
#[must_use]
pub fn generate_test_req_id() -> String {
    format!("TEST{}", Timestamp::now().as_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> HeartbeatManager {
        HeartbeatManager::new(Duration::from_secs(30), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_within_interval() {
        let mut mgr = manager();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(mgr.poll(), HeartbeatAction::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_when_quiet_outbound() {
        let mut mgr = manager();
        tokio::time::advance(Duration::from_secs(30)).await;
        mgr.on_message_received(false, None);
        assert_eq!(mgr.poll(), HeartbeatAction::SendHeartbeat);

        mgr.on_message_sent();
        assert_eq!(mgr.poll(), HeartbeatAction::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_request_then_answer() {
        let mut mgr = manager();
        tokio::time::advance(Duration::from_secs(31)).await;

        let HeartbeatAction::SendTestRequest(id) = mgr.poll() else {
            panic!("expected a TestRequest");
        };
        assert_eq!(mgr.pending_test_request(), Some(id.as_str()));

        assert!(!mgr.on_message_received(true, Some("OTHER")));
        assert!(mgr.on_message_received(true, Some(&id)));
        assert!(mgr.pending_test_request().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_test_request_times_out() {
        let mut mgr = manager();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(mgr.poll(), HeartbeatAction::SendTestRequest(_)));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(matches!(mgr.poll(), HeartbeatAction::TimedOut { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_pending() {
        let mut mgr = manager();
        tokio::time::advance(Duration::from_secs(31)).await;
        let _ = mgr.poll();
        mgr.reset();
        assert!(mgr.pending_test_request().is_none());
        assert_eq!(mgr.poll(), HeartbeatAction::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_does_not_overflow() {
        let mut mgr = HeartbeatManager::new(Duration::MAX, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(mgr.poll(), HeartbeatAction::Idle);
    }

    #[test]
    fn test_generate_test_req_id() {
        let id = generate_test_req_id();
        assert!(id.starts_with("TEST"));
        assert!(id.len() > 4);
    }
}
