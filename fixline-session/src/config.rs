/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.
//!
//! This module provides configuration options for FIX sessions.

use crate::heartbeat::MAX_HEARTBEAT_INTERVAL;
use fixline_core::error::SessionError;
use fixline_core::types::CompId;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which side of the connection a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Opens the connection and sends the first Logon.
    Initiator,
    /// Listens for connections and waits for the peer's Logon.
    Acceptor,
}

impl Role {
    /// Returns the lowercase name used in text configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Acceptor => "acceptor",
        }
    }
}

impl FromStr for Role {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initiator" | "client" => Ok(Self::Initiator),
            "acceptor" | "server" => Ok(Self::Acceptor),
            other => Err(SessionError::Configuration(format!(
                "unknown session role '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the session does when persisting a received message fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFailurePolicy {
    /// Log the failure and dispatch the message anyway.
    #[default]
    Continue,
    /// Log the failure and terminate the session with the store error.
    Terminate,
}

/// Configuration for a FIX session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sender CompID (tag 49).
    pub sender_comp_id: CompId,
    /// Target CompID (tag 56).
    pub target_comp_id: CompId,
    /// FIX version BeginString (e.g., "FIX.4.4").
    pub begin_string: String,
    /// Initiator or acceptor.
    pub role: Role,
    /// Heartbeat interval; replaced by the peer's HeartBtInt on logon.
    pub heartbeat_interval: Duration,
    /// Extra silence tolerated before a TestRequest is sent.
    pub test_request_grace: Duration,
    /// How long to wait for the logout handshake to complete.
    pub logout_timeout: Duration,
    /// Whether administrative traffic is handled by the session.
    pub manage_session: bool,
    /// Whether inbound CompIDs and sequence numbers are checked.
    pub check_msg_integrity: bool,
    /// Whether sequence numbers restart on every logon.
    pub reset_seq_num_flag: bool,
    /// Last peer sequence number seen before this process started.
    pub last_received_seq_num: u64,
    /// Username (tag 553) sent on Logon.
    pub username: Option<String>,
    /// Password (tag 554) sent on Logon.
    pub password: Option<String>,
    /// Whether forwarded application messages are written to the store.
    pub persist_received: bool,
    /// Reaction to a failed store write.
    pub store_failure_policy: StoreFailurePolicy,
    /// Whether every received message is logged at debug level.
    pub log_received_msgs: bool,
}

impl SessionConfig {
    /// Creates a new session configuration with required fields.
    ///
    /// Integrity checks default to on for acceptors and off for initiators.
    ///
    /// # Arguments
    /// * `sender_comp_id` - The sender CompID
    /// * `target_comp_id` - The target CompID
    /// * `begin_string` - The FIX version string
    /// * `role` - Initiator or acceptor
    #[must_use]
    pub fn new(
        sender_comp_id: CompId,
        target_comp_id: CompId,
        begin_string: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
            begin_string: begin_string.into(),
            role,
            heartbeat_interval: Duration::from_secs(30),
            test_request_grace: Duration::from_secs(1),
            logout_timeout: Duration::from_secs(10),
            manage_session: true,
            check_msg_integrity: role == Role::Acceptor,
            reset_seq_num_flag: false,
            last_received_seq_num: 0,
            username: None,
            password: None,
            persist_received: true,
            store_failure_policy: StoreFailurePolicy::Continue,
            log_received_msgs: false,
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the grace period added to the heartbeat interval before a TestRequest.
    #[must_use]
    pub fn with_test_request_grace(mut self, grace: Duration) -> Self {
        self.test_request_grace = grace;
        self
    }

    /// Sets the logout timeout.
    #[must_use]
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Sets whether the session handles administrative traffic.
    #[must_use]
    pub const fn with_manage_session(mut self, manage: bool) -> Self {
        self.manage_session = manage;
        self
    }

    /// Sets whether inbound messages are integrity checked.
    #[must_use]
    pub const fn with_check_msg_integrity(mut self, check: bool) -> Self {
        self.check_msg_integrity = check;
        self
    }

    /// Sets whether sequence numbers are reset on every logon.
    #[must_use]
    pub const fn with_reset_seq_num_flag(mut self, reset: bool) -> Self {
        self.reset_seq_num_flag = reset;
        self
    }

    /// Sets the last peer sequence number known from a previous run.
    #[must_use]
    pub const fn with_last_received_seq_num(mut self, seq: u64) -> Self {
        self.last_received_seq_num = seq;
        self
    }

    /// Sets the Logon credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets whether received application messages are persisted.
    #[must_use]
    pub const fn with_persist_received(mut self, persist: bool) -> Self {
        self.persist_received = persist;
        self
    }

    /// Sets the reaction to store-write failures.
    #[must_use]
    pub const fn with_store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.store_failure_policy = policy;
        self
    }

    /// Sets whether each received message is logged.
    #[must_use]
    pub const fn with_log_received_msgs(mut self, log: bool) -> Self {
        self.log_received_msgs = log;
        self
    }

    /// Returns the heartbeat interval in seconds.
    #[must_use]
    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.heartbeat_interval.as_secs()
    }

    /// Checks the configuration for values the session cannot run with.
    ///
    /// # Errors
    /// Returns `SessionError::Configuration` describing the first problem found.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.sender_comp_id.is_empty() || self.target_comp_id.is_empty() {
            return Err(SessionError::Configuration(
                "sender and target CompID are required".to_string(),
            ));
        }
        if !self.begin_string.starts_with("FIX") {
            return Err(SessionError::Configuration(format!(
                "unsupported begin string '{}'",
                self.begin_string
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(SessionError::Configuration(
                "heartbeat interval must be positive".to_string(),
            ));
        }
        if self.heartbeat_interval > MAX_HEARTBEAT_INTERVAL {
            return Err(SessionError::Configuration(format!(
                "heartbeat interval above {}s",
                MAX_HEARTBEAT_INTERVAL.as_secs()
            )));
        }
        Ok(())
    }
}
