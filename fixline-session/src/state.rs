/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session lifecycle states and the per-session state record.
//!
//! [`SessionState`] enumerates the FIX session lifecycle. [`FixSessionState`]
//! is the mutable record owned by exactly one running session: sequence
//! numbers, traffic timestamps, the agreed heartbeat and the logout guard.

use fixline_core::message::MsgHeader;
use fixline_core::types::{CompId, SeqNum, Timestamp};
use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a FIX session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SessionState {
    /// Created, not yet running.
    #[default]
    Idle = 1,
    /// Connection being opened.
    InitiateConnection = 2,
    /// Connection open, no Logon exchanged yet.
    NetworkConnectionEstablished = 3,
    /// Initiator sent its Logon and waits for the reply.
    InitiationLogonSent = 4,
    /// Acceptor waits for the peer's Logon.
    WaitingForALogon = 5,
    /// Acceptor received and accepted a Logon.
    InitiationLogonReceived = 6,
    /// Logon reply exchanged, about to become active.
    InitiationLogonResponse = 7,
    /// Session established.
    ActiveNormalSession = 8,
    /// Answering a peer ResendRequest.
    HandleResendRequest = 9,
    /// TestRequest sent, waiting for the matching Heartbeat.
    AwaitingProcessingResponseToTestRequest = 10,
    /// ResendRequest sent, waiting for the gap to be filled.
    AwaitingProcessingResponseToResendRequest = 11,
    /// Connection lost without a logout.
    DetectBrokenNetworkConnection = 12,
    /// Logout sent, waiting for the peer's confirmation.
    WaitingLogoutConfirm = 13,
    /// Peer sent Logout, acknowledgement sent.
    ConfirmingLogout = 14,
    /// Terminal.
    Stopped = 15,
}

impl SessionState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::InitiateConnection => "InitiateConnection",
            Self::NetworkConnectionEstablished => "NetworkConnectionEstablished",
            Self::InitiationLogonSent => "InitiationLogonSent",
            Self::WaitingForALogon => "WaitingForALogon",
            Self::InitiationLogonReceived => "InitiationLogonReceived",
            Self::InitiationLogonResponse => "InitiationLogonResponse",
            Self::ActiveNormalSession => "ActiveNormalSession",
            Self::HandleResendRequest => "HandleResendRequest",
            Self::AwaitingProcessingResponseToTestRequest => {
                "AwaitingProcessingResponseToTestRequest"
            }
            Self::AwaitingProcessingResponseToResendRequest => {
                "AwaitingProcessingResponseToResendRequest"
            }
            Self::DetectBrokenNetworkConnection => "DetectBrokenNetworkConnection",
            Self::WaitingLogoutConfirm => "WaitingLogoutConfirm",
            Self::ConfirmingLogout => "ConfirmingLogout",
            Self::Stopped => "Stopped",
        }
    }

    /// Returns true if application messages may be forwarded in this state.
    #[must_use]
    pub const fn accepts_application_msgs(self) -> bool {
        !matches!(
            self,
            Self::Idle
                | Self::InitiateConnection
                | Self::InitiationLogonSent
                | Self::WaitingForALogon
                | Self::HandleResendRequest
                | Self::AwaitingProcessingResponseToTestRequest
                | Self::AwaitingProcessingResponseToResendRequest
        )
    }

    /// Returns true if a transport ending in this state is expected.
    #[must_use]
    pub const fn is_expected_end(self) -> bool {
        matches!(self, Self::Stopped | Self::ConfirmingLogout)
    }

    /// Returns true if the state may only be left for a fresh connection.
    #[must_use]
    pub const fn is_sticky(self) -> bool {
        matches!(self, Self::Stopped | Self::ConfirmingLogout)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), *self as u8)
    }
}

/// Outcome of a state change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// Target equals the current state.
    Unchanged,
    /// Request ignored because the current state is sticky.
    Ignored {
        /// The state that was kept.
        current: SessionState,
    },
    /// State moved.
    Moved {
        /// The state that was left.
        from: SessionState,
    },
}

/// Mutable state of one running FIX session.
#[derive(Debug, Clone)]
pub struct FixSessionState {
    state: SessionState,
    heart_beat_interval: Duration,
    last_sent_seq_num: SeqNum,
    last_peer_msg_seq_num: SeqNum,
    last_received_at: Option<Timestamp>,
    last_sent_at: Option<Timestamp>,
    logout_sent_at: Option<Timestamp>,
    last_header: Option<MsgHeader>,
    comp_id: CompId,
    peer_comp_id: Option<CompId>,
}

impl FixSessionState {
    /// Creates the record for a new session.
    ///
    /// # Arguments
    /// * `comp_id` - Our SenderCompID
    /// * `heart_beat_interval` - Initial heartbeat interval
    /// * `last_peer_msg_seq_num` - Last peer sequence number already seen
    #[must_use]
    pub fn new(comp_id: CompId, heart_beat_interval: Duration, last_peer_msg_seq_num: u64) -> Self {
        Self {
            state: SessionState::Idle,
            heart_beat_interval,
            last_sent_seq_num: SeqNum::new(0),
            last_peer_msg_seq_num: SeqNum::new(last_peer_msg_seq_num),
            last_received_at: None,
            last_sent_at: None,
            logout_sent_at: None,
            last_header: None,
            comp_id,
            peer_comp_id: None,
        }
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Requests a move to `to`.
    ///
    /// Moving to the current state does nothing. `Stopped` and
    /// `ConfirmingLogout` can only be left for `NetworkConnectionEstablished`.
    /// Every other request is applied.
    pub fn set_state(&mut self, to: SessionState) -> StateChange {
        let from = self.state;
        if from == to {
            return StateChange::Unchanged;
        }
        if from.is_sticky() && to != SessionState::NetworkConnectionEstablished {
            return StateChange::Ignored { current: from };
        }
        self.state = to;
        StateChange::Moved { from }
    }

    /// Moves to `Stopped` from any state, including the sticky ones.
    ///
    /// Used on the terminal path only.
    pub fn mark_stopped(&mut self) -> StateChange {
        let from = self.state;
        if from == SessionState::Stopped {
            return StateChange::Unchanged;
        }
        self.state = SessionState::Stopped;
        StateChange::Moved { from }
    }

    /// Returns the agreed heartbeat interval.
    #[inline]
    #[must_use]
    pub const fn heart_beat_interval(&self) -> Duration {
        self.heart_beat_interval
    }

    /// Adopts the heartbeat interval agreed at logon.
    pub fn set_heart_beat_interval(&mut self, interval: Duration) {
        self.heart_beat_interval = interval;
    }

    /// Returns the highest sequence number sent.
    #[inline]
    #[must_use]
    pub const fn last_sent_seq_num(&self) -> SeqNum {
        self.last_sent_seq_num
    }

    /// Returns the highest peer sequence number accepted.
    #[inline]
    #[must_use]
    pub const fn last_peer_msg_seq_num(&self) -> SeqNum {
        self.last_peer_msg_seq_num
    }

    /// Returns the sequence number expected on the next inbound message.
    #[inline]
    #[must_use]
    pub const fn next_expected_peer_seq_num(&self) -> SeqNum {
        self.last_peer_msg_seq_num.next()
    }

    /// Records an accepted peer sequence number.
    ///
    /// The stored value never decreases; a lower value is ignored.
    ///
    /// # Returns
    /// `true` if the stored value moved.
    pub fn record_peer_seq_num(&mut self, seq: SeqNum) -> bool {
        if seq > self.last_peer_msg_seq_num {
            self.last_peer_msg_seq_num = seq;
            true
        } else {
            false
        }
    }

    /// Records inbound traffic.
    pub fn on_received(&mut self) {
        self.last_received_at = Some(Timestamp::now());
    }

    /// Records the header of a message that was just encoded.
    pub fn on_sent(&mut self, header: MsgHeader) {
        if header.msg_seq_num > self.last_sent_seq_num {
            self.last_sent_seq_num = header.msg_seq_num;
        }
        self.last_sent_at = Some(header.sending_time);
        self.last_header = Some(header);
    }

    /// Marks the session as having sent its Logout.
    ///
    /// # Returns
    /// `true` the first time, `false` once a logout has already been sent.
    pub fn mark_logout_sent(&mut self) -> bool {
        if self.logout_sent_at.is_some() {
            return false;
        }
        self.logout_sent_at = Some(Timestamp::now());
        true
    }

    /// Returns when the Logout was sent, if it was.
    #[must_use]
    pub const fn logout_sent_at(&self) -> Option<Timestamp> {
        self.logout_sent_at
    }

    /// Returns when the last message was received.
    #[must_use]
    pub const fn last_received_at(&self) -> Option<Timestamp> {
        self.last_received_at
    }

    /// Returns when the last message was sent.
    #[must_use]
    pub const fn last_sent_at(&self) -> Option<Timestamp> {
        self.last_sent_at
    }

    /// Returns the last outbound header.
    #[must_use]
    pub const fn last_header(&self) -> Option<&MsgHeader> {
        self.last_header.as_ref()
    }

    /// Returns our SenderCompID.
    #[must_use]
    pub const fn comp_id(&self) -> &CompId {
        &self.comp_id
    }

    /// Returns the peer's SenderCompID learned at logon.
    #[must_use]
    pub const fn peer_comp_id(&self) -> Option<&CompId> {
        self.peer_comp_id.as_ref()
    }

    /// Stores the peer's SenderCompID.
    pub fn set_peer_comp_id(&mut self, comp_id: CompId) {
        self.peer_comp_id = Some(comp_id);
    }

    /// Restarts sequence bookkeeping for a new connection.
    ///
    /// The only operation allowed to lower the peer sequence number.
    /// The logout guard is cleared; the lifecycle state is left alone.
    ///
    /// # Arguments
    /// * `last_peer_msg_seq_num` - Peer sequence number to continue from
    /// * `reset_sent` - Whether the outbound sequence restarts too
    pub fn reset(&mut self, last_peer_msg_seq_num: u64, reset_sent: bool) {
        self.last_peer_msg_seq_num = SeqNum::new(last_peer_msg_seq_num);
        if reset_sent {
            self.last_sent_seq_num = SeqNum::new(0);
        }
        self.logout_sent_at = None;
        self.last_received_at = None;
    }
}
