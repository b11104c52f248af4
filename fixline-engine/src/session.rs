/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX session state machine.
//!
//! A [`FixSession`] drives one logical session over one [`MsgTransport`] at a
//! time. A single task selects over transport events, handle commands and the
//! session's own timers, handling one item at a time, so the session record
//! needs no locking. Callbacks into the [`Application`] are awaited inline and
//! the state is re-checked once they resolve.

use crate::application::Application;
use crate::handle::{MAX_SCHEDULE_DELAY, SessionCommand, SessionHandle};
use fixline_core::error::{FixError, SessionError, StoreError, TransportError};
use fixline_core::field::FieldMap;
use fixline_core::message::{MsgType, MsgView};
use fixline_core::tags::{self, reject_reason};
use fixline_core::types::{CompId, SeqNum};
use fixline_session::config::{Role, SessionConfig, StoreFailurePolicy};
use fixline_session::heartbeat::{HeartbeatAction, HeartbeatManager, MAX_HEARTBEAT_INTERVAL};
use fixline_session::sequence::SequenceResult;
use fixline_session::state::{FixSessionState, SessionState, StateChange};
use fixline_store::{FixMsgStoreRecord, MessageStore};
use fixline_transport::codec::ReceivedMsg;
use fixline_transport::transmitter::{Encoded, Replay};
use fixline_transport::transport::{MsgTransport, TransportEvent};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::time::DelayQueue;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// One FIX session bound to an application and a message store.
pub struct FixSession<A: Application> {
    config: SessionConfig,
    app: A,
    store: Arc<dyn MessageStore>,
    state: FixSessionState,
    heartbeat: HeartbeatManager,
    handle: SessionHandle,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    state_tx: watch::Sender<SessionState>,
    transport: Option<MsgTransport>,
    transport_id: Option<u32>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    heartbeat_timer: Option<Interval>,
    logout_deadline: Option<Instant>,
    scheduled: DelayQueue<SessionCommand>,
    outcome: Option<Result<u32, FixError>>,
}

impl<A: Application> std::fmt::Debug for FixSession<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixSession")
            .field("comp_id", &self.config.sender_comp_id)
            .field("role", &self.config.role)
            .field("state", &self.state.state())
            .field("transport_id", &self.transport_id)
            .finish_non_exhaustive()
    }
}

impl<A: Application> FixSession<A> {
    /// Creates a session in `Idle`.
    ///
    /// # Arguments
    /// * `config` - Session configuration
    /// * `store` - Store receiving forwarded application messages
    /// * `app` - Application callbacks
    #[must_use]
    pub(crate) fn new(config: SessionConfig, store: Arc<dyn MessageStore>, app: A) -> Self {
        let last_peer = if config.reset_seq_num_flag {
            0
        } else {
            config.last_received_seq_num
        };
        let state = FixSessionState::new(
            config.sender_comp_id.clone(),
            config.heartbeat_interval,
            last_peer,
        );
        let heartbeat = HeartbeatManager::new(config.heartbeat_interval, config.test_request_grace);
        let (handle, commands, state_tx) = SessionHandle::channel();

        Self {
            config,
            app,
            store,
            state,
            heartbeat,
            handle,
            commands,
            state_tx,
            transport: None,
            transport_id: None,
            events: None,
            heartbeat_timer: None,
            logout_deadline: None,
            scheduled: DelayQueue::new(),
            outcome: None,
        }
    }

    /// Returns a handle for issuing commands.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state.state()
    }

    /// Returns the session record.
    #[must_use]
    pub const fn session_state(&self) -> &FixSessionState {
        &self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the application.
    #[must_use]
    pub const fn application(&self) -> &A {
        &self.app
    }

    /// Returns the message store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn MessageStore> {
        Arc::clone(&self.store)
    }

    /// Runs the session over `transport` until it stops.
    ///
    /// A session that already ran is reset first, so a reconnecting caller
    /// simply calls `run` again with the new transport. With
    /// `reset_seq_num_flag` the message store is cleared before the first
    /// message goes out.
    ///
    /// # Returns
    /// The transport id after a clean stop.
    ///
    /// # Errors
    /// Returns the error that terminated the session.
    pub async fn run(&mut self, transport: MsgTransport) -> Result<u32, FixError> {
        let span = info_span!("fix_session", comp_id = %self.config.sender_comp_id);
        self.run_inner(transport).instrument(span).await
    }

    async fn run_inner(&mut self, mut transport: MsgTransport) -> Result<u32, FixError> {
        if self.transport_id.is_some() {
            info!(state = %self.state.state(), "reset from previous transport");
            self.reset(None);
        }

        let id = transport.id();
        let events = transport.subscribe().ok_or_else(|| {
            TransportError::Config("transport events already taken".to_string())
        })?;
        transport
            .transmitter_mut()
            .set_next_seq_num(self.state.last_sent_seq_num().next());
        self.transport = Some(transport);
        self.transport_id = Some(id);
        self.events = Some(events);
        self.outcome = None;
        self.heartbeat.reset();

        if self.config.reset_seq_num_flag && !self.clear_store().await {
            return self.outcome.take().unwrap_or(Ok(id));
        }

        match self.config.role {
            Role::Initiator => {
                debug!(state = %self.state.state(), "initiator sending logon");
                let body = self.logon_body(self.config.reset_seq_num_flag);
                self.send(MsgType::Logon, &body).await;
                self.set_state(SessionState::InitiationLogonSent);
            }
            Role::Acceptor => {
                debug!(state = %self.state.state(), "acceptor waits for logon");
                self.set_state(SessionState::WaitingForALogon);
            }
        }

        while self.outcome.is_none() {
            tokio::select! {
                event = next_event(&mut self.events) => self.on_event(event).await,
                Some(command) = self.commands.recv() => self.on_command(command).await,
                () = tick(&mut self.heartbeat_timer) => self.on_heartbeat_tick().await,
                () = deadline(self.logout_deadline) => self.on_logout_timeout(),
                Some(expired) = self.scheduled.next(), if !self.scheduled.is_empty() => {
                    self.on_command(expired.into_inner()).await;
                }
            }
        }

        self.outcome.take().unwrap_or(Ok(id))
    }

    /// Prepares the session for a new connection.
    ///
    /// Timers and the transport are dropped. The next expected peer sequence
    /// number restarts from 0 when `reset_seq_num_flag` is configured,
    /// otherwise from `last_peer_seq_num` or the last one seen; the outbound
    /// sequence restarts at 1 only with `reset_seq_num_flag`.
    pub fn reset(&mut self, last_peer_seq_num: Option<u64>) {
        self.clear_timers();
        self.events = None;
        if let Some(mut transport) = self.transport.take() {
            transport.end();
        }
        let reset_flag = self.config.reset_seq_num_flag;
        let seq = if reset_flag {
            0
        } else {
            last_peer_seq_num.unwrap_or_else(|| self.state.last_peer_msg_seq_num().value())
        };
        self.state.reset(seq, reset_flag);
        self.heartbeat.reset();
        self.outcome = None;
        while self.commands.try_recv().is_ok() {}
        self.set_state(SessionState::NetworkConnectionEstablished);
    }

    /// Requests a graceful end.
    ///
    /// An established session logs out; a stopped one is left alone; any
    /// other state stops at once.
    pub async fn done(&mut self) {
        match self.state.state() {
            SessionState::InitiationLogonResponse
            | SessionState::ActiveNormalSession
            | SessionState::InitiationLogonReceived => self.session_logout().await,
            SessionState::Stopped => info!("done. session is now stopped"),
            _ => self.stop(None),
        }
        info!(state = %self.state.state(), "done. check logout sequence");
    }

    /// Sends a message through the current transport.
    ///
    /// A stopped session logs a warning and sends nothing.
    pub async fn send(&mut self, msg_type: MsgType, body: &FieldMap) {
        self.transmit(msg_type, body, None).await;
    }

    /// Stops the session; later calls do nothing.
    ///
    /// Timers are cleared, the transport ends, the outcome is recorded and
    /// `on_stopped` is called once.
    pub fn stop(&mut self, error: Option<FixError>) {
        if self.state.state() == SessionState::Stopped {
            return;
        }
        self.clear_timers();
        self.events = None;
        info!("stop: kill transport");
        if let Some(transport) = self.transport.as_mut() {
            transport.end();
        }
        self.transport = None;

        match &error {
            Some(e) => info!(error = %e, "stop: with error"),
            None => info!("stop: done"),
        }
        if let StateChange::Moved { from } = self.state.mark_stopped() {
            info!(%from, to = %SessionState::Stopped, "state change");
            self.state_tx.send_replace(SessionState::Stopped);
        }
        self.app.on_stopped(error.as_ref());

        let id = self.transport_id.unwrap_or_default();
        self.outcome = Some(match error {
            Some(e) => Err(e),
            None => Ok(id),
        });
    }

    fn terminate(&mut self, error: FixError) {
        if self.state.state() == SessionState::Stopped {
            return;
        }
        error!(error = %error, "terminating session");
        self.stop(Some(error));
    }

    fn set_state(&mut self, to: SessionState) {
        match self.state.set_state(to) {
            StateChange::Moved { from } => {
                info!(%from, %to, "state change");
                self.state_tx.send_replace(to);
            }
            StateChange::Ignored { current } => {
                info!(state = %current, requested = %to, "ignoring state change");
            }
            StateChange::Unchanged => {}
        }
    }

    fn clear_timers(&mut self) {
        if self.heartbeat_timer.take().is_some() {
            debug!("heartbeat timer stopped");
        }
        self.logout_deadline = None;
        self.scheduled.clear();
    }

    fn start_heartbeat(&mut self) {
        let period = self.state.heart_beat_interval();
        self.heartbeat.set_interval(period);
        self.heartbeat.reset();
        let first = Instant::now().checked_add(period);
        let Some(first) = first.filter(|_| !period.is_zero()) else {
            warn!(?period, "heartbeat interval out of range, timer not started");
            return;
        };
        let mut timer = tokio::time::interval_at(first, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat_timer = Some(timer);
    }

    async fn transmit(&mut self, msg_type: MsgType, body: &FieldMap, replay: Option<Replay>) {
        if self.state.state() == SessionState::Stopped {
            warn!(%msg_type, state = %self.state.state(), "can't send");
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            warn!(%msg_type, "can't send without a transport");
            return;
        };
        match transport
            .transmitter_mut()
            .send(&msg_type, body, replay)
            .await
        {
            Ok(encoded) => self.on_encoded(encoded),
            Err(TransportError::Encode(e)) => {
                warn!(%msg_type, error = %e, "message not sent");
            }
            Err(e) => self.terminate(e.into()),
        }
    }

    fn on_encoded(&mut self, encoded: Encoded) {
        let Encoded {
            msg_type,
            text,
            header,
        } = encoded;
        debug!(%msg_type, seq_num = %header.msg_seq_num, bytes = text.len(), "tx");
        self.state.on_sent(header);
        self.heartbeat.on_message_sent();
        self.app.on_encoded(&msg_type, &text);
    }

    async fn on_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Decoded {
                msg_type,
                text,
                len,
            }) => {
                debug!(%msg_type, len, "rx");
                self.app.on_decoded(&msg_type, &text);
            }
            Some(TransportEvent::Msg(msg)) => self.on_msg(msg).await,
            Some(TransportEvent::End) | None => {
                self.events = None;
                self.on_transport_end();
            }
            Some(TransportEvent::RxError(e)) => {
                warn!(error = %e, "rx error event");
                self.terminate(e.into());
            }
            Some(TransportEvent::TxError(e)) => {
                warn!(error = %e, "tx error event");
                self.terminate(e.into());
            }
        }
    }

    fn on_transport_end(&mut self) {
        let state = self.state.state();
        info!(%state, "rx end received");
        if state.is_expected_end() {
            self.stop(None);
        } else {
            self.set_state(SessionState::DetectBrokenNetworkConnection);
            self.terminate(
                SessionError::BrokenConnection {
                    state: state.to_string(),
                }
                .into(),
            );
        }
    }

    async fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Send { msg_type, body } => self.send(msg_type, &body).await,
            SessionCommand::Done => self.done().await,
            SessionCommand::Stop => self.stop(None),
            SessionCommand::Terminate(reason) => {
                self.terminate(SessionError::Terminated(reason).into());
            }
            SessionCommand::Schedule { delay, command } => {
                if delay > MAX_SCHEDULE_DELAY {
                    warn!(?delay, ?command, "schedule delay too long, command dropped");
                    return;
                }
                debug!(?delay, "command scheduled");
                self.scheduled.insert(*command, delay);
            }
        }
    }

    async fn on_heartbeat_tick(&mut self) {
        match self.heartbeat.poll() {
            HeartbeatAction::Idle => {}
            HeartbeatAction::SendHeartbeat => {
                self.send(MsgType::Heartbeat, &FieldMap::new()).await;
            }
            HeartbeatAction::SendTestRequest(id) => {
                info!(test_req_id = %id, "peer silent, sending test request");
                self.set_state(SessionState::AwaitingProcessingResponseToTestRequest);
                let body = FieldMap::new().with(tags::TEST_REQ_ID, id);
                self.send(MsgType::TestRequest, &body).await;
            }
            HeartbeatAction::TimedOut { elapsed } => {
                self.set_state(SessionState::DetectBrokenNetworkConnection);
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                self.terminate(SessionError::HeartbeatTimeout { elapsed_ms }.into());
            }
        }
    }

    fn on_logout_timeout(&mut self) {
        self.logout_deadline = None;
        info!(state = %self.state.state(), "logout timer expired");
        self.stop(None);
    }

    async fn on_msg(&mut self, msg: ReceivedMsg) {
        let view = match msg.view() {
            Ok(view) => view,
            Err(e) => {
                self.terminate(TransportError::Decode(e).into());
                return;
            }
        };
        let msg_type = msg.msg_type().clone();
        self.state.on_received();
        if self.config.log_received_msgs {
            debug!(%msg_type, text = msg.text(), "received");
        }

        if !self.config.manage_session {
            if let Some(seq) = view.seq_num() {
                self.state.record_peer_seq_num(seq);
            }
            info!(%msg_type, "forwarding to application");
            self.set_state(SessionState::ActiveNormalSession);
            self.forward(&msg_type, &view).await;
            return;
        }

        let answered = self.heartbeat.on_message_received(
            msg_type == MsgType::Heartbeat,
            view.get_field_str(tags::TEST_REQ_ID),
        );
        if answered
            && self.state.state() == SessionState::AwaitingProcessingResponseToTestRequest
        {
            self.set_state(SessionState::ActiveNormalSession);
        }

        if !self.check_integrity(&msg_type, &view).await {
            return;
        }

        match msg_type {
            MsgType::Logon => self.on_logon(&view).await,
            MsgType::Logout => self.on_peer_logout(&view).await,
            MsgType::Heartbeat => {}
            MsgType::TestRequest => {
                let mut body = FieldMap::new();
                if let Some(id) = view.get_field_str(tags::TEST_REQ_ID) {
                    body.push(tags::TEST_REQ_ID, id);
                }
                self.send(MsgType::Heartbeat, &body).await;
            }
            MsgType::ResendRequest => self.on_resend_request(&view).await,
            MsgType::SequenceReset => self.on_sequence_reset(&view).await,
            MsgType::Reject => {
                warn!(
                    ref_seq_num = view.get_field_str(tags::REF_SEQ_NUM),
                    text = view.get_field_str(tags::TEXT),
                    "peer rejected a message"
                );
            }
            _ => self.on_application_msg(&msg_type, &view).await,
        }
    }

    /// A Logon carrying `ResetSeqNumFlag=Y` while the handshake is open.
    fn is_reset_logon(&self, msg_type: &MsgType, view: &MsgView<'_>) -> bool {
        *msg_type == MsgType::Logon
            && view.get_field_str(tags::RESET_SEQ_NUM_FLAG) == Some("Y")
            && matches!(
                self.state.state(),
                SessionState::WaitingForALogon | SessionState::InitiationLogonSent
            )
    }

    /// Restarts sequence numbers for an accepted reset Logon.
    ///
    /// An acceptor restarts its outbound sequence too, so its Logon reply
    /// goes out as 1. The store is cleared either way.
    ///
    /// # Returns
    /// `false` if the session stopped.
    async fn on_reset_requested(&mut self, view: &MsgView<'_>) -> bool {
        let outbound = self.state.state() == SessionState::WaitingForALogon;
        info!(outbound, "peer requests sequence reset");
        self.state.reset(0, outbound);
        if outbound && let Some(transport) = self.transport.as_mut() {
            transport.transmitter_mut().set_next_seq_num(SeqNum::new(1));
        }
        if !self.clear_store().await {
            return false;
        }
        if let Some(seq) = view.seq_num() {
            self.state.record_peer_seq_num(seq);
        }
        true
    }

    /// # Returns
    /// `true` if the session carries on.
    async fn clear_store(&mut self) -> bool {
        match self.store.clear().await {
            Ok(()) => {
                debug!("message store cleared");
                true
            }
            Err(e) => self.on_store_failure(e),
        }
    }

    /// Checks CompIDs and sequence numbers.
    ///
    /// # Returns
    /// `false` if the message must not be processed further.
    async fn check_integrity(&mut self, msg_type: &MsgType, view: &MsgView<'_>) -> bool {
        let Some(seq) = view.seq_num() else {
            if self.config.check_msg_integrity {
                self.send_reject(
                    None,
                    msg_type,
                    reject_reason::REQUIRED_TAG_MISSING,
                    Some(tags::MSG_SEQ_NUM),
                    "missing MsgSeqNum",
                )
                .await;
                return false;
            }
            return true;
        };

        if !self.config.check_msg_integrity {
            self.state.record_peer_seq_num(seq);
            return true;
        }

        let ours = self.config.sender_comp_id.as_str();
        if let Some(target) = view.target_comp_id()
            && target != ours
        {
            warn!(received = target, expected = ours, "TargetCompID mismatch");
            self.state.record_peer_seq_num(seq);
            self.send_reject(
                Some(seq),
                msg_type,
                reject_reason::COMP_ID_PROBLEM,
                Some(tags::TARGET_COMP_ID),
                "TargetCompID mismatch",
            )
            .await;
            return false;
        }

        if *msg_type == MsgType::SequenceReset || self.is_reset_logon(msg_type, view) {
            return true;
        }

        let expected = self.state.next_expected_peer_seq_num();
        match SequenceResult::classify(expected, seq, view.is_poss_dup()) {
            SequenceResult::Ok => {
                self.state.record_peer_seq_num(seq);
                if self.state.state() == SessionState::AwaitingProcessingResponseToResendRequest {
                    self.set_state(SessionState::ActiveNormalSession);
                }
                true
            }
            SequenceResult::Duplicate { received } => {
                debug!(received, "ignoring possible duplicate");
                false
            }
            SequenceResult::TooLow { expected, received } => {
                self.terminate(SessionError::SequenceTooLow { expected, received }.into());
                false
            }
            SequenceResult::Gap { expected, received } => {
                let established = matches!(
                    self.state.state(),
                    SessionState::ActiveNormalSession
                        | SessionState::AwaitingProcessingResponseToTestRequest
                );
                if !established {
                    if self.state.state() != SessionState::AwaitingProcessingResponseToResendRequest {
                        self.state.record_peer_seq_num(seq);
                    }
                    return msg_type.is_admin();
                }
                info!(expected, received, "sequence gap, requesting resend");
                let body = FieldMap::new()
                    .with(tags::BEGIN_SEQ_NO, expected)
                    .with(tags::END_SEQ_NO, 0u64);
                self.send(MsgType::ResendRequest, &body).await;
                self.set_state(SessionState::AwaitingProcessingResponseToResendRequest);
                msg_type.is_admin()
            }
        }
    }

    async fn on_logon(&mut self, view: &MsgView<'_>) {
        let user = view.get_field_str(tags::USERNAME);
        let password = view.get_field_str(tags::PASSWORD);
        info!(user, "peer logs in");
        let accepted = self.app.on_logon(view, user, password).await;
        if self.state.state() == SessionState::Stopped {
            debug!("session stopped while logon was checked");
            return;
        }
        if !accepted {
            self.send_logout("logon rejected").await;
            self.terminate(
                SessionError::LogonRejected {
                    reason: "logon rejected".to_string(),
                }
                .into(),
            );
            return;
        }

        if let Some(peer) = view.sender_comp_id().and_then(CompId::new) {
            if let Some(transport) = self.transport.as_mut() {
                transport.transmitter_mut().set_target_comp_id(peer.clone());
            }
            self.state.set_peer_comp_id(peer);
        }
        if self.is_reset_logon(&MsgType::Logon, view) && !self.on_reset_requested(view).await {
            return;
        }
        let mut bad_interval = false;
        if let Ok(secs) = view.get_field_as::<u64>(tags::HEART_BT_INT)
            && secs > 0
        {
            let interval = Duration::from_secs(secs);
            if interval <= MAX_HEARTBEAT_INTERVAL {
                self.state.set_heart_beat_interval(interval);
            } else {
                warn!(secs, kept = ?self.state.heart_beat_interval(), "HeartBtInt out of range");
                bad_interval = true;
            }
        }

        match self.state.state() {
            SessionState::WaitingForALogon => {
                self.set_state(SessionState::InitiationLogonReceived);
                let reset = view.get_field_str(tags::RESET_SEQ_NUM_FLAG) == Some("Y");
                let body = self.logon_body(reset);
                self.send(MsgType::Logon, &body).await;
                self.set_state(SessionState::InitiationLogonResponse);
                self.set_state(SessionState::ActiveNormalSession);
            }
            SessionState::InitiationLogonSent => {
                self.set_state(SessionState::InitiationLogonResponse);
                self.set_state(SessionState::ActiveNormalSession);
            }
            state => {
                warn!(%state, "unexpected logon");
                self.send_reject(
                    view.seq_num(),
                    &MsgType::Logon,
                    reject_reason::OTHER,
                    None,
                    &format!("unexpected Logon in state {}", state.as_str()),
                )
                .await;
                return;
            }
        }

        if bad_interval {
            self.send_reject(
                view.seq_num(),
                &MsgType::Logon,
                reject_reason::VALUE_INCORRECT,
                Some(tags::HEART_BT_INT),
                "HeartBtInt out of range",
            )
            .await;
        }
        if self.state.state() != SessionState::ActiveNormalSession {
            return;
        }
        self.start_heartbeat();
        info!(interval = ?self.state.heart_beat_interval(), "session ready");
        self.app.on_ready(&self.handle, view);
    }

    async fn on_peer_logout(&mut self, view: &MsgView<'_>) {
        let text = view.get_field_str(tags::TEXT).unwrap_or_default();
        match self.state.state() {
            SessionState::WaitingLogoutConfirm => {
                info!(text, "peer confirms logout");
                self.stop(None);
            }
            SessionState::InitiationLogonResponse
            | SessionState::ActiveNormalSession
            | SessionState::InitiationLogonReceived
            | SessionState::AwaitingProcessingResponseToTestRequest
            | SessionState::AwaitingProcessingResponseToResendRequest => {
                self.set_state(SessionState::ConfirmingLogout);
                info!(text, "peer initiates logout");
                self.session_logout().await;
            }
            state => debug!(%state, text, "ignoring logout"),
        }
    }

    async fn session_logout(&mut self) {
        if self.state.logout_sent_at().is_some() {
            return;
        }
        match self.state.state() {
            SessionState::ActiveNormalSession
            | SessionState::InitiationLogonResponse
            | SessionState::InitiationLogonReceived
            | SessionState::AwaitingProcessingResponseToTestRequest
            | SessionState::AwaitingProcessingResponseToResendRequest => {
                self.set_state(SessionState::WaitingLogoutConfirm);
                let text = format!("{} initiate logout", self.config.sender_comp_id);
                info!("{text}");
                self.send_logout(&text).await;
            }
            SessionState::ConfirmingLogout => {
                let text = format!("{} confirming logout", self.config.sender_comp_id);
                info!("{text}");
                self.send_logout(&text).await;
            }
            state => {
                info!(%state, "session logout ignored");
                return;
            }
        }
        self.logout_deadline = Some(Instant::now() + self.config.logout_timeout);
    }

    async fn send_logout(&mut self, text: &str) {
        if !self.state.mark_logout_sent() {
            return;
        }
        info!(text, "sending logout");
        let body = FieldMap::new().with(tags::TEXT, text);
        self.send(MsgType::Logout, &body).await;
    }

    async fn on_resend_request(&mut self, view: &MsgView<'_>) {
        let Ok(begin) = view.get_field_as::<u64>(tags::BEGIN_SEQ_NO) else {
            self.send_reject(
                view.seq_num(),
                &MsgType::ResendRequest,
                reject_reason::REQUIRED_TAG_MISSING,
                Some(tags::BEGIN_SEQ_NO),
                "missing BeginSeqNo",
            )
            .await;
            return;
        };

        let previous = self.state.state();
        self.set_state(SessionState::HandleResendRequest);
        let next = self
            .transport
            .as_ref()
            .map_or(SeqNum::new(1), |t| t.transmitter().next_seq_num());
        let begin = SeqNum::new(begin.max(1));
        if begin < next {
            info!(begin = %begin, new_seq_no = %next, "answering resend request with gap fill");
            let body = FieldMap::new()
                .with(tags::GAP_FILL_FLAG, true)
                .with(tags::NEW_SEQ_NO, next.value());
            let replay = Replay {
                seq_num: begin,
                orig_sending_time: None,
            };
            self.transmit(MsgType::SequenceReset, &body, Some(replay)).await;
        } else {
            debug!(begin = %begin, next = %next, "nothing to resend");
        }
        if self.state.state() == SessionState::HandleResendRequest {
            self.set_state(previous);
        }
    }

    async fn on_sequence_reset(&mut self, view: &MsgView<'_>) {
        let Ok(new_seq_no) = view.get_field_as::<u64>(tags::NEW_SEQ_NO) else {
            self.send_reject(
                view.seq_num(),
                &MsgType::SequenceReset,
                reject_reason::REQUIRED_TAG_MISSING,
                Some(tags::NEW_SEQ_NO),
                "missing NewSeqNo",
            )
            .await;
            return;
        };

        let expected = self.state.next_expected_peer_seq_num();
        if new_seq_no < expected.value() {
            warn!(new_seq_no, expected = %expected, "sequence reset would decrease");
            self.send_reject(
                view.seq_num(),
                &MsgType::SequenceReset,
                reject_reason::VALUE_INCORRECT,
                Some(tags::NEW_SEQ_NO),
                "NewSeqNo lower than expected",
            )
            .await;
            return;
        }

        self.state
            .record_peer_seq_num(SeqNum::new(new_seq_no.saturating_sub(1)));
        info!(new_seq_no, "peer sequence reset");
        if self.state.state() == SessionState::AwaitingProcessingResponseToResendRequest {
            self.set_state(SessionState::ActiveNormalSession);
        }
    }

    async fn on_application_msg(&mut self, msg_type: &MsgType, view: &MsgView<'_>) {
        let state = self.state.state();
        if !state.accepts_application_msgs() {
            warn!(%msg_type, %state, "application message in wrong state");
            self.send_reject(
                view.seq_num(),
                msg_type,
                reject_reason::OTHER,
                None,
                &format!("MsgType {msg_type} not accepted in state {}", state.as_str()),
            )
            .await;
            return;
        }
        self.forward(msg_type, view).await;
    }

    async fn forward(&mut self, msg_type: &MsgType, view: &MsgView<'_>) {
        if self.config.persist_received {
            let stored = match FixMsgStoreRecord::from_view(view) {
                Ok(record) => self.store.put(record).await,
                Err(e) => Err(e),
            };
            if self.state.state() == SessionState::Stopped {
                return;
            }
            match stored {
                Ok(extent) => debug!(?extent, "store state"),
                Err(e) => {
                    if !self.on_store_failure(e) {
                        return;
                    }
                }
            }
        }
        self.app.on_application_msg(&self.handle, msg_type, view).await;
    }

    /// # Returns
    /// `true` if dispatch continues.
    fn on_store_failure(&mut self, error: StoreError) -> bool {
        error!(error = %error, "message store failure");
        match self.config.store_failure_policy {
            StoreFailurePolicy::Continue => true,
            StoreFailurePolicy::Terminate => {
                self.terminate(error.into());
                false
            }
        }
    }

    async fn send_reject(
        &mut self,
        ref_seq_num: Option<SeqNum>,
        ref_msg_type: &MsgType,
        reason: u32,
        ref_tag: Option<u32>,
        text: &str,
    ) {
        let mut body = FieldMap::new();
        if let Some(seq) = ref_seq_num {
            body.push(tags::REF_SEQ_NUM, seq.value());
        }
        if let Some(tag) = ref_tag {
            body.push(tags::REF_TAG_ID, u64::from(tag));
        }
        body.push(tags::REF_MSG_TYPE, ref_msg_type.as_str());
        body.push(tags::SESSION_REJECT_REASON, u64::from(reason));
        body.push(tags::TEXT, text);
        self.send(MsgType::Reject, &body).await;
    }

    fn logon_body(&self, reset: bool) -> FieldMap {
        let mut body = FieldMap::new()
            .with(tags::ENCRYPT_METHOD, 0u64)
            .with(tags::HEART_BT_INT, self.state.heart_beat_interval().as_secs());
        if reset {
            body.push(tags::RESET_SEQ_NUM_FLAG, true);
        }
        if let Some(user) = &self.config.username {
            body.push(tags::USERNAME, user.as_str());
        }
        if let Some(password) = &self.config.password {
            body.push(tags::PASSWORD, password.as_str());
        }
        body
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<TransportEvent>>) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fixline_store::MemoryStore;
    use fixline_store::StoreState;
    use fixline_transport::config::TransportConfig;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Logon(Option<String>),
        Ready,
        App(MsgType),
        Stopped(Option<String>),
    }

    struct Recorder {
        seen: mpsc::UnboundedSender<Seen>,
        accept: bool,
    }

    #[async_trait]
    impl Application for Recorder {
        async fn on_application_msg(
            &mut self,
            _session: &SessionHandle,
            msg_type: &MsgType,
            _view: &MsgView<'_>,
        ) {
            let _ = self.seen.send(Seen::App(msg_type.clone()));
        }

        async fn on_logon(
            &mut self,
            _view: &MsgView<'_>,
            user: Option<&str>,
            _password: Option<&str>,
        ) -> bool {
            let _ = self.seen.send(Seen::Logon(user.map(str::to_string)));
            self.accept
        }

        fn on_ready(&mut self, _session: &SessionHandle, _view: &MsgView<'_>) {
            let _ = self.seen.send(Seen::Ready);
        }

        fn on_stopped(&mut self, error: Option<&FixError>) {
            let _ = self.seen.send(Seen::Stopped(error.map(ToString::to_string)));
        }
    }

    fn comp(id: &str) -> CompId {
        CompId::new(id).unwrap()
    }

    fn session_config(role: Role) -> SessionConfig {
        match role {
            Role::Initiator => SessionConfig::new(comp("INIT"), comp("ACC"), "FIX.4.4", role),
            Role::Acceptor => SessionConfig::new(comp("ACC"), comp("INIT"), "FIX.4.4", role),
        }
    }

    fn transport_config(config: &SessionConfig) -> TransportConfig {
        TransportConfig::new(
            config.begin_string.clone(),
            config.sender_comp_id.clone(),
            config.target_comp_id.clone(),
        )
    }

    struct Harness {
        session: FixSession<Recorder>,
        seen: mpsc::UnboundedReceiver<Seen>,
        transport: MsgTransport,
        peer_stream: DuplexStream,
    }

    fn harness(config: SessionConfig, accept: bool) -> Harness {
        let (tx, seen) = mpsc::unbounded_channel();
        let app = Recorder { seen: tx, accept };
        let tc = transport_config(&config);
        let session = FixSession::new(config, Arc::new(MemoryStore::new()), app);
        let (ours, peer_stream) = duplex(64 * 1024);
        let transport = MsgTransport::new(1, &tc, ours).unwrap();
        Harness {
            session,
            seen,
            transport,
            peer_stream,
        }
    }

    struct Peer {
        transport: MsgTransport,
        events: mpsc::Receiver<TransportEvent>,
    }

    impl Peer {
        fn new(config: &SessionConfig, stream: DuplexStream) -> Self {
            let tc = transport_config(config).reversed();
            let mut transport = MsgTransport::new(2, &tc, stream).unwrap();
            let events = transport.subscribe().unwrap();
            Self { transport, events }
        }

        async fn send(&mut self, msg_type: MsgType, body: FieldMap) {
            self.transport
                .transmitter_mut()
                .send(&msg_type, &body, None)
                .await
                .unwrap();
        }

        async fn recv(&mut self) -> ReceivedMsg {
            loop {
                let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                    .await
                    .expect("peer timed out")
                    .expect("peer events closed");
                if let TransportEvent::Msg(msg) = event {
                    return msg;
                }
            }
        }

        async fn expect(&mut self, msg_type: MsgType) -> ReceivedMsg {
            let msg = self.recv().await;
            assert_eq!(msg.msg_type(), &msg_type, "unexpected {}", msg.text());
            msg
        }

        async fn quiet(&mut self) -> bool {
            loop {
                match tokio::time::timeout(Duration::from_millis(100), self.events.recv()).await {
                    Err(_) => return true,
                    Ok(Some(TransportEvent::Decoded { .. })) => continue,
                    Ok(Some(TransportEvent::Msg(_))) => return false,
                    Ok(_) => return true,
                }
            }
        }
    }

    type Running = tokio::task::JoinHandle<(FixSession<Recorder>, Result<u32, FixError>)>;

    fn spawn(mut session: FixSession<Recorder>, transport: MsgTransport) -> Running {
        tokio::spawn(async move {
            let result = session.run(transport).await;
            (session, result)
        })
    }

    async fn next_seen(seen: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
        tokio::time::timeout(Duration::from_secs(5), seen.recv())
            .await
            .expect("application timed out")
            .expect("application channel closed")
    }

    fn logon(interval: u64) -> FieldMap {
        FieldMap::new()
            .with(tags::ENCRYPT_METHOD, 0u64)
            .with(tags::HEART_BT_INT, interval)
    }

    /// Starts an acceptor and completes the handshake from the peer side.
    async fn active_acceptor(
        config: SessionConfig,
    ) -> (Running, SessionHandle, Peer, mpsc::UnboundedReceiver<Seen>) {
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let handle = session.handle();
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        peer.send(MsgType::Logon, logon(30)).await;
        peer.expect(MsgType::Logon).await;
        assert_eq!(next_seen(&mut seen).await, Seen::Logon(None));
        assert_eq!(next_seen(&mut seen).await, Seen::Ready);
        (running, handle, peer, seen)
    }

    #[tokio::test]
    async fn test_initiator_handshake_and_logout() {
        let config = session_config(Role::Initiator).with_credentials("user", "secret");
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let handle = session.handle();
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        let logon_msg = peer.expect(MsgType::Logon).await;
        let view = logon_msg.view().unwrap();
        assert_eq!(view.seq_num(), Some(SeqNum::new(1)));
        assert_eq!(view.get_field_str(tags::HEART_BT_INT), Some("30"));
        assert_eq!(view.get_field_str(tags::USERNAME), Some("user"));
        assert_eq!(view.get_field_str(tags::PASSWORD), Some("secret"));
        handle
            .wait_for_state(SessionState::InitiationLogonSent)
            .await
            .unwrap();

        peer.send(MsgType::Logon, logon(30)).await;
        assert_eq!(next_seen(&mut seen).await, Seen::Logon(None));
        assert_eq!(next_seen(&mut seen).await, Seen::Ready);
        assert_eq!(handle.state(), SessionState::ActiveNormalSession);

        handle.done().unwrap();
        let logout = peer.expect(MsgType::Logout).await;
        assert_eq!(
            logout.view().unwrap().get_field_str(tags::TEXT),
            Some("INIT initiate logout")
        );
        handle
            .wait_for_state(SessionState::WaitingLogoutConfirm)
            .await
            .unwrap();

        peer.send(MsgType::Logout, FieldMap::new().with(tags::TEXT, "ok")).await;
        let (session, result) = running.await.unwrap();
        assert_eq!(result.unwrap(), 1);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(next_seen(&mut seen).await, Seen::Stopped(None));
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_peer_initiated_logout() {
        let config = session_config(Role::Acceptor);
        let (running, handle, mut peer, mut seen) = active_acceptor(config).await;

        peer.send(MsgType::Logout, FieldMap::new().with(tags::TEXT, "bye")).await;
        peer.expect(MsgType::Logout).await;
        handle
            .wait_for_state(SessionState::ConfirmingLogout)
            .await
            .unwrap();
        assert!(peer.quiet().await);

        drop(peer);
        let (session, result) = running.await.unwrap();
        assert_eq!(result.unwrap(), 1);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(next_seen(&mut seen).await, Seen::Stopped(None));
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broken_connection() {
        let config = session_config(Role::Acceptor);
        let (running, _handle, peer, mut seen) = active_acceptor(config).await;

        drop(peer);
        let (session, result) = running.await.unwrap();
        assert!(matches!(
            result,
            Err(FixError::Session(SessionError::BrokenConnection { .. }))
        ));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(next_seen(&mut seen).await, Seen::Stopped(Some(_))));
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bad_checksum_terminates_without_dispatch() {
        let config = session_config(Role::Acceptor);
        let Harness {
            session,
            mut seen,
            transport,
            mut peer_stream,
        } = harness(config, true);
        let running = spawn(session, transport);

        peer_stream
            .write_all(b"8=FIX.4.4\x019=5\x0135=0\x0110=000\x01")
            .await
            .unwrap();

        let (session, result) = running.await.unwrap();
        let err = result.unwrap_err();
        assert!(err.is_framing());
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(next_seen(&mut seen).await, Seen::Stopped(Some(_))));
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_and_stop_after_stopped() {
        let config = session_config(Role::Acceptor);
        let (running, _handle, peer, mut seen) = active_acceptor(config).await;
        drop(peer);
        let (mut session, result) = running.await.unwrap();
        assert!(result.is_err());

        let sent = session.session_state().last_sent_seq_num();
        session.send(MsgType::Heartbeat, &FieldMap::new()).await;
        assert_eq!(session.session_state().last_sent_seq_num(), sent);

        session.stop(None);
        session.stop(Some(SessionError::Terminated("again".to_string()).into()));
        assert!(matches!(next_seen(&mut seen).await, Seen::Stopped(Some(_))));
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_logon_rejected() {
        let config = session_config(Role::Acceptor);
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), false);
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        peer.send(
            MsgType::Logon,
            logon(30).with(tags::USERNAME, "mallory"),
        )
        .await;
        let logout = peer.expect(MsgType::Logout).await;
        assert_eq!(
            logout.view().unwrap().get_field_str(tags::TEXT),
            Some("logon rejected")
        );

        let (_, result) = running.await.unwrap();
        assert!(matches!(
            result,
            Err(FixError::Session(SessionError::LogonRejected { .. }))
        ));
        assert_eq!(
            next_seen(&mut seen).await,
            Seen::Logon(Some("mallory".to_string()))
        );
        assert!(matches!(next_seen(&mut seen).await, Seen::Stopped(Some(_))));
    }

    #[tokio::test]
    async fn test_application_msg_before_logon_is_rejected() {
        let config = session_config(Role::Acceptor);
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let handle = session.handle();
        let mut peer = Peer::new(&config, peer_stream);
        let _running = spawn(session, transport);

        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "ORD-1"))
            .await;
        let reject = peer.expect(MsgType::Reject).await;
        let view = reject.view().unwrap();
        assert_eq!(view.get_field_str(tags::REF_MSG_TYPE), Some("D"));
        assert_eq!(handle.state(), SessionState::WaitingForALogon);
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_application_msg_is_stored_and_dispatched() {
        let config = session_config(Role::Acceptor);
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let store = session.store();
        let mut peer = Peer::new(&config, peer_stream);
        let _running = spawn(session, transport);

        peer.send(MsgType::Logon, logon(30)).await;
        peer.expect(MsgType::Logon).await;
        next_seen(&mut seen).await;
        next_seen(&mut seen).await;

        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "ORD-1"))
            .await;
        assert_eq!(
            next_seen(&mut seen).await,
            Seen::App(MsgType::NewOrderSingle)
        );
        assert_eq!(store.size().await, 1);
        let record = store.get(2).await.unwrap();
        assert_eq!(record.msg_type, MsgType::NewOrderSingle);
    }

    #[tokio::test]
    async fn test_test_request_is_answered() {
        let config = session_config(Role::Acceptor);
        let (_running, _handle, mut peer, _seen) = active_acceptor(config).await;

        peer.send(
            MsgType::TestRequest,
            FieldMap::new().with(tags::TEST_REQ_ID, "ping-1"),
        )
        .await;
        let heartbeat = peer.expect(MsgType::Heartbeat).await;
        assert_eq!(
            heartbeat.view().unwrap().get_field_str(tags::TEST_REQ_ID),
            Some("ping-1")
        );
    }

    #[tokio::test]
    async fn test_resend_request_gap_fill() {
        let config = session_config(Role::Acceptor);
        let (_running, handle, mut peer, _seen) = active_acceptor(config).await;

        peer.send(
            MsgType::ResendRequest,
            FieldMap::new()
                .with(tags::BEGIN_SEQ_NO, 1u64)
                .with(tags::END_SEQ_NO, 0u64),
        )
        .await;
        let reset = peer.expect(MsgType::SequenceReset).await;
        let view = reset.view().unwrap();
        assert_eq!(view.seq_num(), Some(SeqNum::new(1)));
        assert!(view.is_poss_dup());
        assert_eq!(view.get_field_str(tags::GAP_FILL_FLAG), Some("Y"));
        assert_eq!(view.get_field_str(tags::NEW_SEQ_NO), Some("2"));
        handle
            .wait_for_state(SessionState::ActiveNormalSession)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sequence_gap_requests_resend() {
        let config = session_config(Role::Acceptor);
        let (_running, handle, mut peer, mut seen) = active_acceptor(config).await;

        peer.transport
            .transmitter_mut()
            .set_next_seq_num(SeqNum::new(5));
        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "ORD-1"))
            .await;
        let request = peer.expect(MsgType::ResendRequest).await;
        let view = request.view().unwrap();
        assert_eq!(view.get_field_str(tags::BEGIN_SEQ_NO), Some("2"));
        assert_eq!(view.get_field_str(tags::END_SEQ_NO), Some("0"));
        handle
            .wait_for_state(SessionState::AwaitingProcessingResponseToResendRequest)
            .await
            .unwrap();

        let replay = Replay {
            seq_num: SeqNum::new(2),
            orig_sending_time: None,
        };
        peer.transport
            .transmitter_mut()
            .send(
                &MsgType::SequenceReset,
                &FieldMap::new()
                    .with(tags::GAP_FILL_FLAG, true)
                    .with(tags::NEW_SEQ_NO, 6u64),
                Some(replay),
            )
            .await
            .unwrap();
        handle
            .wait_for_state(SessionState::ActiveNormalSession)
            .await
            .unwrap();

        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "ORD-2"))
            .await;
        assert_eq!(
            next_seen(&mut seen).await,
            Seen::App(MsgType::NewOrderSingle)
        );
    }

    #[tokio::test]
    async fn test_comp_id_mismatch_is_rejected() {
        let config = session_config(Role::Acceptor);
        let Harness {
            session,
            transport,
            peer_stream,
            ..
        } = harness(config.clone(), true);
        let _running = spawn(session, transport);

        let tc = TransportConfig::new("FIX.4.4", comp("INIT"), comp("OTHER"));
        let mut transport = MsgTransport::new(2, &tc, peer_stream).unwrap();
        let events = transport.subscribe().unwrap();
        let mut peer = Peer { transport, events };
        peer.send(MsgType::Logon, logon(30)).await;

        let reject = peer.expect(MsgType::Reject).await;
        let view = reject.view().unwrap();
        assert_eq!(view.get_field_str(tags::SESSION_REJECT_REASON), Some("9"));
        assert_eq!(view.get_field_str(tags::REF_TAG_ID), Some("56"));
    }

    #[tokio::test]
    async fn test_sequence_too_low_terminates() {
        let config = session_config(Role::Acceptor).with_last_received_seq_num(10);
        let Harness {
            session,
            transport,
            peer_stream,
            ..
        } = harness(config.clone(), true);
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        peer.send(MsgType::Logon, logon(30)).await;
        let (_, result) = running.await.unwrap();
        assert!(matches!(
            result,
            Err(FixError::Session(SessionError::SequenceTooLow {
                expected: 11,
                received: 1
            }))
        ));
    }

    #[tokio::test]
    async fn test_reset_seq_num_flag_on_logon() {
        let config = session_config(Role::Acceptor).with_last_received_seq_num(10);
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        peer.send(
            MsgType::Logon,
            logon(30).with(tags::RESET_SEQ_NUM_FLAG, true),
        )
        .await;
        let reply = peer.expect(MsgType::Logon).await;
        let view = reply.view().unwrap();
        assert_eq!(view.seq_num(), Some(SeqNum::new(1)));
        assert_eq!(view.get_field_str(tags::RESET_SEQ_NUM_FLAG), Some("Y"));
        next_seen(&mut seen).await;
        assert_eq!(next_seen(&mut seen).await, Seen::Ready);
        drop(running);
    }

    #[tokio::test]
    async fn test_unmanaged_session_forwards_everything() {
        let config = session_config(Role::Acceptor).with_manage_session(false);
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let handle = session.handle();
        let mut peer = Peer::new(&config, peer_stream);
        let _running = spawn(session, transport);

        peer.send(MsgType::Logon, logon(30)).await;
        assert_eq!(next_seen(&mut seen).await, Seen::App(MsgType::Logon));
        assert_eq!(handle.state(), SessionState::ActiveNormalSession);
        assert!(peer.quiet().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_timeout() {
        let config = session_config(Role::Acceptor)
            .with_heartbeat_interval(Duration::from_secs(1))
            .with_test_request_grace(Duration::from_secs(1));
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        peer.send(MsgType::Logon, logon(1)).await;
        peer.expect(MsgType::Logon).await;
        assert_eq!(next_seen(&mut seen).await, Seen::Logon(None));
        assert_eq!(next_seen(&mut seen).await, Seen::Ready);

        let (_, result) = running.await.unwrap();
        assert!(matches!(
            result,
            Err(FixError::Session(SessionError::HeartbeatTimeout { .. }))
        ));

        let mut saw_test_request = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(10), peer.events.recv()).await
        {
            if let TransportEvent::Msg(msg) = event
                && msg.msg_type() == &MsgType::TestRequest
            {
                saw_test_request = true;
            }
        }
        assert!(saw_test_request);
        assert!(matches!(next_seen(&mut seen).await, Seen::Stopped(Some(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_logout() {
        let config = session_config(Role::Acceptor);
        let (running, handle, mut peer, _seen) = active_acceptor(config).await;

        handle
            .schedule(Duration::from_secs(2), SessionCommand::Done)
            .unwrap();
        peer.expect(MsgType::Logout).await;
        peer.send(MsgType::Logout, FieldMap::new()).await;

        let (_, result) = running.await.unwrap();
        assert_eq!(result.unwrap(), 1);
    }

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn put(&self, record: FixMsgStoreRecord) -> Result<StoreState, StoreError> {
            Err(StoreError::StoreFailed {
                seq_num: record.seq_num.value(),
                reason: "disk full".to_string(),
            })
        }

        async fn get(&self, seq_num: u64) -> Result<FixMsgStoreRecord, StoreError> {
            Err(StoreError::NotFound { seq_num })
        }

        async fn get_seq_num_range(
            &self,
            _from: u64,
            _to: u64,
        ) -> Result<Vec<FixMsgStoreRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn exists(&self, _seq_num: u64) -> bool {
            false
        }

        async fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn size(&self) -> usize {
            0
        }
    }

    async fn store_failure(policy: StoreFailurePolicy) -> (Vec<Seen>, Option<Result<u32, FixError>>) {
        let config = session_config(Role::Acceptor).with_store_failure_policy(policy);
        let (tx, mut seen) = mpsc::unbounded_channel();
        let session = FixSession::new(
            config.clone(),
            Arc::new(FailingStore),
            Recorder { seen: tx, accept: true },
        );
        let (ours, theirs) = duplex(64 * 1024);
        let transport = MsgTransport::new(1, &transport_config(&config), ours).unwrap();
        let mut peer = Peer::new(&config, theirs);
        let running = spawn(session, transport);

        peer.send(MsgType::Logon, logon(30)).await;
        peer.expect(MsgType::Logon).await;
        next_seen(&mut seen).await;
        next_seen(&mut seen).await;
        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "ORD-1"))
            .await;

        let after = next_seen(&mut seen).await;
        let result = if matches!(after, Seen::Stopped(_)) {
            Some(running.await.unwrap().1)
        } else {
            None
        };
        (vec![after], result)
    }

    #[tokio::test]
    async fn test_store_failure_continue_dispatches() {
        let (seen, result) = store_failure(StoreFailurePolicy::Continue).await;
        assert_eq!(seen, vec![Seen::App(MsgType::NewOrderSingle)]);
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_terminate_stops() {
        let (_, result) = store_failure(StoreFailurePolicy::Terminate).await;
        assert!(matches!(
            result,
            Some(Err(FixError::Store(StoreError::StoreFailed { .. })))
        ));
    }

    #[tokio::test]
    async fn test_run_again_resets() {
        let config = session_config(Role::Acceptor);
        let (running, _handle, peer, _seen) = active_acceptor(config.clone()).await;
        drop(peer);
        let (mut session, result) = running.await.unwrap();
        assert!(result.is_err());
        let last_peer = session.session_state().last_peer_msg_seq_num();
        assert_eq!(last_peer, SeqNum::new(1));

        let (ours, theirs) = duplex(64 * 1024);
        let transport = MsgTransport::new(3, &transport_config(&config), ours).unwrap();
        let mut peer = Peer::new(&config, theirs);
        peer.transport
            .transmitter_mut()
            .set_next_seq_num(SeqNum::new(2));
        let handle = session.handle();
        let running = tokio::spawn(async move {
            let result = session.run(transport).await;
            (session, result)
        });

        peer.send(MsgType::Logon, logon(30)).await;
        let reply = peer.expect(MsgType::Logon).await;
        assert_eq!(reply.view().unwrap().seq_num(), Some(SeqNum::new(2)));
        handle
            .wait_for_state(SessionState::ActiveNormalSession)
            .await
            .unwrap();
        handle.stop().unwrap();
        let (_, result) = running.await.unwrap();
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_initiator_against_acceptor() {
        let init_config = session_config(Role::Initiator);
        let acc_config = session_config(Role::Acceptor);
        let (init_tx, mut init_seen) = mpsc::unbounded_channel();
        let (acc_tx, mut acc_seen) = mpsc::unbounded_channel();
        let initiator = FixSession::new(
            init_config.clone(),
            Arc::new(MemoryStore::new()),
            Recorder { seen: init_tx, accept: true },
        );
        let acceptor = FixSession::new(
            acc_config.clone(),
            Arc::new(MemoryStore::new()),
            Recorder { seen: acc_tx, accept: true },
        );
        let (a, b) = duplex(64 * 1024);
        let init_transport = MsgTransport::new(1, &transport_config(&init_config), a).unwrap();
        let acc_transport = MsgTransport::new(2, &transport_config(&acc_config), b).unwrap();
        let init_handle = initiator.handle();
        let acc_handle = acceptor.handle();
        let acc_running = spawn(acceptor, acc_transport);
        let init_running = spawn(initiator, init_transport);

        for seen in [&mut init_seen, &mut acc_seen] {
            assert_eq!(next_seen(seen).await, Seen::Logon(None));
            assert_eq!(next_seen(seen).await, Seen::Ready);
        }
        acc_handle
            .wait_for_state(SessionState::ActiveNormalSession)
            .await
            .unwrap();

        init_handle.done().unwrap();
        let (initiator, init_result) = init_running.await.unwrap();
        let (acceptor, acc_result) = acc_running.await.unwrap();
        assert_eq!(init_result.unwrap(), 1);
        assert_eq!(acc_result.unwrap(), 2);
        assert_eq!(initiator.state(), SessionState::Stopped);
        assert_eq!(acceptor.state(), SessionState::Stopped);
        for seen in [&mut init_seen, &mut acc_seen] {
            assert_eq!(next_seen(seen).await, Seen::Stopped(None));
            assert!(seen.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_out_of_range_heartbeat_interval_keeps_configured() {
        let config = session_config(Role::Acceptor);
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), true);
        let handle = session.handle();
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        peer.send(MsgType::Logon, logon(u64::MAX)).await;
        let reply = peer.expect(MsgType::Logon).await;
        assert_eq!(
            reply.view().unwrap().get_field_str(tags::HEART_BT_INT),
            Some("30")
        );
        let reject = peer.expect(MsgType::Reject).await;
        let view = reject.view().unwrap();
        assert_eq!(view.get_field_str(tags::SESSION_REJECT_REASON), Some("5"));
        assert_eq!(view.get_field_str(tags::REF_TAG_ID), Some("108"));
        assert_eq!(next_seen(&mut seen).await, Seen::Logon(None));
        assert_eq!(next_seen(&mut seen).await, Seen::Ready);

        handle.stop().unwrap();
        let (session, result) = running.await.unwrap();
        assert_eq!(result.unwrap(), 1);
        assert_eq!(
            session.session_state().heart_beat_interval(),
            Duration::from_secs(30)
        );
        assert_eq!(next_seen(&mut seen).await, Seen::Stopped(None));
    }

    #[tokio::test]
    async fn test_long_scheduled_delay_is_dropped() {
        let config = session_config(Role::Acceptor);
        let (running, handle, mut peer, mut seen) = active_acceptor(config).await;

        let too_long = SessionCommand::Schedule {
            delay: Duration::from_secs(5 * 365 * 86_400),
            command: Box::new(SessionCommand::Done),
        };
        handle
            .schedule(Duration::from_millis(10), too_long)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        peer.send(
            MsgType::TestRequest,
            FieldMap::new().with(tags::TEST_REQ_ID, "still-there"),
        )
        .await;
        peer.expect(MsgType::Heartbeat).await;

        handle.stop().unwrap();
        let (_, result) = running.await.unwrap();
        assert_eq!(result.unwrap(), 1);
        assert_eq!(next_seen(&mut seen).await, Seen::Stopped(None));
    }

    #[tokio::test]
    async fn test_reset_logon_clears_store() {
        let config = session_config(Role::Acceptor)
            .with_store_failure_policy(StoreFailurePolicy::Terminate);
        let (running, _handle, mut peer, mut seen) = active_acceptor(config.clone()).await;
        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "OLD"))
            .await;
        assert_eq!(
            next_seen(&mut seen).await,
            Seen::App(MsgType::NewOrderSingle)
        );
        drop(peer);
        let (mut session, result) = running.await.unwrap();
        assert!(result.is_err());
        assert!(matches!(next_seen(&mut seen).await, Seen::Stopped(Some(_))));
        let store = session.store();
        let old = store.get(2).await.unwrap();
        assert_eq!(old.message.get_field_str(11), Some("OLD"));

        let (ours, theirs) = duplex(64 * 1024);
        let transport = MsgTransport::new(3, &transport_config(&config), ours).unwrap();
        let mut peer = Peer::new(&config, theirs);
        let handle = session.handle();
        let running = tokio::spawn(async move {
            let result = session.run(transport).await;
            (session, result)
        });

        peer.send(
            MsgType::Logon,
            logon(30).with(tags::RESET_SEQ_NUM_FLAG, true),
        )
        .await;
        let reply = peer.expect(MsgType::Logon).await;
        assert_eq!(reply.view().unwrap().seq_num(), Some(SeqNum::new(1)));
        assert_eq!(next_seen(&mut seen).await, Seen::Logon(None));
        assert_eq!(next_seen(&mut seen).await, Seen::Ready);

        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "NEW"))
            .await;
        assert_eq!(
            next_seen(&mut seen).await,
            Seen::App(MsgType::NewOrderSingle)
        );
        assert_eq!(store.size().await, 1);
        let new = store.get(2).await.unwrap();
        assert_eq!(new.message.get_field_str(11), Some("NEW"));

        handle.stop().unwrap();
        let (_, result) = running.await.unwrap();
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reset_flag_clears_store_on_run() {
        let config = session_config(Role::Acceptor).with_reset_seq_num_flag(true);
        let (running, _handle, mut peer, mut seen) = active_acceptor(config.clone()).await;
        peer.send(MsgType::NewOrderSingle, FieldMap::new().with(11, "ORD-1"))
            .await;
        assert_eq!(
            next_seen(&mut seen).await,
            Seen::App(MsgType::NewOrderSingle)
        );
        drop(peer);
        let (mut session, _) = running.await.unwrap();
        let store = session.store();
        assert_eq!(store.size().await, 1);

        let (ours, _theirs) = duplex(64 * 1024);
        let transport = MsgTransport::new(3, &transport_config(&config), ours).unwrap();
        let handle = session.handle();
        let _running = tokio::spawn(async move {
            let result = session.run(transport).await;
            (session, result)
        });
        handle
            .wait_for_state(SessionState::WaitingForALogon)
            .await
            .unwrap();
        assert_eq!(store.size().await, 0);
    }

    #[tokio::test]
    async fn test_rejected_reset_logon_keeps_sequences() {
        let config = session_config(Role::Acceptor).with_last_received_seq_num(10);
        let Harness {
            session,
            mut seen,
            transport,
            peer_stream,
        } = harness(config.clone(), false);
        let mut peer = Peer::new(&config, peer_stream);
        let running = spawn(session, transport);

        peer.send(
            MsgType::Logon,
            logon(30).with(tags::RESET_SEQ_NUM_FLAG, true),
        )
        .await;
        peer.expect(MsgType::Logout).await;

        let (session, result) = running.await.unwrap();
        assert!(matches!(
            result,
            Err(FixError::Session(SessionError::LogonRejected { .. }))
        ));
        assert_eq!(
            session.session_state().last_peer_msg_seq_num(),
            SeqNum::new(10)
        );
        assert_eq!(next_seen(&mut seen).await, Seen::Logon(None));
        assert!(matches!(next_seen(&mut seen).await, Seen::Stopped(Some(_))));
    }
}
