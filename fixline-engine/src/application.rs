/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Application callback interface.
//!
//! A [`FixSession`](crate::session::FixSession) owns one `Application` and
//! calls it from the session task, one event at a time. Views passed to the
//! callbacks borrow the received buffer and cannot be kept past the call;
//! use [`MsgView::to_owned`] to retain a message.

use crate::handle::SessionHandle;
use async_trait::async_trait;
use fixline_core::error::FixError;
use fixline_core::message::{MsgType, MsgView};

/// Callbacks a session makes into the application.
#[async_trait]
pub trait Application: Send {
    /// Called for every application message received in an established state.
    ///
    /// # Arguments
    /// * `session` - Handle for sending replies or issuing commands
    /// * `msg_type` - The message type
    /// * `view` - The decoded message
    async fn on_application_msg(
        &mut self,
        session: &SessionHandle,
        msg_type: &MsgType,
        view: &MsgView<'_>,
    );

    /// Called with the log form of every message framed off the wire.
    fn on_decoded(&mut self, _msg_type: &MsgType, _text: &str) {}

    /// Called with the log form of every message sent.
    fn on_encoded(&mut self, _msg_type: &MsgType, _text: &str) {}

    /// Decides whether a peer's Logon is accepted.
    ///
    /// # Arguments
    /// * `view` - The Logon message
    /// * `user` - Username(553), if present
    /// * `password` - Password(554), if present
    async fn on_logon(
        &mut self,
        view: &MsgView<'_>,
        user: Option<&str>,
        password: Option<&str>,
    ) -> bool;

    /// Called once per completed logon handshake.
    fn on_ready(&mut self, session: &SessionHandle, view: &MsgView<'_>);

    /// Called exactly once when a run ends.
    ///
    /// `error` is `None` after a clean stop.
    fn on_stopped(&mut self, error: Option<&FixError>);
}

/// Application that accepts every logon and ignores everything else.
#[derive(Debug, Default)]
pub struct NoOpApplication;

#[async_trait]
impl Application for NoOpApplication {
    async fn on_application_msg(
        &mut self,
        _session: &SessionHandle,
        _msg_type: &MsgType,
        _view: &MsgView<'_>,
    ) {
    }

    async fn on_logon(
        &mut self,
        _view: &MsgView<'_>,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> bool {
        true
    }

    fn on_ready(&mut self, _session: &SessionHandle, _view: &MsgView<'_>) {}

    fn on_stopped(&mut self, _error: Option<&FixError>) {}
}
