/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Command handle for a running session.

use fixline_core::error::SessionError;
use fixline_core::field::FieldMap;
use fixline_core::message::MsgType;
use fixline_session::state::SessionState;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Longest delay accepted for a scheduled command.
pub const MAX_SCHEDULE_DELAY: Duration = Duration::from_secs(365 * 86_400);

/// Command processed by the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Send a message; header fields are stamped by the session.
    Send {
        /// The message type.
        msg_type: MsgType,
        /// Body fields.
        body: FieldMap,
    },
    /// Log out gracefully, or stop if no logon completed.
    Done,
    /// Stop at once without a logout exchange.
    Stop,
    /// Stop at once and end the run with an error.
    Terminate(String),
    /// Run `command` after `delay`.
    Schedule {
        /// How long to wait.
        delay: Duration,
        /// The command to run.
        command: Box<SessionCommand>,
    },
}

/// Cloneable handle for issuing commands to a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub(crate) fn channel() -> (
        Self,
        mpsc::UnboundedReceiver<SessionCommand>,
        watch::Sender<SessionState>,
    ) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::Idle);
        (Self { commands, state }, rx, state_tx)
    }

    /// Returns the session's current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the session reaches `state`.
    ///
    /// # Errors
    /// Returns `SessionError::Terminated` if the session was dropped first.
    pub async fn wait_for_state(&self, state: SessionState) -> Result<(), SessionError> {
        let mut rx = self.state.clone();
        rx.wait_for(|current| *current == state)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::Terminated("session dropped".to_string()))
    }

    /// Queues a message for sending.
    ///
    /// A stopped session drops the message with a warning.
    ///
    /// # Errors
    /// Returns `SessionError::Terminated` if the session was dropped.
    pub fn send(&self, msg_type: MsgType, body: FieldMap) -> Result<(), SessionError> {
        self.command(SessionCommand::Send { msg_type, body })
    }

    /// Requests a graceful logout.
    ///
    /// # Errors
    /// Returns `SessionError::Terminated` if the session was dropped.
    pub fn done(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Done)
    }

    /// Requests an immediate stop.
    ///
    /// # Errors
    /// Returns `SessionError::Terminated` if the session was dropped.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Stop)
    }

    /// Schedules `command` to run after `delay`.
    ///
    /// Pending commands are discarded when the session stops or resets.
    ///
    /// # Errors
    /// Returns `SessionError::Configuration` if `delay` exceeds
    /// [`MAX_SCHEDULE_DELAY`], or `SessionError::Terminated` if the session
    /// was dropped.
    pub fn schedule(&self, delay: Duration, command: SessionCommand) -> Result<(), SessionError> {
        if delay > MAX_SCHEDULE_DELAY {
            return Err(SessionError::Configuration(format!(
                "schedule delay {delay:?} above {MAX_SCHEDULE_DELAY:?}"
            )));
        }
        self.command(SessionCommand::Schedule {
            delay,
            command: Box::new(command),
        })
    }

    fn command(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Terminated("session dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_queued_in_order() {
        let (handle, mut rx, _state) = SessionHandle::channel();
        handle.send(MsgType::Heartbeat, FieldMap::new()).unwrap();
        handle.done().unwrap();
        handle
            .schedule(Duration::from_secs(5), SessionCommand::Stop)
            .unwrap();

        assert!(matches!(rx.try_recv(), Ok(SessionCommand::Send { .. })));
        assert_eq!(rx.try_recv(), Ok(SessionCommand::Done));
        assert_eq!(
            rx.try_recv(),
            Ok(SessionCommand::Schedule {
                delay: Duration::from_secs(5),
                command: Box::new(SessionCommand::Stop),
            })
        );
    }

    #[test]
    fn test_schedule_rejects_long_delay() {
        let (handle, mut rx, _state) = SessionHandle::channel();
        let result = handle.schedule(Duration::from_secs(5 * 365 * 86_400), SessionCommand::Done);
        assert!(matches!(result, Err(SessionError::Configuration(_))));
        assert!(rx.try_recv().is_err());

        handle.schedule(MAX_SCHEDULE_DELAY, SessionCommand::Done).unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_session_is_error() {
        let (handle, rx, _state) = SessionHandle::channel();
        drop(rx);
        assert!(matches!(handle.stop(), Err(SessionError::Terminated(_))));
    }

    #[tokio::test]
    async fn test_state_follows_session() {
        let (handle, _rx, state) = SessionHandle::channel();
        assert_eq!(handle.state(), SessionState::Idle);

        state.send_replace(SessionState::ActiveNormalSession);
        handle
            .wait_for_state(SessionState::ActiveNormalSession)
            .await
            .unwrap();
        assert_eq!(handle.state(), SessionState::ActiveNormalSession);
    }
}
