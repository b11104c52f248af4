/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session builder for fluent configuration.
//!
//! Everything a session needs is handed over explicitly: configuration,
//! message store and application.

use crate::application::{Application, NoOpApplication};
use crate::session::FixSession;
use fixline_core::error::SessionError;
use fixline_session::config::SessionConfig;
use fixline_store::{MemoryStore, MessageStore};
use std::fmt;
use std::sync::Arc;

/// Builder for a [`FixSession`].
pub struct SessionBuilder<A: Application = NoOpApplication> {
    config: SessionConfig,
    store: Option<Arc<dyn MessageStore>>,
    application: A,
}

impl<A: Application> fmt::Debug for SessionBuilder<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("config", &self.config)
            .field("custom_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionBuilder<NoOpApplication> {
    /// Creates a builder with an in-memory store and no-op application.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            store: None,
            application: NoOpApplication,
        }
    }
}

impl<A: Application> SessionBuilder<A> {
    /// Sets the application callback handler.
    #[must_use]
    pub fn with_application<B: Application>(self, application: B) -> SessionBuilder<B> {
        SessionBuilder {
            config: self.config,
            store: self.store,
            application,
        }
    }

    /// Sets the message store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Validates the configuration and builds the session.
    ///
    /// # Errors
    /// Returns `SessionError::Configuration` if the configuration is invalid.
    pub fn build(self) -> Result<FixSession<A>, SessionError> {
        self.config.validate()?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn MessageStore>);
        Ok(FixSession::new(self.config, store, self.application))
    }
}
