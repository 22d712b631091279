//! Real-time message relay.
//!
//! A connection joins the channel named after its user, then sends messages
//! and typing indicators addressed to other users' channels. Messages are
//! translated into the receiver's language and stored before either side sees
//! them.

mod events;
mod msg;
mod session;
mod ws;

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};

use crate::{
    messages::MessageStore,
    presence::{Outbox, PresenceRegistry},
    translate::Translator,
    users::UserDirectory,
    AppState, RelayError,
};

pub use events::{ClientEvent, ServerEvent};
pub use session::Session;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::relay_ws))
}

#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Upper bound on one translation call before the fallback text is used.
    pub translate_timeout: Duration,
    /// Attempts at storing a message before giving up.
    pub store_attempts: u32,
    /// Wait between store attempts, multiplied by the attempt number.
    pub store_backoff: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            translate_timeout: Duration::from_secs(3),
            store_attempts: 3,
            store_backoff: Duration::from_millis(50),
        }
    }
}

#[derive(Clone)]
pub struct Relay {
    users: Arc<dyn UserDirectory>,
    messages: Arc<dyn MessageStore>,
    translator: Arc<dyn Translator>,
    registry: PresenceRegistry,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        messages: Arc<dyn MessageStore>,
        translator: Arc<dyn Translator>,
        registry: PresenceRegistry,
        settings: RelaySettings,
    ) -> Self {
        Self { users, messages, translator, registry, settings }
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    /// Registers a new connection and acknowledges it with `connected`. The
    /// registry takes the outbox: once it drops the connection the receiving
    /// side sees the channel close.
    pub fn connect(&self, outbox: Outbox) -> Result<Session, RelayError> {
        // acknowledge before any broadcast can reach the outbox
        let _ = outbox.try_send(ServerEvent::Connected { data: "Connected to SoulTalk".to_owned() });
        let conn = self.registry.connect(outbox)?;
        Ok(Session::new(self.clone(), conn))
    }
}
