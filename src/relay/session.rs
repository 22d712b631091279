use tracing::{debug, warn};

use crate::{presence::ConnId, RelayError};

use super::{msg, ClientEvent, Relay, ServerEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnState {
    Connected,
    Joined(String),
}

/// One live connection: `Connected -> Joined -> Connected -> ...`, ended by
/// [`Session::disconnect`].
pub struct Session {
    relay: Relay,
    conn: ConnId,
    state: ConnState,
}

impl Session {
    pub(super) fn new(relay: Relay, conn: ConnId) -> Self {
        Self { relay, conn, state: ConnState::Connected }
    }

    pub fn id(&self) -> ConnId {
        self.conn
    }

    /// The username this connection is joined under, if any.
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            ConnState::Joined(username) => Some(username),
            ConnState::Connected => None,
        }
    }

    /// Decodes and handles one raw frame.
    pub async fn handle_frame(&mut self, frame: &[u8]) {
        match ClientEvent::decode(frame) {
            Ok(event) => self.handle(event).await,
            Err(err) => self.report(err).await,
        }
    }

    /// Handles one event. Failures go back to this connection only.
    /// Usernames are compared with surrounding whitespace removed.
    pub async fn handle(&mut self, event: ClientEvent) {
        let result = match event {
            ClientEvent::Join { username } => self.join(username.trim()).await,
            ClientEvent::Leave { username } => self.leave(username.trim()).await,
            ClientEvent::SendMessage { from, to, message } => {
                self.send_message(from.trim(), to.trim(), &message).await
            }
            ClientEvent::Typing { from, to, is_typing } => self.typing(from.trim(), to.trim(), is_typing),
            ClientEvent::RequestMessageHistory { user1, user2 } => self.history(user1.trim(), user2.trim()).await,
        };

        if let Err(err) = result {
            self.report(err).await;
        }
    }

    async fn join(&mut self, username: &str) -> Result<(), RelayError> {
        if username.is_empty() {
            return Err(RelayError::validation("username is required"));
        }
        if self.relay.users.lookup(username).await?.is_none() {
            return Err(RelayError::UserNotFound(username.to_owned()));
        }

        if let ConnState::Joined(current) = &self.state {
            if current != username {
                let current = current.clone();
                self.relay.registry.leave(&current, self.conn).await?;
            }
        }

        self.relay.registry.join(username, self.conn).await?;
        debug!(conn = %self.conn, username, "session joined");
        self.state = ConnState::Joined(username.to_owned());
        Ok(())
    }

    async fn leave(&mut self, username: &str) -> Result<(), RelayError> {
        if username.is_empty() {
            return Err(RelayError::validation("username is required"));
        }
        match self.username() {
            Some(current) if current == username => {}
            Some(_) => return Err(RelayError::validation(format!("not joined as {username}"))),
            None => return Err(RelayError::validation("not joined")),
        }

        self.relay.registry.leave(username, self.conn).await?;
        debug!(conn = %self.conn, username, "session left");
        self.state = ConnState::Connected;
        Ok(())
    }

    async fn send_message(&self, from: &str, to: &str, text: &str) -> Result<(), RelayError> {
        self.ensure_joined_as(from)?;
        msg::send_msg(&self.relay, from, to, text).await?;
        Ok(())
    }

    fn typing(&self, from: &str, to: &str, is_typing: bool) -> Result<(), RelayError> {
        self.ensure_joined_as(from)?;
        if to.is_empty() {
            return Err(RelayError::validation("receiver is required"));
        }
        self.relay.registry.deliver(to, ServerEvent::UserTyping { from: from.to_owned(), is_typing });
        Ok(())
    }

    async fn history(&self, user1: &str, user2: &str) -> Result<(), RelayError> {
        if user1.is_empty() || user2.is_empty() {
            return Err(RelayError::validation("both users are required"));
        }
        let messages = self.relay.messages.query_between(user1, user2).await?;
        self.relay.registry.send_to(self.conn, ServerEvent::MessageHistory { messages }).await;
        Ok(())
    }

    fn ensure_joined_as(&self, from: &str) -> Result<(), RelayError> {
        match self.username() {
            Some(current) if current == from => Ok(()),
            Some(current) => Err(RelayError::validation(format!("joined as {current}, cannot act as {from}"))),
            None => Err(RelayError::validation("join before sending")),
        }
    }

    async fn report(&self, err: RelayError) {
        match &err {
            RelayError::Persistence(_) | RelayError::RegistryClosed => {
                warn!(conn = %self.conn, error = %err, "event failed")
            }
            _ => debug!(conn = %self.conn, error = %err, "event rejected"),
        }
        self.relay.registry.send_to(self.conn, ServerEvent::error(&err)).await;
    }

    /// Leaves the joined channel, if any, and forgets the connection.
    pub async fn disconnect(self) {
        if let ConnState::Joined(username) = &self.state {
            if let Err(err) = self.relay.registry.leave(username, self.conn).await {
                warn!(conn = %self.conn, %username, error = %err, "cleanup leave failed");
            }
        }
        self.relay.registry.disconnect(self.conn);
        debug!(conn = %self.conn, "session closed");
    }
}
