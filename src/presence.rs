//! Presence and channel membership.
//!
//! All state lives in one task that applies [`Command`]s in arrival order, so
//! membership changes and deliveries never race each other. Handles talk to it
//! through a queue and never hold a lock. The task never waits on a client:
//! outboxes are bounded and a connection whose outbox is full is dropped.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use time::OffsetDateTime;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{relay::ServerEvent, users::UserDirectory, RelayError};

pub type ConnId = Uuid;

/// Events a connection may have queued before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 256;

/// Where a connection's outgoing events are queued. The registry owns the
/// sending side once connected; dropping the connection closes it.
pub type Outbox = mpsc::Sender<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEntry {
    pub online: bool,
    pub joined_at: OffsetDateTime,
}

enum Command {
    Connect { conn: ConnId, outbox: Outbox },
    Disconnect { conn: ConnId },
    Join { username: String, conn: ConnId, done: oneshot::Sender<()> },
    Leave { username: String, conn: ConnId, done: oneshot::Sender<()> },
    Deliver { channel: String, event: ServerEvent },
    Direct { conn: ConnId, event: ServerEvent, done: oneshot::Sender<()> },
    Presence { username: String, reply: oneshot::Sender<Option<PresenceEntry>> },
    Members { channel: String, reply: oneshot::Sender<usize> },
}

/// A directory write, applied in the order the registry produced it.
struct MirrorJob {
    username: String,
    online: bool,
    done: oneshot::Sender<()>,
}

#[derive(Clone)]
pub struct PresenceRegistry {
    commands: mpsc::UnboundedSender<Command>,
}

impl PresenceRegistry {
    /// Starts the registry task. It stops once every handle is dropped.
    pub fn spawn() -> Self {
        Self::start(None)
    }

    /// Like [`spawn`](Self::spawn), and mirrors every presence change into
    /// the directory's `online` flag.
    pub fn with_directory(directory: Arc<dyn UserDirectory>) -> Self {
        Self::start(Some(directory))
    }

    fn start(directory: Option<Arc<dyn UserDirectory>>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, directory));
        Self { commands }
    }

    fn send(&self, command: Command) -> Result<(), RelayError> {
        self.commands.send(command).map_err(|_| RelayError::RegistryClosed)
    }

    pub fn connect(&self, outbox: Outbox) -> Result<ConnId, RelayError> {
        let conn = Uuid::now_v7();
        self.send(Command::Connect { conn, outbox })?;
        Ok(conn)
    }

    pub fn disconnect(&self, conn: ConnId) {
        let _ = self.send(Command::Disconnect { conn });
    }

    /// Binds `conn` to the channel named `username`, marks the user online and
    /// broadcasts `user_status` to every connection. Returns once the
    /// directory agrees.
    pub async fn join(&self, username: &str, conn: ConnId) -> Result<(), RelayError> {
        let username = validate(username)?.to_owned();
        let (done, ack) = oneshot::channel();
        self.send(Command::Join { username, conn, done })?;
        ack.await.map_err(|_| RelayError::RegistryClosed)
    }

    /// Unbinds `conn` and marks the user offline, even if other connections
    /// are still joined under the same name.
    pub async fn leave(&self, username: &str, conn: ConnId) -> Result<(), RelayError> {
        let username = validate(username)?.to_owned();
        let (done, ack) = oneshot::channel();
        self.send(Command::Leave { username, conn, done })?;
        ack.await.map_err(|_| RelayError::RegistryClosed)
    }

    /// Queues `event` for every connection joined to `channel`. Dropped when
    /// nobody is joined.
    pub fn deliver(&self, channel: &str, event: ServerEvent) {
        let _ = self.send(Command::Deliver { channel: channel.to_owned(), event });
    }

    /// Queues `event` for `conn` alone, behind everything already queued.
    pub async fn send_to(&self, conn: ConnId, event: ServerEvent) {
        let (done, ack) = oneshot::channel();
        if self.send(Command::Direct { conn, event, done }).is_ok() {
            let _ = ack.await;
        }
    }

    pub async fn presence(&self, username: &str) -> Option<PresenceEntry> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Presence { username: username.to_owned(), reply }).ok()?;
        rx.await.ok().flatten()
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.presence(username).await.is_some_and(|entry| entry.online)
    }

    /// Number of live connections joined to `channel`.
    pub async fn members(&self, channel: &str) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Members { channel: channel.to_owned(), reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn validate(username: &str) -> Result<&str, RelayError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(RelayError::validation("username is required"));
    }
    Ok(username)
}

async fn run(mut commands: mpsc::UnboundedReceiver<Command>, directory: Option<Arc<dyn UserDirectory>>) {
    let mirror = directory.map(|directory| {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(mirror_presence(directory, rx));
        jobs
    });

    let mut state = RegistryState { mirror, ..RegistryState::default() };
    while let Some(command) = commands.recv().await {
        state.apply(command);
    }
    debug!("presence registry stopped");
}

/// Writes presence changes one at a time, so the directory ends up in the
/// same state as the registry.
async fn mirror_presence(directory: Arc<dyn UserDirectory>, mut jobs: mpsc::UnboundedReceiver<MirrorJob>) {
    while let Some(job) = jobs.recv().await {
        if let Err(e) = directory.set_online(&job.username, job.online).await {
            warn!(username = %job.username, online = job.online, error = %e, "failed to record presence in user directory");
        }
        let _ = job.done.send(());
    }
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnId, Outbox>,
    channels: HashMap<String, HashSet<ConnId>>,
    presence: HashMap<String, PresenceEntry>,
    mirror: Option<mpsc::UnboundedSender<MirrorJob>>,
}

impl RegistryState {
    fn apply(&mut self, command: Command) {
        match command {
            Command::Connect { conn, outbox } => {
                self.connections.insert(conn, outbox);
            }
            Command::Disconnect { conn } => self.drop_connection(conn),
            Command::Join { username, conn, done } => {
                self.channels.entry(username.clone()).or_default().insert(conn);
                self.presence.insert(username.clone(), PresenceEntry {
                    online: true,
                    joined_at: OffsetDateTime::now_utc(),
                });
                debug!(%username, %conn, "joined");
                self.broadcast(ServerEvent::UserStatus { username: username.clone(), online: true });
                self.record(username, true, done);
            }
            Command::Leave { username, conn, done } => {
                if let Some(members) = self.channels.get_mut(&username) {
                    members.remove(&conn);
                    if members.is_empty() {
                        self.channels.remove(&username);
                    }
                }
                if let Some(entry) = self.presence.get_mut(&username) {
                    entry.online = false;
                }
                debug!(%username, %conn, "left");
                self.broadcast(ServerEvent::UserStatus { username: username.clone(), online: false });
                self.record(username, false, done);
            }
            Command::Deliver { channel, event } => self.deliver(&channel, event),
            Command::Direct { conn, event, done } => {
                self.direct(conn, event);
                let _ = done.send(());
            }
            Command::Presence { username, reply } => {
                let _ = reply.send(self.presence.get(&username).copied());
            }
            Command::Members { channel, reply } => {
                let _ = reply.send(self.channels.get(&channel).map_or(0, HashSet::len));
            }
        }
    }

    /// Hands the change to the directory writer; `done` fires once written.
    fn record(&self, username: String, online: bool, done: oneshot::Sender<()>) {
        let Some(mirror) = &self.mirror else {
            let _ = done.send(());
            return;
        };
        if let Err(mpsc::error::SendError(job)) = mirror.send(MirrorJob { username, online, done }) {
            let _ = job.done.send(());
        }
    }

    fn deliver(&mut self, channel: &str, event: ServerEvent) {
        let Some(members) = self.channels.get(channel) else {
            debug!(channel, "no connection joined, event dropped");
            return;
        };

        let gone: Vec<ConnId> = members
            .iter()
            .filter(|conn| match self.connections.get(*conn) {
                Some(outbox) => !offer(**conn, outbox, event.clone()),
                None => true,
            })
            .copied()
            .collect();

        for conn in gone {
            self.drop_connection(conn);
        }
    }

    fn direct(&mut self, conn: ConnId, event: ServerEvent) {
        let Some(outbox) = self.connections.get(&conn) else {
            return;
        };
        if !offer(conn, outbox, event) {
            self.drop_connection(conn);
        }
    }

    fn broadcast(&mut self, event: ServerEvent) {
        let gone: Vec<ConnId> = self
            .connections
            .iter()
            .filter(|(conn, outbox)| !offer(**conn, outbox, event.clone()))
            .map(|(conn, _)| *conn)
            .collect();

        for conn in gone {
            self.drop_connection(conn);
        }
    }

    fn drop_connection(&mut self, conn: ConnId) {
        self.connections.remove(&conn);
        self.channels.retain(|_, members| {
            members.remove(&conn);
            !members.is_empty()
        });
    }
}

/// False when the connection should be dropped.
fn offer(conn: ConnId, outbox: &Outbox, event: ServerEvent) -> bool {
    match outbox.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(%conn, capacity = OUTBOX_CAPACITY, "outbox full, dropping slow connection");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}
