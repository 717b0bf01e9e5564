//! Boundary to the messaging-protocol session
//!
//! The bridge never speaks the messaging wire protocol itself. Everything it
//! needs from a paired session is captured by [`MessagingSession`]; pairing
//! progress arrives as [`ConnectionUpdate`]s on a broadcast channel.

use crate::types::GroupSetting;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::warn;

/// Connection lifecycle events emitted by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    /// A fresh pairing code to show to the user (data URL of a QR image)
    Qr(String),
    Open,
    /// `logged_out` is set when the remote side revoked the pairing; any
    /// other close is transient and worth reconnecting
    Closed { logged_out: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub is_admin: bool,
}

/// Group metadata as the session reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMetadata {
    pub id: String,
    pub subject: String,
    pub description: Option<String>,
    pub participants: Vec<Participant>,
}

impl GroupMetadata {
    /// Whether `own_id` holds an admin role in this group
    pub fn is_admin(&self, own_id: Option<&str>) -> bool {
        own_id.is_some_and(|own| {
            self.participants
                .iter()
                .any(|p| p.id == own && p.is_admin)
        })
    }

    pub fn pending(&self) -> usize {
        self.participants.iter().filter(|p| !p.is_admin).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NotConnected,
    /// No usable session transport
    Unavailable(String),
    /// The remote side refused the operation
    Rejected(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "WhatsApp not connected"),
            Self::Unavailable(msg) => write!(f, "Session unavailable: {}", msg),
            Self::Rejected(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Operations the bridge needs from a messaging session
#[async_trait]
pub trait MessagingSession: Send + Sync {
    /// Start (or restart) the connection. Completion is reported through
    /// [`MessagingSession::subscribe`], not by this call returning.
    async fn connect(&self) -> SessionResult<()>;

    /// Log out and drop the pairing
    async fn logout(&self) -> SessionResult<()>;

    /// Our own user id once paired
    fn own_id(&self) -> Option<String>;

    async fn participating_groups(&self) -> SessionResult<Vec<GroupMetadata>>;

    async fn group_metadata(&self, group_id: &str) -> SessionResult<GroupMetadata>;

    /// Invite code (not the full link) for a group we administer
    async fn invite_code(&self, group_id: &str) -> SessionResult<String>;

    async fn update_setting(
        &self,
        group_id: &str,
        setting: GroupSetting,
        enabled: bool,
    ) -> SessionResult<()>;

    async fn update_subject(&self, group_id: &str, subject: &str) -> SessionResult<()>;

    async fn update_description(&self, group_id: &str, description: &str) -> SessionResult<()>;

    async fn update_picture(&self, group_id: &str, image: Vec<u8>) -> SessionResult<()>;

    async fn remove_picture(&self, group_id: &str) -> SessionResult<()>;

    async fn add_participant(&self, group_id: &str, jid: &str) -> SessionResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<ConnectionUpdate>;
}

/// Session used when no protocol transport is linked into the binary.
///
/// It never pairs: `connect` fails with [`SessionError::Unavailable`] and every
/// group operation reports [`SessionError::NotConnected`].
pub struct UnpairedSession {
    auth_dir: PathBuf,
    updates: broadcast::Sender<ConnectionUpdate>,
}

impl UnpairedSession {
    pub fn new(auth_dir: PathBuf) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self { auth_dir, updates }
    }
}

#[async_trait]
impl MessagingSession for UnpairedSession {
    async fn connect(&self) -> SessionResult<()> {
        warn!(auth_dir = ?self.auth_dir, "No messaging transport configured, cannot pair");
        Err(SessionError::Unavailable(
            "no messaging transport configured".to_string(),
        ))
    }

    async fn logout(&self) -> SessionResult<()> {
        Ok(())
    }

    fn own_id(&self) -> Option<String> {
        None
    }

    async fn participating_groups(&self) -> SessionResult<Vec<GroupMetadata>> {
        Err(SessionError::NotConnected)
    }

    async fn group_metadata(&self, _group_id: &str) -> SessionResult<GroupMetadata> {
        Err(SessionError::NotConnected)
    }

    async fn invite_code(&self, _group_id: &str) -> SessionResult<String> {
        Err(SessionError::NotConnected)
    }

    async fn update_setting(
        &self,
        _group_id: &str,
        _setting: GroupSetting,
        _enabled: bool,
    ) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn update_subject(&self, _group_id: &str, _subject: &str) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn update_description(&self, _group_id: &str, _description: &str) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn update_picture(&self, _group_id: &str, _image: Vec<u8>) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn remove_picture(&self, _group_id: &str) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn add_participant(&self, _group_id: &str, _jid: &str) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionUpdate> {
        self.updates.subscribe()
    }
}
