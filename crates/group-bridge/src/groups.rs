//! Group directory: connection state, cached group listing and admin-gated
//! group operations on top of a [`MessagingSession`]

use crate::error::{BridgeError, Result};
use crate::pacing::Pacing;
use crate::picture::PictureFetcher;
use crate::session::{ConnectionUpdate, MessagingSession, SessionError};
use crate::types::{
    ConnectionStatus, Group, GroupInfo, GroupSetting, SessionMarker, SettingResult,
    SettingTarget, GROUPS_CACHE_KEY, GROUPS_TTL_SECS, SESSION_CACHE_KEY, SESSION_TTL_SECS,
};
use chrono::Utc;
use session_cache::CacheManager;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

const INVITE_LINK_PREFIX: &str = "https://chat.whatsapp.com/";
const USER_JID_SUFFIX: &str = "@s.whatsapp.net";

/// Where a new group picture comes from
#[derive(Debug, Clone)]
pub enum PictureSource {
    Url(String),
    Bytes(Vec<u8>),
}

/// Result of a login request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    AlreadyConnected,
    /// Scan this QR code to finish pairing
    Qr(String),
    Connecting,
}

#[derive(Debug, Default)]
struct ConnectionState {
    connected: bool,
    qr_code: Option<String>,
}

pub struct GroupDirectory {
    session: Arc<dyn MessagingSession>,
    cache: Arc<CacheManager>,
    fetcher: PictureFetcher,
    pacing: Pacing,
    state: RwLock<ConnectionState>,
}

impl GroupDirectory {
    pub fn new(session: Arc<dyn MessagingSession>, cache: Arc<CacheManager>, pacing: Pacing) -> Self {
        Self {
            session,
            cache,
            fetcher: PictureFetcher::new(),
            pacing,
            state: RwLock::new(ConnectionState::default()),
        }
    }

    /// Use `fetcher` for pictures given by URL
    pub fn with_fetcher(mut self, fetcher: PictureFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Reconnect at startup if a previous run left a session marker behind
    pub async fn init(&self) -> Result<()> {
        if self.cache.has(SESSION_CACHE_KEY).await {
            info!("Cached session found, reconnecting");
            self.session.connect().await?;
        }
        info!("Group directory initialized");
        Ok(())
    }

    /// Apply connection updates until the session's channel closes
    pub async fn run_updates(self: Arc<Self>, mut updates: broadcast::Receiver<ConnectionUpdate>) {
        loop {
            match updates.recv().await {
                Ok(update) => self.handle_update(update).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Connection updates lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Connection update stream closed");
    }

    pub async fn handle_update(&self, update: ConnectionUpdate) {
        match update {
            ConnectionUpdate::Qr(code) => {
                self.state.write().await.qr_code = Some(code);
                info!("QR code generated");
            }
            ConnectionUpdate::Open => {
                {
                    let mut state = self.state.write().await;
                    state.connected = true;
                    state.qr_code = None;
                }
                let marker = SessionMarker {
                    connected: true,
                    timestamp: Utc::now().timestamp_millis(),
                };
                self.cache
                    .set_with_ttl(SESSION_CACHE_KEY, &marker, SESSION_TTL_SECS)
                    .await;
                if let Err(e) = self.load_groups().await {
                    error!(error = %e, "Failed to load groups");
                }
                info!("WhatsApp connected successfully");
            }
            ConnectionUpdate::Closed { logged_out: false } => {
                info!("Connection closed, reconnecting");
                if let Err(e) = self.session.connect().await {
                    error!(error = %e, "Reconnect failed");
                }
            }
            ConnectionUpdate::Closed { logged_out: true } => {
                info!("Session logged out");
                self.state.write().await.connected = false;
                self.cache.delete(SESSION_CACHE_KEY).await;
                self.cache.delete(GROUPS_CACHE_KEY).await;
            }
        }
    }

    /// Start pairing unless already connected
    pub async fn login(&self) -> Result<LoginOutcome> {
        if self.is_connected().await {
            return Ok(LoginOutcome::AlreadyConnected);
        }

        self.session.connect().await?;

        let state = self.state.read().await;
        Ok(if state.connected {
            LoginOutcome::AlreadyConnected
        } else if let Some(qr) = &state.qr_code {
            LoginOutcome::Qr(qr.clone())
        } else {
            LoginOutcome::Connecting
        })
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await?;
        {
            let mut state = self.state.write().await;
            state.connected = false;
            state.qr_code = None;
        }
        self.cache.delete(SESSION_CACHE_KEY).await;
        self.cache.delete(GROUPS_CACHE_KEY).await;
        info!("Logged out");
        Ok(())
    }

    pub async fn status(&self) -> ConnectionStatus {
        let state = self.state.read().await;
        ConnectionStatus {
            connected: state.connected,
            has_qr: state.qr_code.is_some(),
        }
    }

    pub async fn qr_code(&self) -> Option<String> {
        self.state.read().await.qr_code.clone()
    }

    async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    async fn require_connected(&self) -> Result<()> {
        if self.is_connected().await {
            Ok(())
        } else {
            Err(SessionError::NotConnected.into())
        }
    }

    /// Fetch all groups from the session, number them and cache the listing
    pub async fn load_groups(&self) -> Result<Vec<Group>> {
        let own_id = self.session.own_id();
        let metadata = self.session.participating_groups().await?;

        let mut groups = Vec::with_capacity(metadata.len());
        for (index, meta) in metadata.iter().enumerate() {
            let is_admin = meta.is_admin(own_id.as_deref());
            let invite_code = if is_admin {
                match self.session.invite_code(&meta.id).await {
                    Ok(code) => Some(format!("{}{}", INVITE_LINK_PREFIX, code)),
                    Err(e) => {
                        warn!(group = %meta.subject, error = %e, "Failed to get invite code");
                        None
                    }
                }
            } else {
                None
            };

            groups.push(Group {
                id: meta.id.clone(),
                number: index as u32 + 1,
                name: meta.subject.clone(),
                participants: meta.participants.len(),
                pending: meta.pending(),
                invite_code,
                is_admin,
            });
        }

        self.cache
            .set_with_ttl(GROUPS_CACHE_KEY, &groups, GROUPS_TTL_SECS)
            .await;
        info!(count = groups.len(), "Loaded groups");

        Ok(groups)
    }

    /// The group listing, from cache when possible
    pub async fn groups(&self) -> Result<Vec<Group>> {
        self.require_connected().await?;

        if let Some(groups) = self.cache.get::<Vec<Group>>(GROUPS_CACHE_KEY).await {
            return Ok(groups);
        }

        self.load_groups().await
    }

    pub async fn find(&self, number: u32) -> Result<Group> {
        self.groups()
            .await?
            .into_iter()
            .find(|g| g.number == number)
            .ok_or(BridgeError::GroupNotFound)
    }

    /// A group we may modify
    pub async fn admin_group(&self, number: u32) -> Result<Group> {
        let group = self.find(number).await?;
        if !group.is_admin {
            return Err(BridgeError::NotAdmin);
        }
        Ok(group)
    }

    pub async fn rename(&self, number: u32, new_name: &str) -> Result<Group> {
        let group = self.admin_group(number).await?;
        self.session.update_subject(&group.id, new_name).await?;
        info!(group = number, "Group renamed");
        Ok(group)
    }

    pub async fn set_description(&self, number: u32, description: &str) -> Result<Group> {
        let group = self.admin_group(number).await?;
        self.session
            .update_description(&group.id, description)
            .await?;
        info!(group = number, "Group description updated");
        Ok(group)
    }

    pub async fn set_picture(&self, number: u32, source: PictureSource) -> Result<Group> {
        let group = self.admin_group(number).await?;
        let image = match source {
            PictureSource::Bytes(bytes) => bytes,
            PictureSource::Url(url) => self.fetcher.fetch(&url).await?,
        };
        if image.is_empty() {
            return Err(BridgeError::BadRequest("Image is empty".to_string()));
        }
        self.session.update_picture(&group.id, image).await?;
        info!(group = number, "Group picture updated");
        Ok(group)
    }

    pub async fn remove_picture(&self, number: u32) -> Result<Group> {
        let group = self.admin_group(number).await?;
        self.session.remove_picture(&group.id).await?;
        info!(group = number, "Group picture removed");
        Ok(group)
    }

    /// Add a phone number (or full user id) to a group
    pub async fn invite(&self, number: u32, phone: &str) -> Result<Group> {
        let group = self.admin_group(number).await?;
        self.session
            .add_participant(&group.id, &user_jid(phone))
            .await?;
        info!(group = number, "Member invited");
        Ok(group)
    }

    pub async fn group_info(&self, number: u32) -> Result<GroupInfo> {
        let group = self.find(number).await?;
        let meta = self.session.group_metadata(&group.id).await?;
        let own_id = self.session.own_id();

        Ok(GroupInfo {
            id: meta.id.clone(),
            number,
            name: meta.subject.clone(),
            description: meta.description.clone(),
            participants: meta.participants.len(),
            pending: meta.pending(),
            invite_code: group.invite_code,
            is_admin: meta.is_admin(own_id.as_deref()),
        })
    }

    /// Change a setting on one group or on every group we administer.
    ///
    /// Each group is attempted independently; consecutive operations are
    /// spaced by the configured pacing.
    pub async fn apply_setting(
        &self,
        setting: GroupSetting,
        enabled: bool,
        target: SettingTarget,
    ) -> Result<Vec<SettingResult>> {
        let groups = self.groups().await?;
        let targets: Vec<Group> = match target {
            SettingTarget::All => groups.into_iter().filter(|g| g.is_admin).collect(),
            SettingTarget::Group(number) => groups
                .into_iter()
                .filter(|g| g.number == number && g.is_admin)
                .collect(),
        };

        if targets.is_empty() {
            return Err(BridgeError::BadRequest(
                "No valid admin groups found".to_string(),
            ));
        }

        let mut results = Vec::with_capacity(targets.len());
        for (i, group) in targets.iter().enumerate() {
            if i > 0 {
                self.pacing.pause().await;
            }

            let outcome = self
                .session
                .update_setting(&group.id, setting, enabled)
                .await;
            if let Err(e) = &outcome {
                warn!(group = group.number, setting = setting.name(), error = %e, "Failed to update group setting");
            }
            results.push(SettingResult {
                group_number: group.number,
                group_name: group.name.clone(),
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            });
        }

        Ok(results)
    }
}

/// Normalise a phone number to a user id
fn user_jid(phone: &str) -> String {
    let phone = phone.trim();
    if phone.contains(USER_JID_SUFFIX) {
        phone.to_string()
    } else {
        format!("{}{}", phone, USER_JID_SUFFIX)
    }
}
