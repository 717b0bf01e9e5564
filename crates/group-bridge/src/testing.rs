//! In-memory session for tests

use crate::session::{
    ConnectionUpdate, GroupMetadata, MessagingSession, Participant, SessionError, SessionResult,
};
use crate::picture::PictureFetcher;
use crate::types::GroupSetting;
use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::broadcast;

pub const OWN_ID: &str = "me@s.whatsapp.net";

/// Serve `body` at `path` on a local port and return its URL
pub async fn serve_bytes(path: &str, body: Vec<u8>) -> String {
    let app = Router::new().route(
        path,
        get(move || {
            let body = body.clone();
            async move { body }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}{}", addr, path)
}

/// Fetcher that ignores proxy settings from the environment
pub fn local_fetcher() -> PictureFetcher {
    PictureFetcher::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
}

/// A group where we hold an admin role next to one regular member
pub fn admin_group(id: &str, subject: &str) -> GroupMetadata {
    GroupMetadata {
        id: id.to_string(),
        subject: subject.to_string(),
        description: Some(format!("About {}", subject)),
        participants: vec![
            Participant {
                id: OWN_ID.to_string(),
                is_admin: true,
            },
            Participant {
                id: "friend@s.whatsapp.net".to_string(),
                is_admin: false,
            },
        ],
    }
}

/// A group where someone else is the admin
pub fn member_group(id: &str, subject: &str) -> GroupMetadata {
    GroupMetadata {
        id: id.to_string(),
        subject: subject.to_string(),
        description: Some(format!("About {}", subject)),
        participants: vec![
            Participant {
                id: OWN_ID.to_string(),
                is_admin: false,
            },
            Participant {
                id: "owner@s.whatsapp.net".to_string(),
                is_admin: true,
            },
        ],
    }
}

#[derive(Default)]
struct FakeState {
    connect_calls: usize,
    logout_calls: usize,
    group_fetches: usize,
    calls: Vec<String>,
    failing_settings: HashSet<String>,
}

pub struct FakeSession {
    groups: Vec<GroupMetadata>,
    state: Mutex<FakeState>,
    updates: broadcast::Sender<ConnectionUpdate>,
}

impl FakeSession {
    pub fn with_groups(groups: Vec<GroupMetadata>) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self {
            groups,
            state: Mutex::new(FakeState::default()),
            updates,
        }
    }

    /// Make setting changes on `group_id` fail
    pub fn fail_settings_for(&self, group_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_settings
            .insert(group_id.to_string());
    }

    pub fn emit(&self, update: ConnectionUpdate) {
        let _ = self.updates.send(update);
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().unwrap().connect_calls
    }

    pub fn logout_calls(&self) -> usize {
        self.state.lock().unwrap().logout_calls
    }

    pub fn group_fetches(&self) -> usize {
        self.state.lock().unwrap().group_fetches
    }

    /// Mutating calls, in order, as `op:group[:arg]`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn lookup(&self, group_id: &str) -> SessionResult<GroupMetadata> {
        self.groups
            .iter()
            .find(|g| g.id == group_id)
            .cloned()
            .ok_or_else(|| SessionError::Rejected("item-not-found".to_string()))
    }
}

#[async_trait]
impl MessagingSession for FakeSession {
    async fn connect(&self) -> SessionResult<()> {
        self.state.lock().unwrap().connect_calls += 1;
        Ok(())
    }

    async fn logout(&self) -> SessionResult<()> {
        self.state.lock().unwrap().logout_calls += 1;
        Ok(())
    }

    fn own_id(&self) -> Option<String> {
        Some(OWN_ID.to_string())
    }

    async fn participating_groups(&self) -> SessionResult<Vec<GroupMetadata>> {
        self.state.lock().unwrap().group_fetches += 1;
        Ok(self.groups.clone())
    }

    async fn group_metadata(&self, group_id: &str) -> SessionResult<GroupMetadata> {
        self.lookup(group_id)
    }

    async fn invite_code(&self, group_id: &str) -> SessionResult<String> {
        self.lookup(group_id)?;
        Ok(format!("code-{}", group_id))
    }

    async fn update_setting(
        &self,
        group_id: &str,
        setting: GroupSetting,
        enabled: bool,
    ) -> SessionResult<()> {
        if self
            .state
            .lock()
            .unwrap()
            .failing_settings
            .contains(group_id)
        {
            return Err(SessionError::Rejected("not-authorized".to_string()));
        }
        self.record(format!("setting:{}:{}:{}", group_id, setting.name(), enabled));
        Ok(())
    }

    async fn update_subject(&self, group_id: &str, subject: &str) -> SessionResult<()> {
        self.record(format!("subject:{}:{}", group_id, subject));
        Ok(())
    }

    async fn update_description(&self, group_id: &str, description: &str) -> SessionResult<()> {
        self.record(format!("description:{}:{}", group_id, description));
        Ok(())
    }

    async fn update_picture(&self, group_id: &str, image: Vec<u8>) -> SessionResult<()> {
        self.record(format!("picture:{}:{}", group_id, image.len()));
        Ok(())
    }

    async fn remove_picture(&self, group_id: &str) -> SessionResult<()> {
        self.record(format!("remove-picture:{}", group_id));
        Ok(())
    }

    async fn add_participant(&self, group_id: &str, jid: &str) -> SessionResult<()> {
        self.record(format!("add:{}:{}", group_id, jid));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionUpdate> {
        self.updates.subscribe()
    }
}
