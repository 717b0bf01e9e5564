//! Core types for the group bridge

use serde::{Deserialize, Serialize};
use session_cache::{BackendKind, CacheConfig, CacheStats};
use std::path::PathBuf;

/// Cache key of the "a session was paired" marker
pub const SESSION_CACHE_KEY: &str = "wa_session";
/// Cache key of the numbered group listing
pub const GROUPS_CACHE_KEY: &str = "wa_groups";
/// The session marker outlives the group listing so a restart reconnects
pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const GROUPS_TTL_SECS: u64 = 60 * 60;

/// Configuration for the bridge service
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub port: u16,
    pub session_path: PathBuf,
    /// Only this chat user may issue bot commands
    pub owner_id: Option<String>,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub cache: CacheConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            session_path: PathBuf::from("./sessions"),
            owner_id: None,
            min_delay_ms: 2000,
            max_delay_ms: 5000,
            cache: CacheConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = var("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let session_path = var("SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_path);

        let owner_id = var("OWNER_TELEGRAM_ID").filter(|s| !s.trim().is_empty());

        let min_delay_ms = var("MIN_DELAY_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.min_delay_ms);

        let max_delay_ms = var("MAX_DELAY_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_delay_ms)
            .max(min_delay_ms);

        Self {
            port,
            session_path,
            owner_id,
            min_delay_ms,
            max_delay_ms,
            cache: CacheConfig::from_vars(&var),
        }
    }
}

/// Marker cached while a session is paired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMarker {
    pub connected: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// A group as listed to the bot, numbered from 1 in listing order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub number: u32,
    pub name: String,
    pub participants: usize,
    /// Participants without an admin role
    pub pending: usize,
    /// Full invite link, only known for groups we administer
    pub invite_code: Option<String>,
    pub is_admin: bool,
}

/// Detailed view of a single group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: String,
    pub number: u32,
    pub name: String,
    pub description: Option<String>,
    pub participants: usize,
    pub pending: usize,
    pub invite_code: Option<String>,
    pub is_admin: bool,
}

/// Group settings the bot can toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSetting {
    /// Only admins may edit the group info
    Info,
    /// Only admins may send messages
    Messaging,
    /// Only admins may share media
    Media,
    /// New members need admin approval
    Approval,
}

impl GroupSetting {
    /// Parse the short names used by the bot (`info`, `msg`, `media`, `approve`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "info" => Some(Self::Info),
            "msg" => Some(Self::Messaging),
            "media" => Some(Self::Media),
            "approve" => Some(Self::Approval),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Messaging => "msg",
            Self::Media => "media",
            Self::Approval => "approve",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Messaging => "Messages",
            Self::Media => "Media",
            Self::Approval => "Approval",
        }
    }
}

/// Which groups a setting change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingTarget {
    /// Every group we administer
    All,
    Group(u32),
}

impl SettingTarget {
    pub fn parse(target: &str) -> Option<Self> {
        let target = target.trim();
        if target.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        target.parse::<u32>().ok().map(Self::Group)
    }
}

/// Parse an `on` / `off` switch
pub fn parse_switch(action: &str) -> Option<bool> {
    match action.trim() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Outcome of a setting change on one group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingResult {
    pub group_number: u32,
    pub group_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Session connection state as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
}

/// Cache section of the health response
#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub backend: BackendKind,
    #[serde(flatten)]
    pub stats: CacheStats,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub cache: CacheHealth,
}
