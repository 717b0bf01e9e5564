//! Chat bot commands
//!
//! Parses the owner's slash commands into [`BotCommand`]s, runs them against a
//! [`GroupDirectory`] and renders the replies.

use crate::groups::{GroupDirectory, LoginOutcome, PictureSource};
use crate::types::{
    parse_switch, ConnectionStatus, Group, GroupInfo, GroupSetting, SettingResult, SettingTarget,
};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const HELP_TEXT: &str = "\
WhatsApp Bot Commands:

Connection:
/login <number> - Login WhatsApp
/status - Check connection status

Groups:
/list_groups - List all groups
/group_info <no> - Get group info

Group Settings:
/set_info on|off <no/all> - Toggle group info edit
/set_msg on|off <no/all> - Toggle messaging
/set_media on|off <no/all> - Toggle media sharing
/set_approve on|off <no/all> - Toggle member approval

Group Management:
/rename <no> <new_name> - Rename group
/bio <no> <new_bio> - Update group description
/setpp <no> - Set group profile picture
/delpp <no> - Delete group profile picture
/invite <no> <number> - Invite member to group

Example: /rename 1 New Group";

pub const UNAUTHORIZED_REPLY: &str = "Unauthorized access";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Login { number: String },
    Status,
    ListGroups,
    GroupInfo { group: u32 },
    SetSetting {
        setting: GroupSetting,
        enabled: bool,
        target: SettingTarget,
    },
    Rename { group: u32, name: String },
    Bio { group: u32, text: String },
    /// Ask for a photo; the picture itself arrives in a later message
    SetPicture { group: u32 },
    DeletePicture { group: u32 },
    Invite { group: u32, phone: String },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Plain text, not a slash command
    NotACommand,
    Unknown(String),
    /// Right command, wrong arguments; carries the expected usage
    Usage(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::NotACommand => write!(f, "Not a command"),
            CommandError::Unknown(name) => write!(f, "Unknown command: /{}. Send /help", name),
            CommandError::Usage(usage) => write!(f, "Usage: {}", usage),
        }
    }
}

impl std::error::Error for CommandError {}

impl BotCommand {
    /// Parse a message such as `/rename 2 Weekend Hikers`.
    ///
    /// A `@botname` suffix on the command word is ignored.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        let Some(body) = text.strip_prefix('/') else {
            return Err(CommandError::NotACommand);
        };

        let (word, rest) = match body.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (body, ""),
        };
        let name = word.split('@').next().unwrap_or(word);

        match name {
            "login" => {
                let number = rest.split_whitespace().next().ok_or(CommandError::Usage(
                    "/login <number>",
                ))?;
                Ok(BotCommand::Login {
                    number: number.to_string(),
                })
            }
            "status" => Ok(BotCommand::Status),
            "list_groups" => Ok(BotCommand::ListGroups),
            "group_info" => Ok(BotCommand::GroupInfo {
                group: group_arg(rest, "/group_info <no>")?,
            }),
            "set_info" => setting_command(GroupSetting::Info, rest, "/set_info on|off <no/all>"),
            "set_msg" => setting_command(GroupSetting::Messaging, rest, "/set_msg on|off <no/all>"),
            "set_media" => {
                setting_command(GroupSetting::Media, rest, "/set_media on|off <no/all>")
            }
            "set_approve" => {
                setting_command(GroupSetting::Approval, rest, "/set_approve on|off <no/all>")
            }
            "rename" => {
                let (group, name) = group_and_text(rest, "/rename <no> <new_name>")?;
                Ok(BotCommand::Rename { group, name })
            }
            "bio" => {
                let (group, text) = group_and_text(rest, "/bio <no> <new_bio>")?;
                Ok(BotCommand::Bio { group, text })
            }
            "setpp" => Ok(BotCommand::SetPicture {
                group: group_arg(rest, "/setpp <no>")?,
            }),
            "delpp" => Ok(BotCommand::DeletePicture {
                group: group_arg(rest, "/delpp <no>")?,
            }),
            "invite" => {
                const USAGE: &str = "/invite <no> <number>";
                let (group, phone) = group_and_text(rest, USAGE)?;
                if !phone.chars().all(|c| c.is_ascii_digit()) {
                    return Err(CommandError::Usage(USAGE));
                }
                Ok(BotCommand::Invite { group, phone })
            }
            "help" | "start" => Ok(BotCommand::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn group_arg(rest: &str, usage: &'static str) -> Result<u32, CommandError> {
    rest.split_whitespace()
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .ok_or(CommandError::Usage(usage))
}

fn group_and_text(rest: &str, usage: &'static str) -> Result<(u32, String), CommandError> {
    let (number, text) = rest
        .split_once(char::is_whitespace)
        .ok_or(CommandError::Usage(usage))?;
    let group = group_arg(number, usage)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    Ok((group, text.to_string()))
}

fn setting_command(
    setting: GroupSetting,
    rest: &str,
    usage: &'static str,
) -> Result<BotCommand, CommandError> {
    let mut args = rest.split_whitespace();
    let enabled = args
        .next()
        .and_then(parse_switch)
        .ok_or(CommandError::Usage(usage))?;
    let target = args
        .next()
        .and_then(SettingTarget::parse)
        .ok_or(CommandError::Usage(usage))?;
    Ok(BotCommand::SetSetting {
        setting,
        enabled,
        target,
    })
}

/// Only the configured owner may command the bot; with no owner configured
/// nobody may.
pub fn is_owner(owner_id: Option<&str>, sender_id: &str) -> bool {
    owner_id.is_some_and(|owner| owner == sender_id.trim())
}

fn role_label(is_admin: bool) -> &'static str {
    if is_admin {
        "Admin"
    } else {
        "Member"
    }
}

pub fn format_status(status: ConnectionStatus) -> String {
    let state = if status.connected {
        "Connected"
    } else {
        "Disconnected"
    };
    format!("WhatsApp Status: {}", state)
}

pub fn format_group_list(groups: &[Group]) -> String {
    if groups.is_empty() {
        return "No groups found".to_string();
    }

    let mut message = String::from("Groups:\n\n");
    for group in groups {
        message.push_str(&format!("{}. {}\n", group.number, group.name));
        message.push_str(&format!("   Members: {}\n", group.participants));
        message.push_str(&format!("   Pending: {}\n", group.pending));
        message.push_str(&format!(
            "   Link: {}\n",
            group.invite_code.as_deref().unwrap_or("-")
        ));
        message.push_str(&format!("   Status: {}\n\n", role_label(group.is_admin)));
    }
    message.trim_end().to_string()
}

pub fn format_group_info(info: &GroupInfo) -> String {
    let mut message = format!("Name: {}\n", info.name);
    message.push_str(&format!("Members: {}\n", info.participants));
    message.push_str(&format!("Pending: {}\n", info.pending));
    message.push_str(&format!(
        "Link: {}\n",
        info.invite_code.as_deref().unwrap_or("-")
    ));
    message.push_str(&format!("Status: {}", role_label(info.is_admin)));
    if let Some(description) = info.description.as_deref().filter(|d| !d.is_empty()) {
        message.push_str(&format!("\nDescription: {}", description));
    }
    message
}

pub fn format_setting_results(
    setting: GroupSetting,
    enabled: bool,
    results: &[SettingResult],
) -> String {
    let action = if enabled { "enabled" } else { "disabled" };
    if results.is_empty() {
        return format!("{} {}", setting.label(), action);
    }

    results
        .iter()
        .map(|r| match &r.error {
            None if r.success => format!("Group {}: {} {}", r.group_number, setting.label(), action),
            error => format!(
                "Group {}: failed ({})",
                r.group_number,
                error.as_deref().unwrap_or("unknown error")
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs owner commands against the group directory.
///
/// A `/setpp` is completed by the next photo sent from the same chat.
pub struct CommandHandler<'a> {
    directory: &'a GroupDirectory,
    owner_id: Option<&'a str>,
    /// Chat id to the group number waiting for a photo
    pending_photos: Mutex<HashMap<String, u32>>,
}

impl<'a> CommandHandler<'a> {
    pub fn new(directory: &'a GroupDirectory, owner_id: Option<&'a str>) -> Self {
        Self {
            directory,
            owner_id,
            pending_photos: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one incoming text message and produce the reply, if any
    pub async fn handle_message(&self, chat_id: &str, sender_id: &str, text: &str) -> Option<String> {
        if !is_owner(self.owner_id, sender_id) {
            warn!(sender = %sender_id, "Rejected command from non-owner");
            return Some(UNAUTHORIZED_REPLY.to_string());
        }

        match BotCommand::parse(text) {
            Ok(command) => Some(self.execute(chat_id, command).await),
            Err(CommandError::NotACommand) => None,
            Err(e) => Some(e.to_string()),
        }
    }

    /// Handle a photo message downloadable at `file_url`.
    ///
    /// Only a photo following a `/setpp` from the same chat is used; any other
    /// photo gets no reply.
    pub async fn handle_photo(&self, chat_id: &str, sender_id: &str, file_url: &str) -> Option<String> {
        if !is_owner(self.owner_id, sender_id) {
            warn!(sender = %sender_id, "Rejected photo from non-owner");
            return Some(UNAUTHORIZED_REPLY.to_string());
        }

        let group = self.pending_photos.lock().await.remove(chat_id)?;
        Some(self.set_picture_from_url(group, file_url).await)
    }

    pub async fn execute(&self, chat_id: &str, command: BotCommand) -> String {
        debug!(command = ?command, "Executing bot command");
        let directory = self.directory;

        match command {
            BotCommand::Help => HELP_TEXT.to_string(),
            BotCommand::Status => format_status(directory.status().await),
            BotCommand::Login { .. } => match directory.login().await {
                Ok(LoginOutcome::AlreadyConnected) => "Login successful!".to_string(),
                Ok(LoginOutcome::Qr(_)) => "Scan the QR code to finish login".to_string(),
                Ok(LoginOutcome::Connecting) => "Connecting...".to_string(),
                Err(e) => format!("Login failed: {}", e),
            },
            BotCommand::ListGroups => match directory.groups().await {
                Ok(groups) => format_group_list(&groups),
                Err(e) => format!("Error listing groups: {}", e),
            },
            BotCommand::GroupInfo { group } => match directory.group_info(group).await {
                Ok(info) => format_group_info(&info),
                Err(e) => format!("Error getting group info: {}", e),
            },
            BotCommand::SetSetting {
                setting,
                enabled,
                target,
            } => match directory.apply_setting(setting, enabled, target).await {
                Ok(results) => format_setting_results(setting, enabled, &results),
                Err(e) => format!("Error setting {}: {}", setting.label(), e),
            },
            BotCommand::Rename { group, name } => match directory.rename(group, &name).await {
                Ok(_) => format!("Group {} renamed to \"{}\"", group, name),
                Err(e) => format!("Error renaming group: {}", e),
            },
            BotCommand::Bio { group, text } => {
                match directory.set_description(group, &text).await {
                    Ok(_) => format!("Group {} description updated", group),
                    Err(e) => format!("Error updating description: {}", e),
                }
            }
            BotCommand::SetPicture { group } => match directory.admin_group(group).await {
                Ok(_) => {
                    self.pending_photos
                        .lock()
                        .await
                        .insert(chat_id.to_string(), group);
                    format!("Send a photo to use as the picture of group {}", group)
                }
                Err(e) => format!("Error updating picture: {}", e),
            },
            BotCommand::DeletePicture { group } => match directory.remove_picture(group).await {
                Ok(_) => format!("Group {} picture removed", group),
                Err(e) => format!("Error removing picture: {}", e),
            },
            BotCommand::Invite { group, phone } => match directory.invite(group, &phone).await {
                Ok(_) => format!("Invited {} to group {}", phone, group),
                Err(e) => format!("Error inviting member: {}", e),
            },
        }
    }

    async fn set_picture_from_url(&self, group: u32, file_url: &str) -> String {
        match self
            .directory
            .set_picture(group, PictureSource::Url(file_url.to_string()))
            .await
        {
            Ok(_) => format!("Group {} picture updated", group),
            Err(e) => format!("Error updating picture: {}", e),
        }
    }
}
