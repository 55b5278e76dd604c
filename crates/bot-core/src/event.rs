use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded gateway event. Consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(MessageEvent),
    Notice(NoticeEvent),
    Request(RequestEvent),
    MetaConnect { self_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageScope {
    Private,
    Group,
}

impl fmt::Display for MessageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => f.write_str("private"),
            Self::Group => f.write_str("group"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anonymous {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub scope: MessageScope,
    pub message_id: i64,
    pub actor_id: i64,
    pub group_id: Option<i64>,
    pub raw_text: String,
    pub sender: SenderInfo,
    pub anonymous: Option<Anonymous>,
}

impl MessageEvent {
    /// The conversation the message belongs to: the group for group
    /// messages, the sender for private ones.
    #[must_use]
    pub fn target_id(&self) -> i64 {
        self.group_id.unwrap_or(self.actor_id)
    }

    /// Human-readable sender description used in logs and denial replies.
    #[must_use]
    pub fn describe_sender(&self) -> String {
        let name = if let Some(anon) = &self.anonymous {
            format!("anonymous {} (flag {})", anon.name, anon.flag)
        } else {
            match self.sender.card.as_deref().map(str::trim) {
                Some(card) if self.scope == MessageScope::Group && !card.is_empty() => {
                    card.to_owned()
                }
                _ => self.sender.nickname.clone(),
            }
        };
        match self.group_id {
            Some(group) => format!("{name} (user={}, group={group})", self.actor_id),
            None => format!("{name} (user={})", self.actor_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoticeEvent {
    pub notice_type: String,
    pub sub_type: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestEvent {
    pub request_type: String,
    pub sub_type: Option<String>,
    pub payload: Value,
}

/// Named notice callbacks, looked up statically by `(notice_type, sub_type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    GroupUpload,
    GroupAdminSet,
    GroupAdminUnset,
    GroupDecreaseLeave,
    GroupDecreaseKick,
    GroupDecreaseKickMe,
    GroupIncreaseApprove,
    GroupIncreaseInvite,
    GroupBan,
    GroupLiftBan,
    GroupRecall,
    LuckyKing,
    Honor,
    Poke,
    GroupCard,
    FriendAdd,
    FriendRecall,
    OfflineFile,
    ClientStatus,
    EssenceAdd,
    EssenceDelete,
}

impl NoticeKind {
    #[must_use]
    pub fn lookup(notice_type: &str, sub_type: Option<&str>) -> Option<Self> {
        let kind = match (notice_type, sub_type) {
            ("group_upload", _) => Self::GroupUpload,
            ("group_admin", Some("set")) => Self::GroupAdminSet,
            ("group_admin", Some("unset")) => Self::GroupAdminUnset,
            ("group_decrease", Some("leave")) => Self::GroupDecreaseLeave,
            ("group_decrease", Some("kick")) => Self::GroupDecreaseKick,
            ("group_decrease", Some("kick_me")) => Self::GroupDecreaseKickMe,
            ("group_increase", Some("approve")) => Self::GroupIncreaseApprove,
            ("group_increase", Some("invite")) => Self::GroupIncreaseInvite,
            ("group_ban", Some("ban")) => Self::GroupBan,
            ("group_ban", Some("lift_ban")) => Self::GroupLiftBan,
            ("group_recall", _) => Self::GroupRecall,
            ("notify", Some("lucky_king")) => Self::LuckyKing,
            ("notify", Some("honor")) => Self::Honor,
            ("notify", Some("poke")) => Self::Poke,
            ("group_card", _) => Self::GroupCard,
            ("friend_add", _) => Self::FriendAdd,
            ("friend_recall", _) => Self::FriendRecall,
            ("offline_file", _) => Self::OfflineFile,
            ("client_status", _) => Self::ClientStatus,
            ("essence", Some("add")) => Self::EssenceAdd,
            ("essence", Some("delete")) => Self::EssenceDelete,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Friend,
    GroupAdd,
    GroupInvite,
}

impl RequestKind {
    #[must_use]
    pub fn lookup(request_type: &str, sub_type: Option<&str>) -> Option<Self> {
        match (request_type, sub_type) {
            ("friend", _) => Some(Self::Friend),
            ("group", Some("add")) => Some(Self::GroupAdd),
            ("group", Some("invite")) => Some(Self::GroupInvite),
            _ => None,
        }
    }
}
