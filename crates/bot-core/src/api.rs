use core::time::Duration;
use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::event::{MessageEvent, MessageScope};

/// Outbound calls into the gateway.
///
/// Transport failures are the implementation's concern; the dispatcher only
/// logs a returned error and moves on.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn send_private_msg(&self, user_id: i64, message: &str) -> Result<()>;

    async fn send_group_msg(&self, group_id: i64, message: &str) -> Result<()>;

    /// Reply on the conversation the event came from.
    async fn reply(&self, event: &MessageEvent, text: &str) -> Result<()> {
        match (event.scope, event.group_id) {
            (MessageScope::Group, Some(group_id)) => self.send_group_msg(group_id, text).await,
            (MessageScope::Group | MessageScope::Private, _) => {
                self.send_private_msg(event.actor_id, text).await
            }
        }
    }
}

/// One segment of a parsed message, e.g. `text` or `at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: String,
    pub data: BTreeMap<String, String>,
}

impl Token {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_owned(),
            data: BTreeMap::from([("text".to_owned(), text.into())]),
        }
    }

    #[must_use]
    pub fn at(qq: impl Into<String>) -> Self {
        Self {
            kind: "at".to_owned(),
            data: BTreeMap::from([("qq".to_owned(), qq.into())]),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// The addressee if this token is a mention.
    #[must_use]
    pub fn mention_target(&self) -> Option<&str> {
        if self.kind == "at" { self.get("qq") } else { None }
    }
}

/// Group management calls. Every call acts on behalf of the bot account,
/// so the gateway rejects those the bot lacks group rights for.
#[async_trait]
pub trait GroupModeration: Send + Sync {
    /// Mutes one member; a zero duration lifts the mute.
    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration: Duration) -> Result<()>;

    async fn set_group_whole_ban(&self, group_id: i64, enable: bool) -> Result<()>;

    async fn set_group_admin(&self, group_id: i64, user_id: i64, enable: bool) -> Result<()>;

    async fn set_group_card(&self, group_id: i64, user_id: i64, card: &str) -> Result<()>;

    async fn set_group_name(&self, group_id: i64, name: &str) -> Result<()>;

    async fn set_group_leave(&self, group_id: i64, dismiss: bool) -> Result<()>;

    async fn set_group_special_title(&self, group_id: i64, user_id: i64, title: &str) -> Result<()>;
}

/// Splits a raw message into tokens. Never fails; malformed markup degrades
/// to text tokens.
pub trait MarkupParser: Send + Sync {
    fn parse(&self, raw: &str) -> Vec<Token>;

    /// Makes `text` render literally once sent. Markup-free formats need no
    /// escaping.
    fn escape(&self, text: &str) -> String {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_target_only_for_at_tokens() {
        assert_eq!(Token::at("123").mention_target(), Some("123"));
        assert_eq!(Token::text("@123").mention_target(), None);
    }
}
