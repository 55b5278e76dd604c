use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bot_core::{
    EventCallbacks, MessageEvent, MessageHook, NoticeEvent, NoticeKind, RequestEvent, RequestKind,
    Token, truncate,
};
use gateway::HttpApi;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::RequestPolicy;

/// Logs every accepted message before commands run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessages;

#[async_trait]
impl MessageHook for LogMessages {
    async fn call(&self, event: &MessageEvent, tokens: &[Token]) -> Result<()> {
        info!(
            scope = %event.scope,
            message_id = event.message_id,
            sender = %event.describe_sender(),
            tokens = tokens.len(),
            body = %truncate(&event.raw_text, 200),
            "Incoming message"
        );
        Ok(())
    }
}

/// What to do with one incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    ApproveFriend,
    ApproveGroup { sub_type: &'static str },
    Ignore,
}

const fn decide(kind: RequestKind, policy: RequestPolicy) -> Decision {
    match kind {
        RequestKind::Friend if policy.approve_friends => Decision::ApproveFriend,
        RequestKind::GroupInvite if policy.approve_group_invites => {
            Decision::ApproveGroup { sub_type: "invite" }
        }
        // join requests are left to group admins
        RequestKind::Friend | RequestKind::GroupInvite | RequestKind::GroupAdd => Decision::Ignore,
    }
}

/// Answers friend requests and group invites according to the config.
#[derive(Debug)]
pub struct BotCallbacks {
    api: Arc<HttpApi>,
    policy: RequestPolicy,
}

impl BotCallbacks {
    pub const fn new(api: Arc<HttpApi>, policy: RequestPolicy) -> Self {
        Self { api, policy }
    }
}

fn request_flag(event: &RequestEvent) -> Result<&str> {
    event
        .payload
        .get("flag")
        .and_then(Value::as_str)
        .context("request event without flag")
}

#[async_trait]
impl EventCallbacks for BotCallbacks {
    async fn notice(&self, kind: NoticeKind, event: &NoticeEvent) -> Result<()> {
        debug!(?kind, payload = %truncate(&event.payload.to_string(), 200), "Notice");
        Ok(())
    }

    async fn request(&self, kind: RequestKind, event: &RequestEvent) -> Result<()> {
        match decide(kind, self.policy) {
            Decision::ApproveFriend => {
                let flag = request_flag(event)?;
                self.api.set_friend_add_request(flag, true, "").await?;
                info!(?kind, "Approved friend request");
            }
            Decision::ApproveGroup { sub_type } => {
                let flag = request_flag(event)?;
                self.api.set_group_add_request(flag, sub_type, true, "").await?;
                info!(?kind, "Approved group invite");
            }
            Decision::Ignore => debug!(?kind, "Request left unanswered"),
        }
        Ok(())
    }
}
