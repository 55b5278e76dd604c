use core::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    api::Token,
    event::{MessageEvent, NoticeEvent, NoticeKind, RequestEvent, RequestKind},
};

/// Observes every accepted message of one scope before command dispatch.
#[async_trait]
pub trait MessageHook: Send + Sync {
    async fn call(&self, event: &MessageEvent, tokens: &[Token]) -> Result<()>;
}

/// Named behavioral callbacks. Every method defaults to a no-op.
#[async_trait]
pub trait EventCallbacks: Send + Sync {
    /// A group message mentioned the bot itself.
    async fn at_bot(&self, _event: &MessageEvent, _tokens: &[Token], _mention: &Token) -> Result<()> {
        Ok(())
    }

    /// A group message mentioned someone other than the bot.
    async fn at(&self, _event: &MessageEvent, _tokens: &[Token], _mention: &Token) -> Result<()> {
        Ok(())
    }

    async fn notice(&self, _kind: NoticeKind, _event: &NoticeEvent) -> Result<()> {
        Ok(())
    }

    async fn request(&self, _kind: RequestKind, _event: &RequestEvent) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl EventCallbacks for NoCallbacks {}

/// Optional message hooks plus the callback set. An absent hook is simply
/// not called.
#[derive(Clone)]
pub struct Hooks {
    pub on_group_msg: Option<Arc<dyn MessageHook>>,
    pub on_private_msg: Option<Arc<dyn MessageHook>>,
    pub callbacks: Arc<dyn EventCallbacks>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_group_msg", &self.on_group_msg.is_some())
            .field("on_private_msg", &self.on_private_msg.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            on_group_msg: None,
            on_private_msg: None,
            callbacks: Arc::new(NoCallbacks),
        }
    }
}
