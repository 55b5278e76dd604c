use core::{
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::atomic::{AtomicI64, Ordering},
};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use futures_util::FutureExt as _;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::{
    api::{ApiClient, MarkupParser, Token},
    command::{CommandContext, CommandTable},
    config::DispatchConfig,
    event::{Event, MessageEvent, MessageScope, NoticeEvent, NoticeKind, RequestEvent, RequestKind},
    hooks::Hooks,
    ids::AdminSet,
    permission::{PermissionGate, Verdict},
    scheduler::{JobExit, TimingScheduler, panic_message},
};

/// A command split out of a message: `/name arg1 arg2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
}

/// Returns `None` unless the very first character is the command sign.
#[must_use]
pub fn parse_command(raw: &str, sign: char) -> Option<Invocation> {
    if !raw.starts_with(sign) {
        return None;
    }
    let mut parts = raw.split_whitespace();
    let head = parts.next()?;
    Some(Invocation {
        name: head.trim_start_matches(sign).to_owned(),
        args: parts.map(ToOwned::to_owned).collect(),
    })
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("table", &self.table)
            .field("self_id", &self.self_id())
            .finish_non_exhaustive()
    }
}

/// Routes gateway events to hooks, callbacks and commands.
///
/// Events are expected one at a time. Nothing a hook, callback or command
/// does can make `handle` fail.
pub struct Dispatcher {
    config: DispatchConfig,
    table: CommandTable,
    gate: PermissionGate,
    api: Arc<dyn ApiClient>,
    parser: Arc<dyn MarkupParser>,
    hooks: Hooks,
    self_id: AtomicI64,
    scheduler: Mutex<Option<TimingScheduler>>,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns an error if the config fails validation.
    pub fn new(
        config: DispatchConfig,
        table: CommandTable,
        api: Arc<dyn ApiClient>,
        parser: Arc<dyn MarkupParser>,
    ) -> Result<Self> {
        config.validate()?;
        let admins: AdminSet = config.admins.iter().copied().collect();
        Ok(Self {
            config,
            table,
            gate: PermissionGate::new(admins),
            api,
            parser,
            hooks: Hooks::default(),
            self_id: AtomicI64::new(0),
            scheduler: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_scheduler(self, scheduler: TimingScheduler) -> Self {
        *self.scheduler.lock().unwrap_or_else(PoisonError::into_inner) = Some(scheduler);
        self
    }

    #[must_use]
    pub const fn table(&self) -> &CommandTable {
        &self.table
    }

    /// The bot's own id, once the gateway has announced it.
    #[must_use]
    pub fn self_id(&self) -> Option<i64> {
        match self.self_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Starts the timing scheduler. Only the first call does anything.
    pub fn start_timing(&self) -> Vec<JoinHandle<JobExit>> {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        scheduler.map(TimingScheduler::start).unwrap_or_default()
    }

    pub async fn handle(&self, event: Event) {
        match event {
            Event::MetaConnect { self_id } => self.handle_connect(self_id),
            Event::Message(msg) => self.handle_message(&msg).await,
            Event::Notice(notice) => self.handle_notice(&notice).await,
            Event::Request(request) => self.handle_request(&request).await,
        }
    }

    fn handle_connect(&self, self_id: i64) {
        self.self_id.store(self_id, Ordering::Release);
        info!(self_id, "Connected to gateway");
        if self.config.auto_timing_start {
            // detached: job loops outlive this call
            drop(self.start_timing());
        }
    }

    fn accepts(&self, msg: &MessageEvent) -> bool {
        match msg.scope {
            MessageScope::Group => self.config.accepts_group(msg.target_id()),
            MessageScope::Private => self.config.accepts_user(msg.actor_id),
        }
    }

    async fn handle_message(&self, msg: &MessageEvent) {
        if !self.accepts(msg) {
            return;
        }
        let tokens = self.parser.parse(&msg.raw_text);

        let hook = match msg.scope {
            MessageScope::Group => self.hooks.on_group_msg.as_ref(),
            MessageScope::Private => self.hooks.on_private_msg.as_ref(),
        };
        if let Some(hook) = hook {
            guarded("message hook", hook.call(msg, &tokens)).await;
        }

        if msg.scope == MessageScope::Group {
            self.route_mentions(msg, &tokens).await;
        }

        self.dispatch_command(msg, &tokens).await;
    }

    async fn route_mentions(&self, msg: &MessageEvent, tokens: &[Token]) {
        let own_id = self.self_id().map(|id| id.to_string());
        for token in tokens {
            let Some(target) = token.mention_target() else {
                continue;
            };
            let callbacks = &self.hooks.callbacks;
            if own_id.as_deref() == Some(target) {
                info!(sender = %msg.describe_sender(), "Bot mentioned");
                guarded("at_bot callback", callbacks.at_bot(msg, tokens, token)).await;
            } else {
                guarded("at callback", callbacks.at(msg, tokens, token)).await;
            }
        }
    }

    async fn dispatch_command(&self, msg: &MessageEvent, tokens: &[Token]) {
        let Some(invocation) = parse_command(&msg.raw_text, self.config.command_sign) else {
            return;
        };
        let Some(def) = self.table.get(&invocation.name) else {
            info!(command = %invocation.name, sender = %msg.describe_sender(), "Command not found");
            self.reply(msg, &format!("command {} not found", invocation.name))
                .await;
            return;
        };

        let verdict = self.gate.evaluate(def, msg).await;
        if verdict == Verdict::NotApplicable {
            debug!(command = %def.name, scope = %msg.scope, "Command not available in this scope");
            return;
        }
        info!(sender = %msg.describe_sender(), text = %msg.raw_text, "Command invoked");
        if let Verdict::Deny(reason) = verdict {
            warn!(command = %def.name, sender = %msg.describe_sender(), %reason, "Command denied");
            self.reply(msg, &reason.user_message(&def.name, msg)).await;
            return;
        }

        let ctx = CommandContext {
            api: &self.api,
            markup: self.parser.as_ref(),
            event: msg,
            tokens,
            target_id: msg.target_id(),
            table: &self.table,
            admins: self.gate.admins(),
        };
        let outcome = AssertUnwindSafe(def.handler.run(&ctx, &invocation.args))
            .catch_unwind()
            .await;
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(panic) => anyhow!("command handler panicked: {}", panic_message(panic.as_ref())),
        };
        error!(command = %def.name, sender = %msg.describe_sender(), error = ?err, "Command failed");
        self.reply(msg, &format!("command {} failed", def.name)).await;
    }

    async fn handle_notice(&self, notice: &NoticeEvent) {
        let Some(kind) = NoticeKind::lookup(&notice.notice_type, notice.sub_type.as_deref()) else {
            trace!(notice_type = %notice.notice_type, sub_type = ?notice.sub_type, "Unhandled notice");
            return;
        };
        guarded("notice callback", self.hooks.callbacks.notice(kind, notice)).await;
    }

    async fn handle_request(&self, request: &RequestEvent) {
        let Some(kind) = RequestKind::lookup(&request.request_type, request.sub_type.as_deref())
        else {
            trace!(request_type = %request.request_type, sub_type = ?request.sub_type, "Unhandled request");
            return;
        };
        guarded("request callback", self.hooks.callbacks.request(kind, request)).await;
    }

    /// Sends one of the dispatcher's own notices. They carry sender names and
    /// command names straight from the message, so they always go out escaped.
    async fn reply(&self, msg: &MessageEvent, text: &str) {
        if let Err(e) = self.api.reply(msg, &self.parser.escape(text)).await {
            warn!(error = %e, target = msg.target_id(), "Failed to send reply");
        }
    }
}

/// Runs a hook or callback, logging instead of propagating its failure.
async fn guarded(what: &str, fut: impl Future<Output = Result<()>>) {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = ?e, "{what} failed"),
        Err(panic) => warn!(panic = %panic_message(panic.as_ref()), "{what} panicked"),
    }
}
