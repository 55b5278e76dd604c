//! Event routing and command dispatch for a OneBot-style chat bot.

pub mod api;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod event;
pub mod hooks;
pub mod ids;
pub mod permission;
pub mod scheduler;

pub use api::{ApiClient, GroupModeration, MarkupParser, Token};
pub use command::{
    AllowedRoles, Command, CommandContext, CommandDecl, CommandDefinition, CommandTable,
    RawCommandDefinition, Scope,
};
pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, Invocation, parse_command};
pub use event::{
    Anonymous, Event, MessageEvent, MessageScope, NoticeEvent, NoticeKind, RequestEvent,
    RequestKind, SenderInfo,
};
pub use hooks::{EventCallbacks, Hooks, MessageHook, NoCallbacks};
pub use ids::{AdminSet, BanList, IdSet};
pub use permission::{DenyReason, PermissionGate, Verdict};
pub use scheduler::{
    JobAction, JobExit, JobObserver, LogObserver, TimingJob, TimingScheduler, stop_requested,
};

#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Parses an id argument, falling back to `default` when absent.
///
/// # Errors
///
/// Returns an error if the argument is present but not an integer.
pub fn id_arg(arg: Option<&str>, default: i64) -> anyhow::Result<i64> {
    arg.map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|_| anyhow::anyhow!("not a valid id: {raw}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_arg_defaults_and_rejects_garbage() {
        assert_eq!(id_arg(None, 5).unwrap(), 5);
        assert_eq!(id_arg(Some("42"), 5).unwrap(), 42);
        assert_eq!(
            id_arg(Some("abc"), 5).unwrap_err().to_string(),
            "not a valid id: abc"
        );
    }
}
