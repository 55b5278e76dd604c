use core::fmt;

use crate::{
    command::{CommandDefinition, ROLE_ANONYMOUS},
    event::{MessageEvent, MessageScope},
    ids::AdminSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Banned,
    RoleUnknown,
    RoleInsufficient,
    NotAdmin,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Banned => "banned",
            Self::RoleUnknown => "role-unknown",
            Self::RoleInsufficient => "role-insufficient",
            Self::NotAdmin => "not-admin",
        })
    }
}

impl DenyReason {
    /// Text sent back to whoever tried the command.
    #[must_use]
    pub fn user_message(self, command: &str, event: &MessageEvent) -> String {
        match self {
            Self::Banned => format!("command {command} is disabled here"),
            Self::RoleUnknown | Self::RoleInsufficient => format!(
                "{} lacks the role required for {command}",
                event.describe_sender()
            ),
            Self::NotAdmin => format!(
                "{} is not allowed to run {command}",
                event.describe_sender()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// The command does not answer in this message scope.
    NotApplicable,
    Deny(DenyReason),
}

/// Decides whether a sender may run a command. Rules apply in order, first
/// match wins: scope, ban, group role, admin.
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    admins: AdminSet,
}

impl PermissionGate {
    #[must_use]
    pub const fn new(admins: AdminSet) -> Self {
        Self { admins }
    }

    #[must_use]
    pub const fn admins(&self) -> &AdminSet {
        &self.admins
    }

    pub async fn evaluate(&self, def: &CommandDefinition, event: &MessageEvent) -> Verdict {
        if !def.scope.matches(event.scope) {
            return Verdict::NotApplicable;
        }
        if def.ban_targets.contains(event.target_id()).await {
            return Verdict::Deny(DenyReason::Banned);
        }
        if event.scope == MessageScope::Group {
            match event.sender.role.as_deref() {
                None if !def.allowed_roles.allows(ROLE_ANONYMOUS) => {
                    return Verdict::Deny(DenyReason::RoleUnknown);
                }
                Some(role) if !def.allowed_roles.allows(role) => {
                    return Verdict::Deny(DenyReason::RoleInsufficient);
                }
                None | Some(_) => {}
            }
        }
        if def.requires_admin && !self.admins.contains(event.actor_id).await {
            return Verdict::Deny(DenyReason::NotAdmin);
        }
        Verdict::Allow
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::{
        command::{AllowedRoles, Command, CommandContext, Scope},
        event::SenderInfo,
    };

    struct Noop;

    #[async_trait]
    impl Command for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }
        async fn run(&self, _ctx: &CommandContext<'_>, _args: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn def(scope: Scope, roles: AllowedRoles, admin: bool, ban: &[i64]) -> CommandDefinition {
        CommandDefinition {
            name: "noop".to_owned(),
            scope,
            requires_admin: admin,
            allowed_roles: roles,
            ban_targets: ban.iter().copied().collect(),
            help_lines: Vec::new(),
            handler: Arc::new(Noop),
        }
    }

    fn message(scope: MessageScope, role: Option<&str>) -> MessageEvent {
        MessageEvent {
            scope,
            message_id: 1,
            actor_id: 7,
            group_id: (scope == MessageScope::Group).then_some(100),
            raw_text: "/noop".to_owned(),
            sender: SenderInfo {
                nickname: "n".to_owned(),
                card: None,
                role: role.map(ToOwned::to_owned),
            },
            anonymous: None,
        }
    }

    fn only(roles: &[&str]) -> AllowedRoles {
        AllowedRoles::from_tokens(roles.iter().copied())
    }

    #[tokio::test]
    async fn scope_mismatch_is_not_applicable() {
        let gate = PermissionGate::default();
        let private_only = def(Scope::Private, AllowedRoles::All, false, &[]);
        assert_eq!(
            gate.evaluate(&private_only, &message(MessageScope::Group, Some("owner")))
                .await,
            Verdict::NotApplicable
        );
        assert_eq!(
            gate.evaluate(&private_only, &message(MessageScope::Private, None))
                .await,
            Verdict::Allow
        );
    }

    #[tokio::test]
    async fn ban_precedes_role_and_admin() {
        let gate = PermissionGate::new([7].into_iter().collect());
        let banned = def(Scope::All, only(&["owner"]), true, &[100]);
        assert_eq!(
            gate.evaluate(&banned, &message(MessageScope::Group, Some("owner")))
                .await,
            Verdict::Deny(DenyReason::Banned)
        );
        // private target is the actor
        let banned_user = def(Scope::All, AllowedRoles::All, false, &[7]);
        assert_eq!(
            gate.evaluate(&banned_user, &message(MessageScope::Private, None))
                .await,
            Verdict::Deny(DenyReason::Banned)
        );
    }

    #[tokio::test]
    async fn group_roles_are_checked() {
        let gate = PermissionGate::default();
        let owners = def(Scope::Group, only(&["owner", "admin"]), false, &[]);
        assert_eq!(
            gate.evaluate(&owners, &message(MessageScope::Group, Some("member")))
                .await,
            Verdict::Deny(DenyReason::RoleInsufficient)
        );
        assert_eq!(
            gate.evaluate(&owners, &message(MessageScope::Group, None)).await,
            Verdict::Deny(DenyReason::RoleUnknown)
        );
        assert_eq!(
            gate.evaluate(&owners, &message(MessageScope::Group, Some("admin")))
                .await,
            Verdict::Allow
        );

        let with_anon = def(Scope::Group, only(&["owner", "anonymous"]), false, &[]);
        assert_eq!(
            gate.evaluate(&with_anon, &message(MessageScope::Group, None))
                .await,
            Verdict::Allow
        );
    }

    #[tokio::test]
    async fn roles_ignored_in_private() {
        let gate = PermissionGate::default();
        let owners = def(Scope::All, only(&["owner"]), false, &[]);
        assert_eq!(
            gate.evaluate(&owners, &message(MessageScope::Private, None))
                .await,
            Verdict::Allow
        );
    }

    #[tokio::test]
    async fn admin_flag_requires_admin_set() {
        let admins = AdminSet::new();
        let gate = PermissionGate::new(admins.clone());
        let admin_only = def(Scope::All, AllowedRoles::All, true, &[]);
        let msg = message(MessageScope::Private, None);
        assert_eq!(
            gate.evaluate(&admin_only, &msg).await,
            Verdict::Deny(DenyReason::NotAdmin)
        );
        admins.insert(7).await;
        assert_eq!(gate.evaluate(&admin_only, &msg).await, Verdict::Allow);
    }

    #[test]
    fn deny_messages_name_the_command() {
        let msg = message(MessageScope::Group, Some("member"));
        assert_eq!(
            DenyReason::Banned.user_message("echo", &msg),
            "command echo is disabled here"
        );
        assert_eq!(
            DenyReason::NotAdmin.user_message("ban", &msg),
            "n (user=7, group=100) is not allowed to run ban"
        );
        assert_eq!(
            DenyReason::RoleInsufficient.user_message("kick", &msg),
            "n (user=7, group=100) lacks the role required for kick"
        );
        assert_eq!(
            DenyReason::RoleUnknown.user_message("kick", &msg),
            "n (user=7, group=100) lacks the role required for kick"
        );
    }
}
