use core::fmt;
use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    api::{ApiClient, MarkupParser, Token},
    config::DispatchConfig,
    event::{MessageEvent, MessageScope},
    ids::{AdminSet, BanList},
};

/// Which message scopes a command answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Private,
    #[default]
    Group,
    All,
}

impl Scope {
    #[must_use]
    pub const fn matches(self, scope: MessageScope) -> bool {
        matches!(
            (self, scope),
            (Self::All, _)
                | (Self::Private, MessageScope::Private)
                | (Self::Group, MessageScope::Group)
        )
    }
}

pub const ROLE_ALL: &str = "all";
pub const ROLE_ANONYMOUS: &str = "anonymous";

/// Sender roles allowed to run a command in a group.
///
/// `all` anywhere in the configured list means no restriction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowedRoles {
    #[default]
    All,
    Only(Vec<String>),
}

impl AllowedRoles {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles: Vec<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if roles.is_empty() || roles.iter().any(|r| r == ROLE_ALL) {
            Self::All
        } else {
            Self::Only(roles)
        }
    }

    #[must_use]
    pub fn allows(&self, role: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(roles) => roles.iter().any(|r| r.eq_ignore_ascii_case(role)),
        }
    }

    #[must_use]
    pub fn as_tokens(&self) -> Vec<String> {
        match self {
            Self::All => vec![ROLE_ALL.to_owned()],
            Self::Only(roles) => roles.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RoleSpec {
    Joined(String),
    List(Vec<String>),
}

impl RoleSpec {
    fn into_roles(self) -> AllowedRoles {
        match self {
            Self::Joined(joined) => AllowedRoles::from_tokens(joined.split(',')),
            Self::List(list) => AllowedRoles::from_tokens(list),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HelpSpec {
    Line(String),
    Lines(Vec<String>),
}

impl HelpSpec {
    fn into_lines(self) -> Vec<String> {
        match self {
            Self::Line(line) => vec![line],
            Self::Lines(lines) => lines,
        }
    }
}

/// A command definition as authored: every field may be left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawCommandDefinition {
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub admin: Option<bool>,
    #[serde(default)]
    pub roles: Option<RoleSpec>,
    #[serde(default)]
    pub ban: Option<Vec<i64>>,
    #[serde(default)]
    pub help: Option<HelpSpec>,
}

impl RawCommandDefinition {
    /// Fields set in `overrides` win over ours.
    #[must_use]
    pub fn overlay(self, overrides: Self) -> Self {
        Self {
            scope: overrides.scope.or(self.scope),
            admin: overrides.admin.or(self.admin),
            roles: overrides.roles.or(self.roles),
            ban: overrides.ban.or(self.ban),
            help: overrides.help.or(self.help),
        }
    }
}

/// Everything a handler gets to see about one invocation.
pub struct CommandContext<'a> {
    pub api: &'a Arc<dyn ApiClient>,
    pub markup: &'a dyn MarkupParser,
    pub event: &'a MessageEvent,
    pub tokens: &'a [Token],
    pub target_id: i64,
    pub table: &'a CommandTable,
    pub admins: &'a AdminSet,
}

impl fmt::Debug for CommandContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("event", self.event)
            .field("tokens", &self.tokens)
            .field("target_id", &self.target_id)
            .finish_non_exhaustive()
    }
}

impl CommandContext<'_> {
    /// Reply on the conversation that triggered the command. The text is sent
    /// as markup; run user-supplied parts through [`Self::escape`] first.
    ///
    /// # Errors
    ///
    /// Propagates the api client's send error.
    pub async fn reply(&self, text: impl Into<String> + Send) -> Result<()> {
        self.api.reply(self.event, &text.into()).await
    }

    /// Makes `text` render literally in a reply.
    #[must_use]
    pub fn escape(&self, text: &str) -> String {
        self.markup.escape(text)
    }

    /// The first user the message mentions, if any.
    #[must_use]
    pub fn first_mention(&self) -> Option<i64> {
        self.tokens
            .iter()
            .find_map(Token::mention_target)
            .and_then(|qq| qq.parse().ok())
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    /// Built-in settings; config overrides are laid on top.
    fn defaults(&self) -> RawCommandDefinition {
        RawCommandDefinition::default()
    }

    async fn run(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<()>;
}

/// A command waiting to be normalized into the table.
pub struct CommandDecl {
    pub name: String,
    pub raw: RawCommandDefinition,
    pub handler: Arc<dyn Command>,
}

impl fmt::Debug for CommandDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDecl")
            .field("name", &self.name)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

impl CommandDecl {
    #[must_use]
    pub fn from_command(handler: Arc<dyn Command>) -> Self {
        Self {
            name: handler.name().to_owned(),
            raw: handler.defaults(),
            handler,
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: RawCommandDefinition) -> Self {
        self.raw = self.raw.overlay(overrides);
        self
    }
}

/// A fully populated command. Only `ban_targets` changes after construction.
#[derive(Clone)]
pub struct CommandDefinition {
    pub name: String,
    pub scope: Scope,
    pub requires_admin: bool,
    pub allowed_roles: AllowedRoles,
    pub ban_targets: BanList,
    pub help_lines: Vec<String>,
    pub handler: Arc<dyn Command>,
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("requires_admin", &self.requires_admin)
            .field("allowed_roles", &self.allowed_roles)
            .field("help_lines", &self.help_lines)
            .finish_non_exhaustive()
    }
}

pub const SIGN_PLACEHOLDER: &str = "{sign}";

impl CommandDefinition {
    fn normalize(
        name: String,
        raw: RawCommandDefinition,
        handler: Arc<dyn Command>,
        sign: char,
    ) -> Self {
        let sign = sign.to_string();
        Self {
            name,
            scope: raw.scope.unwrap_or_default(),
            requires_admin: raw.admin.unwrap_or(false),
            allowed_roles: raw.roles.map(RoleSpec::into_roles).unwrap_or_default(),
            ban_targets: raw.ban.unwrap_or_default().into_iter().collect(),
            help_lines: raw
                .help
                .map(HelpSpec::into_lines)
                .unwrap_or_default()
                .into_iter()
                .map(|line| line.replace(SIGN_PLACEHOLDER, &sign))
                .collect(),
            handler,
        }
    }
}

pub const HELP_COMMAND: &str = "help";

/// Replies with the aggregated help text of the table it is invoked from.
#[derive(Debug)]
struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        HELP_COMMAND
    }

    async fn run(&self, ctx: &CommandContext<'_>, _args: &[String]) -> Result<()> {
        ctx.reply(ctx.table.help_text()).await
    }
}

/// Normalized commands in declaration order.
#[derive(Clone, Default)]
pub struct CommandTable {
    entries: Vec<CommandDefinition>,
    by_name: HashMap<String, usize>,
    help_text: String,
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|def| &def.name))
            .finish()
    }
}

impl CommandTable {
    /// Fills in defaults for every declaration and injects the `help` command.
    ///
    /// A later declaration with the same name replaces the earlier one in
    /// place. A declared `help` is replaced by the built-in one.
    #[must_use]
    pub fn normalize(decls: Vec<CommandDecl>, config: &DispatchConfig) -> Self {
        let mut table = Self::default();
        for decl in decls {
            let def = CommandDefinition::normalize(
                decl.name,
                decl.raw,
                decl.handler,
                config.command_sign,
            );
            table.upsert(def);
        }

        let help = CommandDefinition::normalize(
            HELP_COMMAND.to_owned(),
            RawCommandDefinition {
                scope: Some(Scope::All),
                help: Some(HelpSpec::Line(format!(
                    "{SIGN_PLACEHOLDER}{HELP_COMMAND} - show this help"
                ))),
                ..RawCommandDefinition::default()
            },
            Arc::new(HelpCommand),
            config.command_sign,
        );
        table.upsert(help);

        let lines: Vec<&str> = table
            .entries
            .iter()
            .flat_map(|def| def.help_lines.iter().map(String::as_str))
            .collect();
        table.help_text = config.render_help(&lines.join("\n"));
        table
    }

    fn upsert(&mut self, def: CommandDefinition) {
        if let Some(&idx) = self.by_name.get(&def.name) {
            if def.name != HELP_COMMAND {
                warn!(command = %def.name, "Duplicate command declaration; keeping the last one");
            }
            self.entries[idx] = def;
        } else {
            self.by_name.insert(def.name.clone(), self.entries.len());
            self.entries.push(def);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.entries.iter()
    }

    #[must_use]
    pub fn help_text(&self) -> &str {
        &self.help_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str);

    #[async_trait]
    impl Command for Noop {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn run(&self, _ctx: &CommandContext<'_>, _args: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn decl(name: &'static str, raw: RawCommandDefinition) -> CommandDecl {
        CommandDecl {
            name: name.to_owned(),
            raw,
            handler: Arc::new(Noop(name)),
        }
    }

    #[tokio::test]
    async fn missing_fields_get_defaults() {
        let table = CommandTable::normalize(
            vec![decl("bare", RawCommandDefinition::default())],
            &DispatchConfig::default(),
        );
        let bare = table.get("bare").unwrap();
        assert_eq!(bare.scope, Scope::Group);
        assert!(!bare.requires_admin);
        assert_eq!(bare.allowed_roles, AllowedRoles::All);
        assert!(bare.ban_targets.snapshot().await.is_empty());
        assert!(bare.help_lines.is_empty());
    }

    #[test]
    fn comma_roles_are_split() {
        let raw: RawCommandDefinition =
            serde_yaml::from_str("roles: 'owner, admin'\nhelp: '/x - does x'").unwrap();
        let table = CommandTable::normalize(vec![decl("x", raw)], &DispatchConfig::default());
        let x = table.get("x").unwrap();
        assert_eq!(
            x.allowed_roles,
            AllowedRoles::Only(vec!["owner".to_owned(), "admin".to_owned()])
        );
        assert!(x.allowed_roles.allows("Admin"));
        assert!(!x.allowed_roles.allows("member"));
        assert_eq!(x.help_lines, vec!["/x - does x".to_owned()]);
    }

    #[test]
    fn all_sentinel_wins_anywhere_in_list() {
        assert_eq!(
            AllowedRoles::from_tokens(["owner", "all"]),
            AllowedRoles::All
        );
        assert_eq!(AllowedRoles::from_tokens([""]), AllowedRoles::All);
    }

    #[test]
    fn help_is_injected_last_and_aggregates_in_order() {
        let table = CommandTable::normalize(
            vec![
                decl(
                    "ping",
                    RawCommandDefinition {
                        help: Some(HelpSpec::Line("/ping - pong".to_owned())),
                        ..RawCommandDefinition::default()
                    },
                ),
                decl(
                    "echo",
                    RawCommandDefinition {
                        help: Some(HelpSpec::Lines(vec![
                            "/echo <text>".to_owned(),
                            "  repeats text".to_owned(),
                        ])),
                        ..RawCommandDefinition::default()
                    },
                ),
            ],
            &DispatchConfig::default(),
        );
        let names: Vec<&str> = table.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["ping", "echo", "help"]);
        assert_eq!(table.get("help").unwrap().scope, Scope::All);
        assert_eq!(
            table.help_text(),
            "Bot help\n/ping - pong\n/echo <text>\n  repeats text\n/help - show this help"
        );
    }

    #[test]
    fn declared_help_is_replaced_in_place() {
        let table = CommandTable::normalize(
            vec![
                decl("help", RawCommandDefinition::default()),
                decl("ping", RawCommandDefinition::default()),
            ],
            &DispatchConfig {
                command_sign: '!',
                ..DispatchConfig::default()
            },
        );
        let names: Vec<&str> = table.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["help", "ping"]);
        assert_eq!(
            table.get("help").unwrap().help_lines,
            vec!["!help - show this help".to_owned()]
        );
    }

    #[test]
    fn sign_placeholder_follows_config() {
        let raw = RawCommandDefinition {
            help: Some(HelpSpec::Line("{sign}ping - pong".to_owned())),
            ..RawCommandDefinition::default()
        };
        let config = DispatchConfig {
            command_sign: '#',
            ..DispatchConfig::default()
        };
        let table = CommandTable::normalize(vec![decl("ping", raw)], &config);
        assert_eq!(
            table.get("ping").unwrap().help_lines,
            vec!["#ping - pong".to_owned()]
        );
    }

    #[test]
    fn overlay_prefers_overrides() {
        let base = RawCommandDefinition {
            scope: Some(Scope::All),
            admin: Some(false),
            ..RawCommandDefinition::default()
        };
        let merged = base.overlay(RawCommandDefinition {
            admin: Some(true),
            ban: Some(vec![5]),
            ..RawCommandDefinition::default()
        });
        assert_eq!(merged.scope, Some(Scope::All));
        assert_eq!(merged.admin, Some(true));
        assert_eq!(merged.ban, Some(vec![5]));
    }

    #[test]
    fn scope_matching() {
        assert!(Scope::All.matches(MessageScope::Private));
        assert!(Scope::Group.matches(MessageScope::Group));
        assert!(!Scope::Private.matches(MessageScope::Group));
        assert!(!Scope::Group.matches(MessageScope::Private));
    }
}
