use core::{fmt, time::Duration};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bot_core::{
    Command, CommandContext, GroupModeration, RawCommandDefinition, Scope, command::HelpSpec,
};

const USAGE: &str = "usage: group mute <user> [minutes] | muteall on|off | admin <user> on|off \
                     | card <user> [card] | title <user> [title] | name <name> | leave";

const DEFAULT_MUTE_MINUTES: u64 = 30;

/// `group <action> ...`: moderation of the group the command is sent in.
/// A `<user>` is a numeric id or a mention anywhere in the message.
pub struct GroupAdmin {
    moderation: Arc<dyn GroupModeration>,
}

impl fmt::Debug for GroupAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupAdmin").finish_non_exhaustive()
    }
}

impl GroupAdmin {
    #[must_use]
    pub fn new(moderation: Arc<dyn GroupModeration>) -> Self {
        Self { moderation }
    }
}

fn user(ctx: &CommandContext<'_>, arg: Option<&String>) -> Option<i64> {
    arg.and_then(|raw| raw.parse().ok())
        .or_else(|| ctx.first_mention())
}

fn switch(arg: Option<&String>) -> Option<bool> {
    match arg.map(String::as_str) {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    }
}

/// Remaining arguments joined back into free text.
fn rest(args: &[String], from: usize) -> String {
    args.get(from..).unwrap_or_default().join(" ")
}

#[async_trait]
impl Command for GroupAdmin {
    fn name(&self) -> &'static str {
        "group"
    }

    fn defaults(&self) -> RawCommandDefinition {
        RawCommandDefinition {
            scope: Some(Scope::Group),
            admin: Some(true),
            help: Some(HelpSpec::Lines(vec![
                "{sign}group mute <user> [minutes] - mute a member (0 lifts it)".to_owned(),
                "{sign}group muteall on|off - mute the whole group".to_owned(),
                "{sign}group admin <user> on|off - grant or revoke group admin".to_owned(),
                "{sign}group card|title <user> [text] - set a member's card or title".to_owned(),
                "{sign}group name <name> | leave - rename or leave the group".to_owned(),
            ])),
            ..RawCommandDefinition::default()
        }
    }

    async fn run(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<()> {
        let Some(group) = ctx.event.group_id else {
            return ctx.reply("group commands only work in groups").await;
        };
        let m = &self.moderation;
        match args.first().map(String::as_str) {
            Some("mute") => {
                let Some(user) = user(ctx, args.get(1)) else {
                    return ctx.reply(USAGE).await;
                };
                if ctx.admins.contains(user).await {
                    return ctx.reply(format!("{user} is a bot admin and cannot be muted")).await;
                }
                let minutes = match args.get(2).map(|raw| raw.parse::<u64>()) {
                    None => DEFAULT_MUTE_MINUTES,
                    Some(Ok(minutes)) => minutes,
                    Some(Err(_)) => return ctx.reply(USAGE).await,
                };
                m.set_group_ban(group, user, Duration::from_secs(minutes.saturating_mul(60)))
                    .await?;
                if minutes == 0 {
                    ctx.reply(format!("unmuted {user}")).await
                } else {
                    ctx.reply(format!("muted {user} for {minutes} minutes")).await
                }
            }
            Some("muteall") => {
                let Some(enable) = switch(args.get(1)) else {
                    return ctx.reply(USAGE).await;
                };
                m.set_group_whole_ban(group, enable).await?;
                ctx.reply(if enable { "group muted" } else { "group unmuted" })
                    .await
            }
            Some("admin") => {
                let (Some(user), Some(enable)) = (user(ctx, args.get(1)), switch(args.get(2)))
                else {
                    return ctx.reply(USAGE).await;
                };
                m.set_group_admin(group, user, enable).await?;
                ctx.reply(format!(
                    "{user} is {} a group admin",
                    if enable { "now" } else { "no longer" }
                ))
                .await
            }
            Some(field @ ("card" | "title")) => {
                let Some(user) = user(ctx, args.get(1)) else {
                    return ctx.reply(USAGE).await;
                };
                let text = rest(args, 2);
                if field == "card" {
                    m.set_group_card(group, user, &text).await?;
                } else {
                    m.set_group_special_title(group, user, &text).await?;
                }
                ctx.reply(format!("{field} updated for {user}")).await
            }
            Some("name") => {
                let name = rest(args, 1);
                if name.is_empty() {
                    return ctx.reply(USAGE).await;
                }
                m.set_group_name(group, &name).await?;
                ctx.reply(format!("group renamed to {}", ctx.escape(&name)))
                    .await
            }
            Some("leave") => {
                ctx.reply("leaving the group").await?;
                m.set_group_leave(group, false).await
            }
            _ => ctx.reply(USAGE).await,
        }
    }
}
