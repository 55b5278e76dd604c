mod group;

use anyhow::Result;
use async_trait::async_trait;

use bot_core::{
    Command, CommandContext, CommandDefinition, RawCommandDefinition, Scope, command::HelpSpec,
    id_arg,
};

pub use group::GroupAdmin;

/// `ban <command> [target]`: disables a command for a target, defaulting to
/// the conversation it is sent from.
#[derive(Debug)]
pub struct Ban;

/// `unban <command> [target]`: undoes `ban`.
#[derive(Debug)]
pub struct Unban;

/// `bans <command>`: lists where a command is disabled.
#[derive(Debug)]
pub struct Bans;

fn admin_only(help: &str) -> RawCommandDefinition {
    RawCommandDefinition {
        scope: Some(Scope::All),
        admin: Some(true),
        help: Some(HelpSpec::Line(help.to_owned())),
        ..RawCommandDefinition::default()
    }
}

/// Looks up the command named by the first argument, replying if it fails.
async fn lookup<'a>(
    ctx: &'a CommandContext<'_>,
    args: &[String],
    usage: &str,
) -> Result<Option<&'a CommandDefinition>> {
    let Some(name) = args.first() else {
        ctx.reply(usage).await?;
        return Ok(None);
    };
    let def = ctx.table.get(name);
    if def.is_none() {
        ctx.reply(format!("no such command: {}", ctx.escape(name)))
            .await?;
    }
    Ok(def)
}

/// The target named by the second argument, or the current conversation.
/// Replies and returns `None` if it is not an id.
async fn target(ctx: &CommandContext<'_>, args: &[String]) -> Result<Option<i64>> {
    match id_arg(args.get(1).map(String::as_str), ctx.target_id) {
        Ok(target) => Ok(Some(target)),
        Err(e) => {
            ctx.reply(ctx.escape(&e.to_string())).await?;
            Ok(None)
        }
    }
}

#[async_trait]
impl Command for Ban {
    fn name(&self) -> &'static str {
        "ban"
    }

    fn defaults(&self) -> RawCommandDefinition {
        admin_only("{sign}ban <command> [target] - disable a command for a target")
    }

    async fn run(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<()> {
        let Some(def) = lookup(ctx, args, "usage: ban <command> [target]").await? else {
            return Ok(());
        };
        let Some(target) = target(ctx, args).await? else {
            return Ok(());
        };
        if def.ban_targets.insert(target).await {
            ctx.reply(format!("command {} disabled for {target}", def.name))
                .await
        } else {
            ctx.reply(format!("command {} already disabled for {target}", def.name))
                .await
        }
    }
}

#[async_trait]
impl Command for Unban {
    fn name(&self) -> &'static str {
        "unban"
    }

    fn defaults(&self) -> RawCommandDefinition {
        admin_only("{sign}unban <command> [target] - re-enable a command for a target")
    }

    async fn run(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<()> {
        let Some(def) = lookup(ctx, args, "usage: unban <command> [target]").await? else {
            return Ok(());
        };
        let Some(target) = target(ctx, args).await? else {
            return Ok(());
        };
        if def.ban_targets.remove(target).await {
            ctx.reply(format!("command {} enabled for {target}", def.name))
                .await
        } else {
            ctx.reply(format!("command {} was not disabled for {target}", def.name))
                .await
        }
    }
}

#[async_trait]
impl Command for Bans {
    fn name(&self) -> &'static str {
        "bans"
    }

    fn defaults(&self) -> RawCommandDefinition {
        admin_only("{sign}bans <command> - list where a command is disabled")
    }

    async fn run(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<()> {
        let Some(def) = lookup(ctx, args, "usage: bans <command>").await? else {
            return Ok(());
        };
        let banned = def.ban_targets.snapshot().await;
        if banned.is_empty() {
            return ctx
                .reply(format!("command {} is not disabled anywhere", def.name))
                .await;
        }
        let list = banned
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        ctx.reply(format!("command {} is disabled for: {list}", def.name))
            .await
    }
}

#[cfg(test)]
mod testing;
