use anyhow::Result;
use async_trait::async_trait;

use bot_core::{Command, CommandContext, RawCommandDefinition, Scope, command::HelpSpec};

#[derive(Debug)]
pub struct Ping;

#[async_trait]
impl Command for Ping {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn defaults(&self) -> RawCommandDefinition {
        RawCommandDefinition {
            scope: Some(Scope::All),
            help: Some(HelpSpec::Line("{sign}ping - check the bot is alive".to_owned())),
            ..RawCommandDefinition::default()
        }
    }

    async fn run(&self, ctx: &CommandContext<'_>, _args: &[String]) -> Result<()> {
        ctx.reply("pong").await
    }
}
