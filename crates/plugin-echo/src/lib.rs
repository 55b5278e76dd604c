use anyhow::Result;
use async_trait::async_trait;

use bot_core::{Command, CommandContext, RawCommandDefinition, Scope, command::HelpSpec};

#[derive(Debug)]
pub struct Echo;

#[async_trait]
impl Command for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn defaults(&self) -> RawCommandDefinition {
        RawCommandDefinition {
            scope: Some(Scope::All),
            help: Some(HelpSpec::Line("{sign}echo <text> - repeat text back".to_owned())),
            ..RawCommandDefinition::default()
        }
    }

    async fn run(&self, ctx: &CommandContext<'_>, args: &[String]) -> Result<()> {
        let out = args.join(" ");
        if out.is_empty() {
            ctx.reply("(nothing to echo)").await
        } else {
            ctx.reply(ctx.escape(&out)).await
        }
    }
}
