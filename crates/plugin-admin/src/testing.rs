use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use bot_core::{
    AdminSet, ApiClient, Command, CommandContext, CommandDecl, CommandTable, DispatchConfig,
    MarkupParser, MessageEvent, MessageScope, SenderInfo, Token, parse_command,
};

#[derive(Default)]
struct Replies(Mutex<Vec<String>>);

#[async_trait]
impl ApiClient for Replies {
    async fn send_private_msg(&self, _user_id: i64, message: &str) -> Result<()> {
        self.0.lock().unwrap().push(message.to_owned());
        Ok(())
    }
    async fn send_group_msg(&self, _group_id: i64, message: &str) -> Result<()> {
        self.0.lock().unwrap().push(message.to_owned());
        Ok(())
    }
}

/// `@123` words are mentions; brackets are the only markup.
struct Brackets;

impl MarkupParser for Brackets {
    fn parse(&self, raw: &str) -> Vec<Token> {
        raw.split_whitespace()
            .map(|w| w.strip_prefix('@').map_or_else(|| Token::text(w), Token::at))
            .collect()
    }

    fn escape(&self, text: &str) -> String {
        text.replace('[', "&#91;").replace(']', "&#93;")
    }
}

pub fn table(commands: Vec<Arc<dyn Command>>) -> CommandTable {
    CommandTable::normalize(
        commands.into_iter().map(CommandDecl::from_command).collect(),
        &DispatchConfig::default(),
    )
}

/// Runs `command` for a `/...` message sent by user 1 in group 100 and
/// returns the replies.
pub async fn run(
    command: &dyn Command,
    table: &CommandTable,
    admins: &AdminSet,
    text: &str,
) -> Vec<String> {
    let replies = Arc::new(Replies::default());
    let api: Arc<dyn ApiClient> = replies.clone();
    let event = MessageEvent {
        scope: MessageScope::Group,
        message_id: 1,
        actor_id: 1,
        group_id: Some(100),
        raw_text: text.to_owned(),
        sender: SenderInfo::default(),
        anonymous: None,
    };
    let tokens = Brackets.parse(text);
    let ctx = CommandContext {
        api: &api,
        markup: &Brackets,
        event: &event,
        tokens: &tokens,
        target_id: event.target_id(),
        table,
        admins,
    };
    let args = parse_command(text, '/').map(|inv| inv.args).unwrap_or_default();
    command.run(&ctx, &args).await.unwrap();
    let sent = replies.0.lock().unwrap().clone();
    sent
}
