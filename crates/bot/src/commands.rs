use std::{collections::BTreeMap, sync::Arc};

use bot_core::{
    Command, CommandDecl, CommandTable, DispatchConfig, GroupModeration, RawCommandDefinition,
};
use tracing::{info, warn};

/// Commands compiled into this binary.
pub fn builtin_commands(moderation: Arc<dyn GroupModeration>) -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(plugin_ping::Ping) as Arc<dyn Command>,
        Arc::new(plugin_echo::Echo),
        Arc::new(plugin_admin::Ban),
        Arc::new(plugin_admin::Unban),
        Arc::new(plugin_admin::Bans),
        Arc::new(plugin_admin::GroupAdmin::new(moderation)),
    ]
}

/// Lays config overrides over each command's defaults and normalizes the
/// result. Overrides naming no compiled-in command are logged and ignored.
pub fn build_table(
    commands: Vec<Arc<dyn Command>>,
    overrides: &BTreeMap<String, RawCommandDefinition>,
    dispatch: &DispatchConfig,
) -> CommandTable {
    for name in overrides.keys() {
        if !commands.iter().any(|c| c.name() == name.as_str()) {
            warn!(command = %name, "Override for unknown command ignored");
        }
    }

    let decls = commands
        .into_iter()
        .map(|command| {
            let decl = CommandDecl::from_command(command);
            match overrides.get(&decl.name) {
                Some(raw) => decl.with_overrides(raw.clone()),
                None => decl,
            }
        })
        .collect();
    let table = CommandTable::normalize(decls, dispatch);

    for def in table.iter() {
        info!(
            command = %format!("{}{}", dispatch.command_sign, def.name),
            scope = ?def.scope,
            admin = def.requires_admin,
            roles = ?def.allowed_roles.as_tokens(),
            "Registered command"
        );
    }
    table
}
