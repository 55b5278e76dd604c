use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const HELP_PLACEHOLDER: &str = "{commands}";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    #[serde(default = "default_sign")]
    pub command_sign: char,
    /// Groups the bot acts on. Empty means every group.
    #[serde(default)]
    pub group_ids: Vec<i64>,
    /// Users the bot answers in private. Empty means every user.
    #[serde(default)]
    pub user_ids: Vec<i64>,
    #[serde(default)]
    pub admins: Vec<i64>,
    #[serde(default = "enabled_true")]
    pub auto_timing_start: bool,
    #[serde(default = "default_help_template")]
    pub help_template: String,
}

const fn default_sign() -> char {
    '/'
}

const fn enabled_true() -> bool {
    true
}

fn default_help_template() -> String {
    format!("Bot help\n{HELP_PLACEHOLDER}")
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            command_sign: default_sign(),
            group_ids: Vec::new(),
            user_ids: Vec::new(),
            admins: Vec::new(),
            auto_timing_start: true,
            help_template: default_help_template(),
        }
    }
}

impl DispatchConfig {
    /// Rejects settings the dispatcher cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error if the command sign is whitespace or the help
    /// template has no `{commands}` placeholder.
    pub fn validate(&self) -> Result<()> {
        if self.command_sign.is_whitespace() {
            bail!("command_sign must not be whitespace");
        }
        if !self.help_template.contains(HELP_PLACEHOLDER) {
            bail!("help_template must contain {HELP_PLACEHOLDER}");
        }
        Ok(())
    }

    #[must_use]
    pub fn accepts_group(&self, group_id: i64) -> bool {
        self.group_ids.is_empty() || self.group_ids.contains(&group_id)
    }

    #[must_use]
    pub fn accepts_user(&self, user_id: i64) -> bool {
        self.user_ids.is_empty() || self.user_ids.contains(&user_id)
    }

    #[must_use]
    pub fn render_help(&self, commands: &str) -> String {
        self.help_template.replace(HELP_PLACEHOLDER, commands)
    }
}
