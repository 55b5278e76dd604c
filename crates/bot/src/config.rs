use core::time::Duration;
use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context as _, Result, anyhow, bail};
use bot_core::{DispatchConfig, RawCommandDefinition};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Per-command overrides, laid over each command's own defaults.
    #[serde(default)]
    pub commands: BTreeMap<String, RawCommandDefinition>,
    /// Announcement jobs, keyed by job name.
    #[serde(default)]
    pub timing: BTreeMap<String, TimingConfig>,
    #[serde(default)]
    pub requests: RequestPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Event socket, e.g. `ws://127.0.0.1:8080`.
    pub ws_url: String,
    /// Api base, e.g. `http://127.0.0.1:5700`.
    pub http_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

const fn default_reconnect_secs() -> u64 {
    5
}

impl GatewayConfig {
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    pub interval_secs: u64,
    pub message: String,
    /// Groups this job must never post to.
    #[serde(default)]
    pub ban: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct RequestPolicy {
    #[serde(default)]
    pub approve_friends: bool,
    #[serde(default)]
    pub approve_group_invites: bool,
}

pub fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "config file not found at {}. Create one or set --config",
            path.display()
        ));
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    let cfg: BotConfig = serde_yaml::from_str(&yaml).context("parsing YAML config")?;
    cfg.dispatch.validate()?;
    for (name, job) in &cfg.timing {
        if job.message.trim().is_empty() {
            bail!("timing job {name} has an empty message");
        }
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use bot_core::Scope;
    use tempfile::NamedTempFile;

    use super::*;

    fn write(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn full_config_parses() {
        let file = write(
            r"
gateway:
  ws_url: ws://127.0.0.1:8080
  http_url: http://127.0.0.1:5700
  access_token: secret
dispatch:
  command_sign: '#'
  group_ids: [100, 200]
  admins: [1]
commands:
  echo:
    scope: group
    roles: owner, admin
    ban: [200]
timing:
  morning:
    interval_secs: 3600
    message: good morning
    ban: [100]
requests:
  approve_friends: true
",
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.gateway.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(cfg.gateway.access_token.as_deref(), Some("secret"));
        assert_eq!(cfg.dispatch.command_sign, '#');
        assert_eq!(cfg.dispatch.group_ids, vec![100, 200]);
        assert_eq!(cfg.commands["echo"].scope, Some(Scope::Group));
        assert_eq!(cfg.timing["morning"].ban, vec![100]);
        assert!(cfg.requests.approve_friends);
        assert!(!cfg.requests.approve_group_invites);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let file = write("gateway: {ws_url: 'ws://x', http_url: 'http://x'}\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.dispatch, DispatchConfig::default());
        assert!(cfg.commands.is_empty());
        assert!(cfg.timing.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write("gateway: {ws_url: 'ws://x', http_url: 'http://x', port: 1}\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn invalid_dispatch_settings_are_rejected() {
        let file = write(
            "gateway: {ws_url: 'ws://x', http_url: 'http://x'}\ndispatch: {help_template: 'no list'}\n",
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
