use core::time::Duration;
use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use bot_core::{ApiClient, JobAction, TimingJob};

use crate::config::TimingConfig;

/// Posts a fixed message to each target group.
pub struct Announcement {
    api: Arc<dyn ApiClient>,
    message: String,
}

impl core::fmt::Debug for Announcement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Announcement")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl JobAction for Announcement {
    async fn run(&self, target: i64) -> Result<()> {
        self.api.send_group_msg(target, &self.message).await
    }
}

pub fn build_jobs(timing: &BTreeMap<String, TimingConfig>, api: &Arc<dyn ApiClient>) -> Vec<TimingJob> {
    timing
        .iter()
        .map(|(name, cfg)| {
            let action = Arc::new(Announcement {
                api: Arc::clone(api),
                message: cfg.message.clone(),
            });
            TimingJob::new(name.clone(), Duration::from_secs(cfg.interval_secs), action)
                .with_bans(cfg.ban.iter().copied().collect())
        })
        .collect()
}
