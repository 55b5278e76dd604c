mod callbacks;
mod commands;
mod config;
mod jobs;
mod logging;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use bot_core::{ApiClient, Dispatcher, GroupModeration, Hooks, MessageHook, TimingScheduler};
use clap::Parser;
use gateway::{CqCodeParser, EventSourceConfig, HttpApi, run_event_source};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::{callbacks::BotCallbacks, config::load_config, logging::init_tracing};

#[derive(Parser, Debug)]
#[command(
    name = "cq-bot",
    version,
    about = "Command bot for OneBot v11 gateways"
)]
struct Args {
    /// Path to the YAML config
    #[arg(long, env = "BOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Gateway access token; overrides the one in the config
    #[arg(long, env = "ONEBOT_ACCESS_TOKEN")]
    access_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(token) = args.access_token.filter(|t| !t.trim().is_empty()) {
        config.gateway.access_token = Some(token);
    }

    let http = Arc::new(
        HttpApi::new(&config.gateway.http_url, config.gateway.access_token.clone())
            .context("building gateway api client")?,
    );
    let api: Arc<dyn ApiClient> = Arc::clone(&http) as Arc<dyn ApiClient>;
    let moderation: Arc<dyn GroupModeration> = Arc::clone(&http) as Arc<dyn GroupModeration>;

    // the gateway may come up later; the connect event still reports the id
    match http.get_login_info().await {
        Ok(login) => info!(user_id = login.user_id, nickname = %login.nickname, "Gateway account"),
        Err(e) => warn!(error = %e, "Could not query the gateway account"),
    }

    let table = commands::build_table(
        commands::builtin_commands(moderation),
        &config.commands,
        &config.dispatch,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let jobs = jobs::build_jobs(&config.timing, &api);
    info!(jobs = jobs.len(), "Timing jobs configured");
    let scheduler = TimingScheduler::new(jobs, config.dispatch.group_ids.clone(), shutdown_rx.clone());

    let log_hook: Arc<dyn MessageHook> = Arc::new(callbacks::LogMessages);
    let hooks = Hooks {
        on_group_msg: Some(Arc::clone(&log_hook)),
        on_private_msg: Some(log_hook),
        callbacks: Arc::new(BotCallbacks::new(http, config.requests)),
    };

    let dispatcher = Dispatcher::new(config.dispatch, table, api, Arc::new(CqCodeParser))?
        .with_hooks(hooks)
        .with_scheduler(scheduler);

    let (events_tx, mut events_rx) = mpsc::channel(256);
    let source = tokio::spawn(run_event_source(
        EventSourceConfig {
            url: config.gateway.ws_url.clone(),
            access_token: config.gateway.access_token.clone(),
            reconnect_delay: config.gateway.reconnect_delay(),
        },
        events_tx,
        shutdown_rx,
    ));

    info!(ws = %config.gateway.ws_url, http = %config.gateway.http_url, "Bot starting");
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else {
                    warn!("Event source stopped");
                    break;
                };
                dispatcher.handle(event).await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for ctrl-c");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    // job loops and the event source both watch this flag
    let _ = shutdown_tx.send(true);
    drop(events_rx);
    if let Err(e) = source.await {
        warn!(error = %e, "Event source task failed");
    }
    Ok(())
}
