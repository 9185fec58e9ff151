mod config;
mod db;
mod discord;
mod error;
mod media;
mod qq;
mod relay;
#[cfg(test)]
mod testing;
mod translate;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::Config;
use crate::db::DatabaseManager;
use crate::discord::DiscordRestClient;
use crate::media::{MediaFetcher, PassthroughTranscoder};
use crate::qq::{OneBotApi, OneBotHttpClient};
use crate::relay::{InboundEvent, Orchestrator, RelayContext, SelfDeleteSuppressor, webhooks};

/// Relays messages and deletions between Discord guild channels and QQ
/// groups.
#[derive(Parser)]
#[command(name = "dcqq-relay", version)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "DCQQ_RELAY_CONFIG", default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    utils::logging::init_tracing(&config.logging.level);

    let db = DatabaseManager::new(&config.database)
        .await
        .context("opening correlation database")?;
    db.migrate().await.context("running migrations")?;

    let discord = Arc::new(DiscordRestClient::new(&config.discord)?);
    let qq = Arc::new(OneBotHttpClient::new(&config.onebot)?);
    let media = Arc::new(MediaFetcher::new(config.discord.proxy.as_deref())?);

    let login = qq
        .get_login_info()
        .await
        .context("fetching OneBot login info")?;
    info!("connected to OneBot as {} ({})", login.nickname, login.user_id);

    let provisioned =
        webhooks::provision(&*discord, config.discord.application_id, &config.links).await;
    if !provisioned.failed_channels.is_empty() {
        error!(
            "{} channels have no webhook, group messages will not reach them: {:?}",
            provisioned.failed_channels.len(),
            provisioned.failed_channels
        );
    }

    let ctx = Arc::new(RelayContext {
        links: provisioned.links,
        store: db.message_links(),
        discord,
        qq,
        media,
        transcoder: Arc::new(PassthroughTranscoder),
        suppressor: SelfDeleteSuppressor::default(),
        unmatch_beginning: config.relay.unmatch_beginning.clone(),
        only_to_me: config.relay.only_to_me,
        cache_dir: config.relay.cache_dir(),
        qq_self_id: login.user_id,
    });
    let orchestrator = Arc::new(Orchestrator::new(ctx));

    // Gateway adapters hold the sender half and publish platform events;
    // keeping one here stops the loop from ending before they attach.
    let (gateway_tx, events) = mpsc::channel::<InboundEvent>(256);
    let relay_loop = tokio::spawn(run(orchestrator, events));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
        _ = relay_loop => {}
    }
    drop(gateway_tx);
    Ok(())
}

/// Dispatches each inbound event onto its own task so one slow translation
/// cannot stall the queue.
async fn run(orchestrator: Arc<Orchestrator>, mut events: mpsc::Receiver<InboundEvent>) {
    while let Some(event) = events.recv().await {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.handle_event(event).await;
        });
    }
}
