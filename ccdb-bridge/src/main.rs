use std::sync::Arc;

use anyhow::Result;
use serenity::all::{Client, GatewayIntents};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ccdb_bridge::config::Settings;
use ccdb_bridge::db;
use ccdb_bridge::handler::Bridge;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Arc::new(Settings::from_env()?);

    std::fs::create_dir_all("data")?;
    let sessions_pool = db::connect("data/sessions.db").await?;
    db::init_sessions_db(&sessions_pool).await?;
    let tasks_pool = db::connect("data/tasks.db").await?;
    db::init_tasks_db(&tasks_pool).await?;

    let handler = Bridge::new(settings.clone(), sessions_pool, tasks_pool);

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&settings.discord.token, intents)
        .event_handler(handler)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting Discord client");
    client.start().await?;

    Ok(())
}
