use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

use guild_queue::{
    audio::{GuildId, Membership, MembershipResolver, PlaybackStarter, QueueEngine, Requester, UserId},
    config::Config,
    sources::DirectUrlResolver,
};

/// Treats every requester as a present member with no voice channel.
struct LocalMembership;

#[async_trait]
impl MembershipResolver for LocalMembership {
    async fn resolve(&self, guild: &GuildId, user: &UserId) -> Result<Membership> {
        Ok(Membership {
            guild_id: guild.clone(),
            user_id: user.clone(),
            display_name: user.to_string(),
            voice_channel: None,
        })
    }
}

/// Sin transporte de audio: solo registra el arranque.
struct LoggingStarter;

#[async_trait]
impl PlaybackStarter for LoggingStarter {
    async fn start(&self, guild: &GuildId, membership: &Membership) -> Result<()> {
        info!("🎵 Playback requested in guild {} by {}", guild, membership.display_name);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_queue=debug".parse()?),
        )
        .init();

    info!("🎵 Starting guild-queue v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let links: Vec<String> = std::env::args().skip(1).collect();
    if links.is_empty() {
        anyhow::bail!("Usage: guild-queue <link>...");
    }

    let resolver = Arc::new(DirectUrlResolver::new(&config)?);
    let engine = Arc::new(QueueEngine::new(
        &config,
        resolver,
        Arc::new(LocalMembership),
        Arc::new(LoggingStarter),
    ));

    let guild = GuildId::from(std::env::var("LOCAL_GUILD").unwrap_or_else(|_| "local".to_string()));
    let requester = Requester::new("cli", "command line");

    let watcher = tokio::spawn({
        let mut updates = engine.subscribe_guild(&guild).into_stream().boxed();
        async move {
            while let Some(event) = updates.next().await {
                match serde_json::to_string(&event) {
                    Ok(json) => info!("📣 {}", json),
                    Err(e) => warn!("Could not encode queue event: {}", e),
                }
            }
        }
    });

    let mut preparations = Vec::new();
    for link in &links {
        match engine.enqueue(&guild, link, requester.clone()).await {
            Ok(enqueued) => {
                info!("➕ {} at position {}", enqueued.metadata().title(), enqueued.position);
                preparations.push((link.clone(), enqueued.preparation));
            }
            Err(e) => error!("❌ {}", e),
        }
    }

    for (link, preparation) in preparations {
        if !preparation.await {
            warn!("⚠️ {} could not be prepared", link);
        }
    }

    for (position, item) in engine.list(&guild).iter().enumerate() {
        info!("{:>3}. {} ({})", position, item.title(), item.url());
    }

    engine.shutdown().await;

    // Al soltar el motor se cierra el canal y el watcher termina de vaciarlo
    drop(engine);
    if let Err(e) = watcher.await {
        warn!("Event watcher stopped abnormally: {}", e);
    }

    Ok(())
}
