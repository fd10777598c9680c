//! # Wormhole
//!
//! Main binary. `wormhole run` connects to the platform gateway and relays
//! messages between linked channels while serving a health endpoint; the
//! other subcommands manage wormholes, links and admins directly in storage.

mod cli;
mod health;
mod relay;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use wormhole_common::config::AppConfig;
use wormhole_common::error::WormholeError;
use wormhole_common::ids::ChannelId;
use wormhole_common::models::OpenWormholeRequest;
use wormhole_db::Database;
use wormhole_gateway::{EventTranslator, GatewayClient, RestTransport};
use wormhole_relay::transport::Transport;
use wormhole_relay::{Actor, LinkRequest, RelayEngine, SuppressionCache, WormholeAdmin};

use crate::cli::{AdminCommand, Cli, Command, LinkAddArgs, LinkCommand, ListCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = wormhole_common::config::init()?;

    init_tracing(config);

    // Connect and migrate
    let db = Database::connect(config).await?;
    db.migrate().await?;

    match cli.command {
        Command::Run => run(config, db).await,
        command => {
            let admin = WormholeAdmin::new(db, config.limits.clone());
            match manage(config, &admin, command).await {
                Ok(()) => Ok(()),
                Err(e) if is_user_error(&e) => {
                    eprintln!("error: {e:#}");
                    std::process::exit(2);
                }
                Err(e) => Err(e),
            }
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wormhole=debug,tower_http=debug".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn is_user_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<WormholeError>()
        .is_some_and(WormholeError::is_user_facing)
}

// ── Relay bot ────────────────────────────────────────────────────────────────

async fn run(config: &'static AppConfig, db: Database) -> anyhow::Result<()> {
    if config.platform.token.is_empty() {
        anyhow::bail!("platform.token is not set (WORMHOLE__PLATFORM__TOKEN)");
    }

    tracing::info!("🌀 Starting Wormhole v{}", env!("CARGO_PKG_VERSION"));

    let transport: Arc<dyn Transport> = Arc::new(RestTransport::new(&config.platform)?);
    let suppression = SuppressionCache::new(config.relay.suppression_delay());
    let engine = Arc::new(RelayEngine::new(
        db.clone(),
        transport,
        suppression,
        &config.relay,
        &config.platform.web_url,
    ));

    let gateway = GatewayClient::new(&config.platform.token, &config.platform.gateway_url);
    let translator =
        EventTranslator::new(&config.platform.cdn_url, config.platform.message_cache_size);

    let health_addr = SocketAddr::new(config.health.host.parse()?, config.health.port);
    let health_router = health::router(db);
    tracing::info!("🩺 Health endpoint listening on http://{health_addr}/health");

    tokio::try_join!(
        relay::run(engine, gateway, translator),
        async {
            let listener = tokio::net::TcpListener::bind(health_addr).await?;
            axum::serve(listener, health_router).await?;
            Ok::<_, anyhow::Error>(())
        },
    )?;

    Ok(())
}

// ── Management ───────────────────────────────────────────────────────────────

async fn manage(config: &AppConfig, admin: &WormholeAdmin, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run => anyhow::bail!("`run` is not a management command"),
        Command::Open {
            name,
            actor,
            no_sync_threads,
        } => {
            let request = OpenWormholeRequest {
                name,
                sync_threads: !no_sync_threads,
            };
            let wormhole = admin.open(actor, request).await?;
            println!("Opened {wormhole}");
        }
        Command::Link(LinkCommand::Add(args)) => {
            let actor = link_actor(config, &args).await?;
            let (can_read, can_write) = args.access();
            let request = LinkRequest {
                can_read,
                can_write,
                webhook_name: args.webhook_name,
                webhook_avatar: args.webhook_avatar,
                ..LinkRequest::new(args.wormhole, args.channel)
            };
            let link = admin.add_link(&actor, request).await?;
            println!(
                "Linked <#{}> to wormhole {} (read: {}, write: {})",
                link.channel_id, link.wormhole_id, link.can_read, link.can_write
            );
        }
        Command::Link(LinkCommand::Remove {
            wormhole,
            channel,
            actor,
        }) => {
            admin.remove_link(&Actor::operator(actor), wormhole, channel).await?;
            println!("Unlinked <#{channel}> from wormhole {wormhole}");
        }
        Command::Admin(AdminCommand::Add {
            wormhole,
            user,
            actor,
        }) => {
            admin.add_admin(actor, wormhole, user).await?;
            println!("<@{user}> now administrates wormhole {wormhole}");
        }
        Command::Admin(AdminCommand::Remove {
            wormhole,
            user,
            actor,
        }) => {
            admin.remove_admin(actor, wormhole, user).await?;
            println!("<@{user}> no longer administrates wormhole {wormhole}");
        }
        Command::List(list) => {
            let wormholes = match list {
                ListCommand::User { user } => admin.list_accessible_by(user).await?,
                ListCommand::Channel { channel } => admin.list_linked_to(channel).await?,
                ListCommand::Guild { guild } => {
                    let transport = platform(config)?;
                    let channels: Vec<ChannelId> = transport
                        .rest()
                        .guild_channels(guild)
                        .await?
                        .into_iter()
                        .map(|c| c.id)
                        .collect();
                    admin.list_linked_in_guild(&channels).await?
                }
                ListCommand::All => admin.list_all().await?,
            };
            let summaries = admin.summarize(wormholes).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Command::Admins { wormhole } => {
            let admins = admin.admins(wormhole).await?;
            println!("{}", serde_json::to_string_pretty(&admins)?);
        }
    }
    Ok(())
}

fn platform(config: &AppConfig) -> anyhow::Result<RestTransport> {
    if config.platform.token.is_empty() {
        anyhow::bail!("platform.token is required for this command");
    }
    RestTransport::new(&config.platform).context("building platform client")
}

/// With `--verify`, the actor's channel permissions are checked on the
/// platform; otherwise the operator is trusted.
async fn link_actor(config: &AppConfig, args: &LinkAddArgs) -> anyhow::Result<Actor> {
    if !args.verify {
        return Ok(Actor::operator(args.actor));
    }
    let transport = platform(config)?;
    let permissions = transport
        .member_permissions(args.channel, args.actor)
        .await
        .map_err(WormholeError::from)?;
    Ok(Actor::member(args.actor, permissions))
}
