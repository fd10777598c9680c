//! Command-line surface.

use std::sync::LazyLock;

use clap::{Args, Parser, Subcommand};
use regex::Regex;

use wormhole_common::ids::{ChannelId, GuildId, UserId, WormholeId};

#[derive(Debug, Parser)]
#[command(name = "wormhole", version, about = "Mirror messages between linked chat channels")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the relay bot and the health endpoint
    Run,

    /// Open a new wormhole
    Open {
        name: String,
        /// User who becomes the first admin
        #[arg(long = "as", value_parser = parse_user)]
        actor: UserId,
        /// Store the wormhole with thread syncing turned off
        #[arg(long)]
        no_sync_threads: bool,
    },

    /// Link or unlink channels
    #[command(subcommand)]
    Link(LinkCommand),

    /// Grant or revoke wormhole admin rights
    #[command(subcommand)]
    Admin(AdminCommand),

    /// List wormholes
    #[command(subcommand)]
    List(ListCommand),

    /// Show the admins of a wormhole
    Admins {
        wormhole: WormholeId,
    },
}

#[derive(Debug, Subcommand)]
pub enum LinkCommand {
    /// Link a channel to a wormhole
    Add(LinkAddArgs),
    /// Remove a channel from a wormhole
    Remove {
        wormhole: WormholeId,
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        #[arg(long = "as", value_parser = parse_user)]
        actor: UserId,
    },
}

#[derive(Debug, Args)]
pub struct LinkAddArgs {
    pub wormhole: WormholeId,
    #[arg(value_parser = parse_channel)]
    pub channel: ChannelId,
    #[arg(long = "as", value_parser = parse_user)]
    pub actor: UserId,
    /// Only receive mirrored messages
    #[arg(long, conflicts_with = "write_only")]
    pub read_only: bool,
    /// Only send messages into the wormhole
    #[arg(long)]
    pub write_only: bool,
    /// Name of the channel's delivery endpoint
    #[arg(long)]
    pub webhook_name: Option<String>,
    /// Avatar URL of the channel's delivery endpoint
    #[arg(long)]
    pub webhook_avatar: Option<String>,
    /// Check the actor's channel permissions on the platform first
    #[arg(long)]
    pub verify: bool,
}

impl LinkAddArgs {
    /// `(can_read, can_write)`
    pub fn access(&self) -> (bool, bool) {
        (!self.write_only, !self.read_only)
    }
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    Add {
        wormhole: WormholeId,
        #[arg(value_parser = parse_user)]
        user: UserId,
        #[arg(long = "as", value_parser = parse_user)]
        actor: UserId,
    },
    Remove {
        wormhole: WormholeId,
        #[arg(value_parser = parse_user)]
        user: UserId,
        #[arg(long = "as", value_parser = parse_user)]
        actor: UserId,
    },
}

#[derive(Debug, Subcommand)]
pub enum ListCommand {
    /// Wormholes a user administrates
    User {
        #[arg(value_parser = parse_user)]
        user: UserId,
    },
    /// Wormholes a channel is linked to
    Channel {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
    },
    /// Wormholes linked to any channel of a guild (needs the bot token)
    Guild { guild: GuildId },
    /// Every wormhole
    All,
}

// ── Mention parsing ──────────────────────────────────────────────────────────

static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:<#(\d+)>|(\d+))$").unwrap());

static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:<@!?(\d+)>|(\d+))$").unwrap());

fn snowflake(pattern: &Regex, raw: &str, what: &str) -> Result<u64, String> {
    pattern
        .captures(raw.trim())
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| format!("expected a {what} id or mention, got `{raw}`"))
}

/// Accepts `123` or `<#123>`.
pub fn parse_channel(raw: &str) -> Result<ChannelId, String> {
    snowflake(&CHANNEL_MENTION, raw, "channel").map(ChannelId)
}

/// Accepts `123`, `<@123>` or `<@!123>`.
pub fn parse_user(raw: &str) -> Result<UserId, String> {
    snowflake(&USER_MENTION, raw, "user").map(UserId)
}
