//! Wormhole management: opening wormholes, linking channels, and managing
//! admins. Every mutation checks that the acting user administrates the
//! wormhole; quotas and input validation live here too.

use serde::Serialize;

use wormhole_common::config::LimitsConfig;
use wormhole_common::error::{WormholeError, WormholeResult};
use wormhole_common::ids::{ChannelId, UserId, WormholeId};
use wormhole_common::models::{Admin, Link, LinkFilter, OpenWormholeRequest, Wormhole};
use wormhole_common::permissions::Permissions;
use wormhole_common::validation::{validate_link_access, validate_name, validate_request};
use wormhole_db::Database;
use wormhole_db::repository::{admins, wormholes};

use crate::link_graph::LinkGraph;

/// Who performs a management operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    /// The actor's permissions in the channel being linked, when known.
    /// `None` skips the channel permission check (operator tooling).
    pub channel_permissions: Option<Permissions>,
}

impl Actor {
    /// An actor whose channel permissions are not checked.
    pub fn operator(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_permissions: None,
        }
    }

    pub fn member(user_id: impl Into<UserId>, channel_permissions: Permissions) -> Self {
        Self {
            user_id: user_id.into(),
            channel_permissions: Some(channel_permissions),
        }
    }
}

/// Link a channel to a wormhole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    pub wormhole_id: WormholeId,
    pub channel_id: ChannelId,
    pub can_read: bool,
    pub can_write: bool,
    pub webhook_name: Option<String>,
    pub webhook_avatar: Option<String>,
}

impl LinkRequest {
    pub fn new(wormhole_id: impl Into<WormholeId>, channel_id: impl Into<ChannelId>) -> Self {
        Self {
            wormhole_id: wormhole_id.into(),
            channel_id: channel_id.into(),
            can_read: true,
            can_write: true,
            webhook_name: None,
            webhook_avatar: None,
        }
    }
}

/// A wormhole with its admins and links, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WormholeSummary {
    #[serde(flatten)]
    pub wormhole: Wormhole,
    pub admins: Vec<UserId>,
    pub links: Vec<Link>,
}

pub struct WormholeAdmin {
    db: Database,
    graph: LinkGraph,
    limits: LimitsConfig,
}

impl WormholeAdmin {
    pub fn new(db: Database, limits: LimitsConfig) -> Self {
        Self {
            graph: LinkGraph::new(db.clone()),
            db,
            limits,
        }
    }

    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    // ── Wormholes ────────────────────────────────────────────────────────────

    /// Open a wormhole. The creator becomes its first admin.
    pub async fn open(&self, creator: UserId, request: OpenWormholeRequest) -> WormholeResult<Wormhole> {
        validate_request(&request)?;
        validate_name(&request.name, self.limits.max_wormhole_name_length as usize)?;
        self.ensure_quota(creator).await?;

        let wormhole =
            wormholes::create_wormhole(&self.db.pool, request.name.trim(), request.sync_threads).await?;
        admins::insert_admin(&self.db.pool, wormhole.id, creator).await?;

        tracing::info!(wormhole_id = %wormhole.id, name = %wormhole.name, user_id = %creator, "Wormhole opened");
        Ok(wormhole)
    }

    pub async fn wormhole(&self, id: impl Into<WormholeId>) -> WormholeResult<Wormhole> {
        let id = id.into();
        wormholes::find_by_id(&self.db.pool, id)
            .await?
            .ok_or_else(|| WormholeError::not_found(format!("Wormhole {id}")))
    }

    pub async fn list_all(&self) -> WormholeResult<Vec<Wormhole>> {
        Ok(wormholes::list_all(&self.db.pool).await?)
    }

    pub async fn list_accessible_by(&self, user: impl Into<UserId>) -> WormholeResult<Vec<Wormhole>> {
        self.graph.wormholes_accessible_by(user).await
    }

    pub async fn list_linked_to(&self, channel: impl Into<ChannelId>) -> WormholeResult<Vec<Wormhole>> {
        self.graph.wormholes_linked_to(channel, LinkFilter::ANY).await
    }

    pub async fn list_linked_in_guild(&self, channels: &[ChannelId]) -> WormholeResult<Vec<Wormhole>> {
        self.graph.wormholes_linked_in_guild(channels).await
    }

    /// Attach admins and links to each wormhole.
    pub async fn summarize(&self, list: Vec<Wormhole>) -> WormholeResult<Vec<WormholeSummary>> {
        let mut summaries = Vec::with_capacity(list.len());
        for wormhole in list {
            let admins = self.admins(&wormhole).await?.into_iter().map(|a| a.user_id).collect();
            let links = self.graph.links_for_wormhole(&wormhole).await?;
            summaries.push(WormholeSummary {
                wormhole,
                admins,
                links,
            });
        }
        Ok(summaries)
    }

    // ── Links ────────────────────────────────────────────────────────────────

    pub async fn add_link(&self, actor: &Actor, request: LinkRequest) -> WormholeResult<Link> {
        let wormhole = self.wormhole(request.wormhole_id).await?;
        self.require_admin(&wormhole, actor.user_id).await?;
        require_channel_permissions(actor)?;
        validate_link_access(request.can_read, request.can_write)?;
        if let Some(name) = &request.webhook_name {
            validate_name(name, self.limits.max_wormhole_name_length as usize)?;
        }

        let link = Link {
            wormhole_id: wormhole.id,
            channel_id: request.channel_id,
            can_read: request.can_read,
            can_write: request.can_write,
            webhook_name: request.webhook_name,
            webhook_avatar: request.webhook_avatar,
        };
        let (stored, created) = self.graph.add_link(&link).await?;
        if !created {
            return Err(WormholeError::already_exists(format!(
                "Link between channel {} and {wormhole}",
                link.channel_id
            )));
        }

        tracing::info!(
            wormhole_id = %wormhole.id,
            channel_id = %stored.channel_id,
            can_read = stored.can_read,
            can_write = stored.can_write,
            "Channel linked"
        );
        Ok(stored)
    }

    pub async fn remove_link(
        &self,
        actor: &Actor,
        wormhole: impl Into<WormholeId>,
        channel: impl Into<ChannelId>,
    ) -> WormholeResult<()> {
        let wormhole = self.wormhole(wormhole).await?;
        let channel = channel.into();
        self.require_admin(&wormhole, actor.user_id).await?;
        require_channel_permissions(actor)?;

        if !self.graph.remove_link(&wormhole, channel).await? {
            return Err(WormholeError::not_found(format!(
                "Link between channel {channel} and {wormhole}"
            )));
        }
        tracing::info!(wormhole_id = %wormhole.id, channel_id = %channel, "Channel unlinked");
        Ok(())
    }

    pub async fn links(&self, wormhole: impl Into<WormholeId>) -> WormholeResult<Vec<Link>> {
        self.graph.links_for_wormhole(wormhole).await
    }

    // ── Admins ───────────────────────────────────────────────────────────────

    pub async fn admins(&self, wormhole: impl Into<WormholeId>) -> WormholeResult<Vec<Admin>> {
        Ok(admins::list_for_wormhole(&self.db.pool, wormhole.into()).await?)
    }

    pub async fn add_admin(
        &self,
        actor: UserId,
        wormhole: impl Into<WormholeId>,
        target: UserId,
    ) -> WormholeResult<Admin> {
        let wormhole = self.wormhole(wormhole).await?;
        self.require_admin(&wormhole, actor).await?;

        if admins::is_admin(&self.db.pool, wormhole.id, target).await? {
            return Err(WormholeError::already_exists(format!(
                "Admin {target} of {wormhole}"
            )));
        }
        self.ensure_quota(target).await?;
        admins::insert_admin(&self.db.pool, wormhole.id, target).await?;

        tracing::info!(wormhole_id = %wormhole.id, user_id = %target, "Admin added");
        Ok(Admin {
            wormhole_id: wormhole.id,
            user_id: target,
        })
    }

    pub async fn remove_admin(
        &self,
        actor: UserId,
        wormhole: impl Into<WormholeId>,
        target: UserId,
    ) -> WormholeResult<()> {
        let wormhole = self.wormhole(wormhole).await?;
        self.require_admin(&wormhole, actor).await?;

        if !admins::delete_admin(&self.db.pool, wormhole.id, target).await? {
            return Err(WormholeError::not_found(format!("Admin {target} of {wormhole}")));
        }
        tracing::info!(wormhole_id = %wormhole.id, user_id = %target, "Admin removed");
        Ok(())
    }

    // ── Checks ───────────────────────────────────────────────────────────────

    async fn require_admin(&self, wormhole: &Wormhole, user: UserId) -> WormholeResult<()> {
        if admins::is_admin(&self.db.pool, wormhole.id, user).await? {
            Ok(())
        } else {
            Err(WormholeError::NotAdmin)
        }
    }

    async fn ensure_quota(&self, user: UserId) -> WormholeResult<()> {
        let owned = admins::count_for_user(&self.db.pool, user).await?;
        let max = i64::from(self.limits.max_wormholes_per_user);
        if owned >= max {
            return Err(WormholeError::LimitReached {
                message: format!("user {user} already administrates {owned} wormholes (max {max})"),
            });
        }
        Ok(())
    }
}

fn require_channel_permissions(actor: &Actor) -> WormholeResult<()> {
    match actor.channel_permissions {
        Some(permissions) if !permissions.can_manage_link() => Err(WormholeError::MissingPermission {
            permission: "VIEW_CHANNEL, MANAGE_MESSAGES".into(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> WormholeAdmin {
        let db = Database::connect_in_memory().await.unwrap();
        WormholeAdmin::new(db, LimitsConfig::default())
    }

    fn open_request(name: &str) -> OpenWormholeRequest {
        OpenWormholeRequest {
            name: name.into(),
            sync_threads: true,
        }
    }

    #[tokio::test]
    async fn open_makes_creator_admin() {
        let admin = service().await;
        let wh = admin.open(UserId(7), open_request("Alpha")).await.unwrap();

        let admins = admin.admins(&wh).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].user_id, UserId(7));
        assert_eq!(admin.list_accessible_by(UserId(7)).await.unwrap(), vec![wh]);
    }

    #[tokio::test]
    async fn open_rejects_bad_names() {
        let admin = service().await;
        let too_long = "n".repeat(65);
        for name in ["", "   ", too_long.as_str()] {
            let err = admin.open(UserId(7), open_request(name)).await.unwrap_err();
            assert!(matches!(err, WormholeError::Validation { .. }), "{name:?}: {err}");
        }
    }

    #[tokio::test]
    async fn sixth_wormhole_hits_the_quota() {
        let admin = service().await;
        for i in 0..5 {
            admin.open(UserId(7), open_request(&format!("wh{i}"))).await.unwrap();
        }
        let err = admin.open(UserId(7), open_request("one too many")).await.unwrap_err();
        assert!(matches!(err, WormholeError::LimitReached { .. }));
        assert_eq!(admin.list_all().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn add_admin_respects_target_quota() {
        let admin = service().await;
        for i in 0..5 {
            admin.open(UserId(8), open_request(&format!("theirs{i}"))).await.unwrap();
        }
        let mine = admin.open(UserId(7), open_request("mine")).await.unwrap();

        let err = admin.add_admin(UserId(7), &mine, UserId(8)).await.unwrap_err();
        assert!(matches!(err, WormholeError::LimitReached { .. }));
    }

    #[tokio::test]
    async fn admin_management() {
        let admin = service().await;
        let wh = admin.open(UserId(7), open_request("Alpha")).await.unwrap();

        let err = admin.add_admin(UserId(9), &wh, UserId(8)).await.unwrap_err();
        assert!(matches!(err, WormholeError::NotAdmin));

        admin.add_admin(UserId(7), &wh, UserId(8)).await.unwrap();
        let err = admin.add_admin(UserId(7), &wh, UserId(8)).await.unwrap_err();
        assert!(matches!(err, WormholeError::AlreadyExists { .. }));

        admin.remove_admin(UserId(8), &wh, UserId(7)).await.unwrap();
        let err = admin.remove_admin(UserId(8), &wh, UserId(7)).await.unwrap_err();
        assert!(matches!(err, WormholeError::NotFound { .. }));
        assert_eq!(admin.admins(&wh).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn linking_twice_keeps_one_link() {
        let admin = service().await;
        let wh = admin.open(UserId(7), open_request("Alpha")).await.unwrap();
        let actor = Actor::operator(UserId(7));

        admin.add_link(&actor, LinkRequest::new(&wh, ChannelId(10))).await.unwrap();
        let err = admin
            .add_link(&actor, LinkRequest::new(&wh, ChannelId(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, WormholeError::AlreadyExists { .. }));
        assert_eq!(admin.links(&wh).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn link_checks() {
        let admin = service().await;
        let wh = admin.open(UserId(7), open_request("Alpha")).await.unwrap();

        let stranger = Actor::operator(UserId(9));
        let err = admin.add_link(&stranger, LinkRequest::new(&wh, ChannelId(10))).await.unwrap_err();
        assert!(matches!(err, WormholeError::NotAdmin));

        let viewer = Actor::member(UserId(7), Permissions::VIEW_CHANNEL);
        let err = admin.add_link(&viewer, LinkRequest::new(&wh, ChannelId(10))).await.unwrap_err();
        assert!(matches!(err, WormholeError::MissingPermission { .. }));

        let moderator = Actor::member(UserId(7), Permissions::VIEW_CHANNEL | Permissions::MANAGE_MESSAGES);
        let mut deaf_mute = LinkRequest::new(&wh, ChannelId(10));
        deaf_mute.can_read = false;
        deaf_mute.can_write = false;
        let err = admin.add_link(&moderator, deaf_mute).await.unwrap_err();
        assert!(matches!(err, WormholeError::Validation { .. }));

        let err = admin
            .add_link(&moderator, LinkRequest::new(WormholeId(404), ChannelId(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, WormholeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unlinking() {
        let admin = service().await;
        let wh = admin.open(UserId(7), open_request("Alpha")).await.unwrap();
        let actor = Actor::operator(UserId(7));
        admin.add_link(&actor, LinkRequest::new(&wh, ChannelId(10))).await.unwrap();

        assert_eq!(admin.list_linked_to(ChannelId(10)).await.unwrap(), vec![wh.clone()]);
        admin.remove_link(&actor, &wh, ChannelId(10)).await.unwrap();
        let err = admin.remove_link(&actor, &wh, ChannelId(10)).await.unwrap_err();
        assert!(matches!(err, WormholeError::NotFound { .. }));
        assert!(admin.list_linked_to(ChannelId(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summaries_list_admins_and_links() {
        let admin = service().await;
        let wh = admin.open(UserId(7), open_request("Alpha")).await.unwrap();
        admin
            .add_link(&Actor::operator(UserId(7)), LinkRequest::new(&wh, ChannelId(10)))
            .await
            .unwrap();

        let summaries = admin.summarize(vec![wh.clone()]).await.unwrap();
        assert_eq!(summaries[0].wormhole, wh);
        assert_eq!(summaries[0].admins, vec![UserId(7)]);
        assert_eq!(summaries[0].links.len(), 1);
    }
}
