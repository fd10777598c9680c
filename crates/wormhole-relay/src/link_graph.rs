//! Queryable view of which channels are connected through which wormholes.

use wormhole_common::error::WormholeResult;
use wormhole_common::ids::{ChannelId, UserId, WormholeId};
use wormhole_common::models::{Link, LinkFilter, Wormhole};
use wormhole_db::Database;
use wormhole_db::repository::{links, wormholes};

/// Reads over wormholes and links, plus the two link writes.
#[derive(Clone)]
pub struct LinkGraph {
    db: Database,
}

impl LinkGraph {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn links_for_channel(
        &self,
        channel: impl Into<ChannelId>,
        filter: LinkFilter,
    ) -> WormholeResult<Vec<Link>> {
        Ok(links::list_for_channel(&self.db.pool, channel.into(), filter).await?)
    }

    pub async fn links_for_wormhole(
        &self,
        wormhole: impl Into<WormholeId>,
    ) -> WormholeResult<Vec<Link>> {
        Ok(links::list_for_wormhole(&self.db.pool, wormhole.into()).await?)
    }

    pub async fn find_link(
        &self,
        wormhole: impl Into<WormholeId>,
        channel: impl Into<ChannelId>,
    ) -> WormholeResult<Option<Link>> {
        Ok(links::find_link(&self.db.pool, wormhole.into(), channel.into()).await?)
    }

    /// Wormholes the user administrates.
    pub async fn wormholes_accessible_by(
        &self,
        user: impl Into<UserId>,
    ) -> WormholeResult<Vec<Wormhole>> {
        Ok(wormholes::list_accessible_by(&self.db.pool, user.into()).await?)
    }

    /// Distinct wormholes with a matching link to the channel.
    pub async fn wormholes_linked_to(
        &self,
        channel: impl Into<ChannelId>,
        filter: LinkFilter,
    ) -> WormholeResult<Vec<Wormhole>> {
        Ok(wormholes::list_linked_to(&self.db.pool, channel.into(), filter).await?)
    }

    /// Distinct wormholes linked to any of a guild's channels.
    pub async fn wormholes_linked_in_guild(
        &self,
        channels: &[ChannelId],
    ) -> WormholeResult<Vec<Wormhole>> {
        Ok(wormholes::list_linked_in(&self.db.pool, channels).await?)
    }

    /// Insert a link. Returns the stored link and whether it is new.
    pub async fn add_link(&self, link: &Link) -> WormholeResult<(Link, bool)> {
        Ok(links::insert_link(&self.db.pool, link).await?)
    }

    /// Remove a link. Removing an absent link is a no-op returning false.
    pub async fn remove_link(
        &self,
        wormhole: impl Into<WormholeId>,
        channel: impl Into<ChannelId>,
    ) -> WormholeResult<bool> {
        Ok(links::delete_link(&self.db.pool, wormhole.into(), channel.into()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wormhole_db::repository::admins;

    #[tokio::test]
    async fn guild_listing_dedupes_across_channels() {
        let db = Database::connect_in_memory().await.unwrap();
        let graph = LinkGraph::new(db.clone());
        let wh = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();

        graph.add_link(&Link::new(&wh, ChannelId(1), true, true)).await.unwrap();
        graph.add_link(&Link::new(&wh, ChannelId(2), true, true)).await.unwrap();

        let found = graph
            .wormholes_linked_in_guild(&[ChannelId(1), ChannelId(2)])
            .await
            .unwrap();
        assert_eq!(found, vec![wh]);
    }

    #[tokio::test]
    async fn remove_link_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        let graph = LinkGraph::new(db.clone());
        let wh = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();
        graph.add_link(&Link::new(&wh, ChannelId(1), true, true)).await.unwrap();

        assert!(graph.remove_link(&wh, ChannelId(1)).await.unwrap());
        assert!(!graph.remove_link(&wh, ChannelId(1)).await.unwrap());
        assert!(graph.links_for_wormhole(&wh).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accessible_by_follows_admins() {
        let db = Database::connect_in_memory().await.unwrap();
        let graph = LinkGraph::new(db.clone());
        let wh = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();
        admins::insert_admin(&db.pool, wh.id, UserId(7)).await.unwrap();

        assert_eq!(graph.wormholes_accessible_by(UserId(7)).await.unwrap(), vec![wh]);
        assert!(graph.wormholes_accessible_by(UserId(8)).await.unwrap().is_empty());
    }
}
