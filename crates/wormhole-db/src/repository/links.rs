//! Link repository: channel membership in wormholes.

use sqlx::{AnyPool, any::AnyRow};

use wormhole_common::ids::{ChannelId, WormholeId};
use wormhole_common::models::{Link, LinkFilter};

use crate::any_compat::{flag, get_flag, get_i64, get_id, get_opt_string};

const LINK_COLUMNS: &str =
    "wormhole_id, channel_id, can_read, can_write, webhook_name, webhook_avatar";

fn row_to_link(row: &AnyRow) -> Result<Link, sqlx::Error> {
    Ok(Link {
        wormhole_id: WormholeId(get_i64(row, "wormhole_id")?),
        channel_id: get_id(row, "channel_id")?,
        can_read: get_flag(row, "can_read")?,
        can_write: get_flag(row, "can_write")?,
        webhook_name: get_opt_string(row, "webhook_name")?,
        webhook_avatar: get_opt_string(row, "webhook_avatar")?,
    })
}

/// Insert a link unless one already exists for the same pair.
///
/// Returns the stored link and whether this call created it. An existing
/// link is returned unchanged, so calling this twice yields one link.
pub async fn insert_link(pool: &AnyPool, link: &Link) -> Result<(Link, bool), sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO wormhole_links
               (wormhole_id, channel_id, can_read, can_write, webhook_name, webhook_avatar)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT (wormhole_id, channel_id) DO NOTHING"#,
    )
    .bind(link.wormhole_id.get())
    .bind(link.channel_id.to_string())
    .bind(flag(link.can_read))
    .bind(flag(link.can_write))
    .bind(link.webhook_name.clone())
    .bind(link.webhook_avatar.clone())
    .execute(pool)
    .await?;

    let created = result.rows_affected() > 0;
    let stored = find_link(pool, link.wormhole_id, link.channel_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok((stored, created))
}

/// Find the link between a wormhole and a channel.
pub async fn find_link(
    pool: &AnyPool,
    wormhole_id: WormholeId,
    channel_id: ChannelId,
) -> Result<Option<Link>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {LINK_COLUMNS} FROM wormhole_links WHERE wormhole_id = ? AND channel_id = ?"
    ))
    .bind(wormhole_id.get())
    .bind(channel_id.to_string())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_link).transpose()
}

/// Links of one channel, across all wormholes, that satisfy `filter`.
pub async fn list_for_channel(
    pool: &AnyPool,
    channel_id: ChannelId,
    filter: LinkFilter,
) -> Result<Vec<Link>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {LINK_COLUMNS} FROM wormhole_links
           WHERE channel_id = ?
             AND (? = 0 OR can_read = 1)
             AND (? = 0 OR can_write = 1)
           ORDER BY wormhole_id"#
    ))
    .bind(channel_id.to_string())
    .bind(flag(filter.require_read))
    .bind(flag(filter.require_write))
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_link).collect()
}

/// Every link of one wormhole, in creation order.
pub async fn list_for_wormhole(
    pool: &AnyPool,
    wormhole_id: WormholeId,
) -> Result<Vec<Link>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {LINK_COLUMNS} FROM wormhole_links WHERE wormhole_id = ? ORDER BY created_at, channel_id"
    ))
    .bind(wormhole_id.get())
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_link).collect()
}

/// Delete a link. Returns false when there was nothing to delete.
pub async fn delete_link(
    pool: &AnyPool,
    wormhole_id: WormholeId,
    channel_id: ChannelId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM wormhole_links WHERE wormhole_id = ? AND channel_id = ?")
        .bind(wormhole_id.get())
        .bind(channel_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::repository::wormholes;

    #[tokio::test]
    async fn insert_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        let wh = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();

        let link = Link::new(wh.id, ChannelId(10), true, true);
        let (first, created) = insert_link(&db.pool, &link).await.unwrap();
        assert!(created);
        assert_eq!(first, link);

        // A second insert with different flags keeps the original row.
        let again = Link::new(wh.id, ChannelId(10), false, true);
        let (second, created) = insert_link(&db.pool, &again).await.unwrap();
        assert!(!created);
        assert_eq!(second, link);
        assert_eq!(list_for_wormhole(&db.pool, wh.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn channel_lookup_respects_filter() {
        let db = Database::connect_in_memory().await.unwrap();
        let a = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();
        let b = wormholes::create_wormhole(&db.pool, "Beta", true).await.unwrap();

        insert_link(&db.pool, &Link::new(a.id, ChannelId(10), true, false)).await.unwrap();
        insert_link(&db.pool, &Link::new(b.id, ChannelId(10), false, true)).await.unwrap();

        let all = list_for_channel(&db.pool, ChannelId(10), LinkFilter::ANY).await.unwrap();
        assert_eq!(all.len(), 2);
        let readable = list_for_channel(&db.pool, ChannelId(10), LinkFilter::READ).await.unwrap();
        assert_eq!(readable.len(), 1);
        assert_eq!(readable[0].wormhole_id, a.id);
        let writable = list_for_channel(&db.pool, ChannelId(10), LinkFilter::WRITE).await.unwrap();
        assert_eq!(writable[0].wormhole_id, b.id);
    }

    #[tokio::test]
    async fn overrides_are_stored() {
        let db = Database::connect_in_memory().await.unwrap();
        let wh = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();

        let mut link = Link::new(wh.id, ChannelId(10), true, true);
        link.webhook_name = Some("Portal".into());
        link.webhook_avatar = Some("https://cdn.example/portal.png".into());
        insert_link(&db.pool, &link).await.unwrap();

        let stored = find_link(&db.pool, wh.id, ChannelId(10)).await.unwrap().unwrap();
        assert_eq!(stored.webhook_name.as_deref(), Some("Portal"));
        assert_eq!(stored.webhook_avatar.as_deref(), Some("https://cdn.example/portal.png"));
    }

    #[tokio::test]
    async fn delete_is_a_noop_the_second_time() {
        let db = Database::connect_in_memory().await.unwrap();
        let wh = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();
        insert_link(&db.pool, &Link::new(wh.id, ChannelId(10), true, true)).await.unwrap();

        assert!(delete_link(&db.pool, wh.id, ChannelId(10)).await.unwrap());
        assert!(!delete_link(&db.pool, wh.id, ChannelId(10)).await.unwrap());
        assert!(find_link(&db.pool, wh.id, ChannelId(10)).await.unwrap().is_none());
    }
}
