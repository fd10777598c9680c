//! Wormhole repository.

use sqlx::{Any, AnyPool, QueryBuilder, any::AnyRow};

use wormhole_common::ids::{ChannelId, UserId, WormholeId};
use wormhole_common::models::{LinkFilter, Wormhole};

use crate::any_compat::{flag, get_flag, get_i64, get_string};

fn row_to_wormhole(row: &AnyRow) -> Result<Wormhole, sqlx::Error> {
    Ok(Wormhole {
        id: WormholeId(get_i64(row, "id")?),
        name: get_string(row, "name")?,
        sync_threads: get_flag(row, "sync_threads")?,
    })
}

/// Create a new wormhole; storage assigns the id.
pub async fn create_wormhole(
    pool: &AnyPool,
    name: &str,
    sync_threads: bool,
) -> Result<Wormhole, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO wormholes (name, sync_threads) VALUES (?, ?) RETURNING id, name, sync_threads",
    )
    .bind(name)
    .bind(flag(sync_threads))
    .fetch_one(pool)
    .await?;
    row_to_wormhole(&row)
}

/// Find a wormhole by id.
pub async fn find_by_id(pool: &AnyPool, id: WormholeId) -> Result<Option<Wormhole>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, sync_threads FROM wormholes WHERE id = ?")
        .bind(id.get())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_wormhole).transpose()
}

/// Every wormhole, oldest first.
pub async fn list_all(pool: &AnyPool) -> Result<Vec<Wormhole>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, name, sync_threads FROM wormholes ORDER BY id")
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_wormhole).collect()
}

/// Wormholes the user administrates.
pub async fn list_accessible_by(
    pool: &AnyPool,
    user_id: UserId,
) -> Result<Vec<Wormhole>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT w.id, w.name, w.sync_threads
           FROM wormholes w
           JOIN wormhole_admins a ON a.wormhole_id = w.id
           WHERE a.user_id = ?
           ORDER BY w.id"#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_wormhole).collect()
}

/// Distinct wormholes with a link to the channel that satisfies `filter`.
pub async fn list_linked_to(
    pool: &AnyPool,
    channel_id: ChannelId,
    filter: LinkFilter,
) -> Result<Vec<Wormhole>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT DISTINCT w.id, w.name, w.sync_threads
           FROM wormholes w
           JOIN wormhole_links l ON l.wormhole_id = w.id
           WHERE l.channel_id = ?
             AND (? = 0 OR l.can_read = 1)
             AND (? = 0 OR l.can_write = 1)
           ORDER BY w.id"#,
    )
    .bind(channel_id.to_string())
    .bind(flag(filter.require_read))
    .bind(flag(filter.require_write))
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_wormhole).collect()
}

/// Distinct wormholes linked to any of the given channels (e.g. every
/// channel of one guild).
pub async fn list_linked_in(
    pool: &AnyPool,
    channel_ids: &[ChannelId],
) -> Result<Vec<Wormhole>, sqlx::Error> {
    if channel_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Any> = QueryBuilder::new(
        r#"SELECT DISTINCT w.id, w.name, w.sync_threads
           FROM wormholes w
           JOIN wormhole_links l ON l.wormhole_id = w.id
           WHERE l.channel_id IN ("#,
    );
    let mut ids = qb.separated(", ");
    for channel_id in channel_ids {
        ids.push_bind(channel_id.to_string());
    }
    qb.push(") ORDER BY w.id");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(row_to_wormhole).collect()
}
