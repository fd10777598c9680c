//! Delivery endpoint repository.
//!
//! A channel should have at most one endpoint row, but nothing enforces it at
//! the schema level: rows can outlive the remote webhook, and a crash between
//! remote creation and insert leaves strays. Callers reconcile.

use sqlx::{AnyPool, any::AnyRow};

use wormhole_common::ids::{ChannelId, EndpointId};
use wormhole_common::models::Endpoint;

use crate::any_compat::{get_id, get_string};

fn row_to_endpoint(row: &AnyRow) -> Result<Endpoint, sqlx::Error> {
    Ok(Endpoint {
        id: get_id(row, "id")?,
        channel_id: get_id(row, "channel_id")?,
        token: get_string(row, "token")?,
    })
}

/// Every stored endpoint of a channel, oldest first.
pub async fn list_for_channel(
    pool: &AnyPool,
    channel_id: ChannelId,
) -> Result<Vec<Endpoint>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, token, channel_id FROM wormhole_endpoints WHERE channel_id = ? ORDER BY created_at, id",
    )
    .bind(channel_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_endpoint).collect()
}

pub async fn insert_endpoint(pool: &AnyPool, endpoint: &Endpoint) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO wormhole_endpoints (id, token, channel_id) VALUES (?, ?, ?)")
        .bind(endpoint.id.to_string())
        .bind(endpoint.token.as_str())
        .bind(endpoint.channel_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_endpoint(pool: &AnyPool, id: EndpointId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM wormhole_endpoints WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove every endpoint row of a channel.
pub async fn delete_for_channel(pool: &AnyPool, channel_id: ChannelId) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM wormhole_endpoints WHERE channel_id = ?")
        .bind(channel_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
