//! Admin repository.

use sqlx::{AnyPool, any::AnyRow};

use wormhole_common::ids::{UserId, WormholeId};
use wormhole_common::models::Admin;

use crate::any_compat::{get_i64, get_id};

fn row_to_admin(row: &AnyRow) -> Result<Admin, sqlx::Error> {
    Ok(Admin {
        wormhole_id: WormholeId(get_i64(row, "wormhole_id")?),
        user_id: get_id(row, "user_id")?,
    })
}

/// Grant admin rights. Returns false if the user already had them.
pub async fn insert_admin(
    pool: &AnyPool,
    wormhole_id: WormholeId,
    user_id: UserId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO wormhole_admins (wormhole_id, user_id) VALUES (?, ?)
           ON CONFLICT (wormhole_id, user_id) DO NOTHING"#,
    )
    .bind(wormhole_id.get())
    .bind(user_id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Revoke admin rights. Returns false if the user had none.
pub async fn delete_admin(
    pool: &AnyPool,
    wormhole_id: WormholeId,
    user_id: UserId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM wormhole_admins WHERE wormhole_id = ? AND user_id = ?")
        .bind(wormhole_id.get())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_for_wormhole(
    pool: &AnyPool,
    wormhole_id: WormholeId,
) -> Result<Vec<Admin>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT wormhole_id, user_id FROM wormhole_admins WHERE wormhole_id = ? ORDER BY created_at, user_id",
    )
    .bind(wormhole_id.get())
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_admin).collect()
}

pub async fn is_admin(
    pool: &AnyPool,
    wormhole_id: WormholeId,
    user_id: UserId,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS present FROM wormhole_admins WHERE wormhole_id = ? AND user_id = ?")
        .bind(wormhole_id.get())
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Number of wormholes the user administrates (used for the creation quota).
pub async fn count_for_user(pool: &AnyPool, user_id: UserId) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM wormhole_admins WHERE user_id = ?")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await?;
    get_i64(&row, "total")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::repository::wormholes;

    #[tokio::test]
    async fn grant_and_revoke() {
        let db = Database::connect_in_memory().await.unwrap();
        let wh = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();

        assert!(insert_admin(&db.pool, wh.id, UserId(7)).await.unwrap());
        assert!(!insert_admin(&db.pool, wh.id, UserId(7)).await.unwrap());
        assert!(is_admin(&db.pool, wh.id, UserId(7)).await.unwrap());
        assert!(!is_admin(&db.pool, wh.id, UserId(8)).await.unwrap());

        let admins = list_for_wormhole(&db.pool, wh.id).await.unwrap();
        assert_eq!(admins, vec![Admin { wormhole_id: wh.id, user_id: UserId(7) }]);

        assert!(delete_admin(&db.pool, wh.id, UserId(7)).await.unwrap());
        assert!(!delete_admin(&db.pool, wh.id, UserId(7)).await.unwrap());
        assert!(!is_admin(&db.pool, wh.id, UserId(7)).await.unwrap());
    }

    #[tokio::test]
    async fn counts_wormholes_per_user() {
        let db = Database::connect_in_memory().await.unwrap();
        let a = wormholes::create_wormhole(&db.pool, "Alpha", true).await.unwrap();
        let b = wormholes::create_wormhole(&db.pool, "Beta", true).await.unwrap();

        insert_admin(&db.pool, a.id, UserId(7)).await.unwrap();
        insert_admin(&db.pool, b.id, UserId(7)).await.unwrap();
        insert_admin(&db.pool, b.id, UserId(8)).await.unwrap();

        assert_eq!(count_for_user(&db.pool, UserId(7)).await.unwrap(), 2);
        assert_eq!(count_for_user(&db.pool, UserId(8)).await.unwrap(), 1);
        assert_eq!(count_for_user(&db.pool, UserId(9)).await.unwrap(), 0);
    }
}
