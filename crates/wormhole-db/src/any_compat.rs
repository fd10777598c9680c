//! AnyPool row-extraction helpers.
//!
//! `sqlx::AnyPool` only natively decodes primitive types (i16/i32/i64,
//! f32/f64, bool, String, &[u8]). Snowflakes do not fit an `i64` column
//! safely, so they are stored as TEXT and parsed here; flags are stored as
//! BIGINT 0/1 because booleans decode differently per backend.
//!
//! All functions return `sqlx::Error` so they fit naturally into manual
//! row mapping.

use std::str::FromStr;

use sqlx::{Row, any::AnyRow};

fn decode_err<E>(e: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(e))
}

// ── Snowflakes ───────────────────────────────────────────────────────────────

/// Decode a TEXT column holding a Snowflake into its typed id.
pub fn get_id<T>(row: &AnyRow, col: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    let s: String = row.try_get(col)?;
    s.parse().map_err(decode_err)
}

// ── Integers and flags ───────────────────────────────────────────────────────

pub fn get_i64(row: &AnyRow, col: &str) -> Result<i64, sqlx::Error> {
    row.try_get(col)
}

/// Decode a 0/1 BIGINT column.
pub fn get_flag(row: &AnyRow, col: &str) -> Result<bool, sqlx::Error> {
    let v: i64 = row.try_get(col)?;
    Ok(v != 0)
}

/// Encode a flag for binding.
pub fn flag(value: bool) -> i64 {
    i64::from(value)
}

// ── Text ─────────────────────────────────────────────────────────────────────

pub fn get_string(row: &AnyRow, col: &str) -> Result<String, sqlx::Error> {
    row.try_get(col)
}

pub fn get_opt_string(row: &AnyRow, col: &str) -> Result<Option<String>, sqlx::Error> {
    row.try_get(col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_encode_as_integers() {
        assert_eq!(flag(true), 1);
        assert_eq!(flag(false), 0);
    }
}
