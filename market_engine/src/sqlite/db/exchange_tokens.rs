use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{ExchangeToken, UserId},
    traits::HandoverApiError,
};

/// Fetches the single live (unused, unexpired) token for a listing, if one exists. The engine
/// enforces at most one such token per listing, so a plain `fetch_optional` suffices.
pub async fn fetch_live_token(
    listing_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ExchangeToken>, sqlx::Error> {
    let token = sqlx::query_as(
        "SELECT * FROM exchange_tokens WHERE listing_id = $1 AND used = 0 AND expires_at > $2 ORDER BY id DESC LIMIT 1",
    )
    .bind(listing_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(token)
}

/// Fetches the most recently issued token for a listing regardless of its state. Verification
/// needs the dead ones too, to tell a lockout apart from a missing code.
pub async fn fetch_latest(
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ExchangeToken>, sqlx::Error> {
    let token = sqlx::query_as("SELECT * FROM exchange_tokens WHERE listing_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(listing_id)
        .fetch_optional(conn)
        .await?;
    Ok(token)
}

pub async fn insert_token(
    listing_id: i64,
    buyer: &UserId,
    seller: &UserId,
    salt: &str,
    code_hash: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ExchangeToken, HandoverApiError> {
    let token = sqlx::query_as(
        r#"
            INSERT INTO exchange_tokens (listing_id, buyer_id, seller_id, salt, code_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        "#,
    )
    .bind(listing_id)
    .bind(buyer)
    .bind(seller)
    .bind(salt)
    .bind(code_hash)
    .bind(expires_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Exchange token issued for listing #{listing_id}");
    Ok(token)
}

pub async fn mark_used(id: i64, conn: &mut SqliteConnection) -> Result<ExchangeToken, HandoverApiError> {
    let token: Option<ExchangeToken> =
        sqlx::query_as("UPDATE exchange_tokens SET used = 1 WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    token.ok_or_else(|| HandoverApiError::NotFound(format!("Exchange token #{id} does not exist")))
}

/// Increments the failed-attempt counter. Once the counter reaches the ceiling the token is also
/// soft-locked (`used = 1`) so that the code can never be replayed.
pub async fn record_failed_attempt(
    id: i64,
    ceiling: i64,
    conn: &mut SqliteConnection,
) -> Result<ExchangeToken, HandoverApiError> {
    let token: Option<ExchangeToken> = sqlx::query_as(
        r#"
            UPDATE exchange_tokens
            SET failed_attempts = failed_attempts + 1,
                used = CASE WHEN failed_attempts + 1 >= $1 THEN 1 ELSE used END
            WHERE id = $2
            RETURNING *
        "#,
    )
    .bind(ceiling)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    token.ok_or_else(|| HandoverApiError::NotFound(format!("Exchange token #{id} does not exist")))
}

/// Consumes every live token for a listing. Called on cancellation and on an accepted reschedule.
pub async fn invalidate_for_listing(listing_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE exchange_tokens SET used = 1 WHERE listing_id = $1 AND used = 0")
        .bind(listing_id)
        .execute(conn)
        .await?;
    trace!("🗃️ {} exchange tokens invalidated for listing #{listing_id}", result.rows_affected());
    Ok(result.rows_affected())
}

/// Marks every expired-but-unused token as used. Run by the reconciliation sweep.
pub async fn expire_stale(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE exchange_tokens SET used = 1 WHERE used = 0 AND expires_at <= $1")
        .bind(now)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Consumes live tokens whose listing has gone back to `Available`. An abandoned-reservation
/// reclaim can leave one behind, and it must never answer the next buyer's code request.
pub async fn invalidate_orphaned(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE exchange_tokens SET used = 1
            WHERE used = 0 AND listing_id IN (SELECT id FROM listings WHERE status = 'Available')
        "#,
    )
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
