use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Listing, ListingStatus, NewListing, UserId},
    traits::HandoverApiError,
};

pub async fn insert_listing(listing: NewListing, conn: &mut SqliteConnection) -> Result<Listing, HandoverApiError> {
    let listing = sqlx::query_as(
        r#"
            INSERT INTO listings (seller_id, title) VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(listing.seller_id)
    .bind(listing.title)
    .fetch_one(conn)
    .await?;
    Ok(listing)
}

pub async fn fetch_listing(id: i64, conn: &mut SqliteConnection) -> Result<Option<Listing>, sqlx::Error> {
    let listing = sqlx::query_as("SELECT * FROM listings WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(listing)
}

/// Takes SQLite's write lock up front by issuing a no-op update against the target row. Every
/// state-changing operation calls this as its first statement inside the transaction, so that
/// competing operations on the same listing serialise here rather than deadlocking on a
/// read-to-write lock upgrade. Returns `false` if the row does not exist.
pub async fn lock_row(id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE listings SET id = id WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_status(
    id: i64,
    status: ListingStatus,
    conn: &mut SqliteConnection,
) -> Result<Listing, HandoverApiError> {
    let result: Option<Listing> =
        sqlx::query_as("UPDATE listings SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(status.to_string())
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or_else(|| HandoverApiError::not_found(id))
}

pub async fn begin_reservation(
    id: i64,
    buyer: &UserId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Listing, HandoverApiError> {
    let result: Option<Listing> = sqlx::query_as(
        r#"
            UPDATE listings
            SET status = 'Reserved', reserved_by = $1, reserved_at = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = 'Available'
            RETURNING *
        "#,
    )
    .bind(buyer)
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| HandoverApiError::Conflict(format!("Listing #{id} is no longer available")))
}

/// Returns the listing to `Available` and wipes all reservation metadata.
pub async fn clear_reservation(id: i64, conn: &mut SqliteConnection) -> Result<Listing, HandoverApiError> {
    let result: Option<Listing> = sqlx::query_as(
        r#"
            UPDATE listings
            SET status = 'Available',
                reserved_by = NULL,
                reserved_at = NULL,
                reschedule_requested_by = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| HandoverApiError::not_found(id))
}

/// Drops the listing back to `Reserved` after an accepted reschedule, keeping the reservation but
/// clearing the request flag. Refuses to touch a listing that has independently become `Sold`.
pub async fn reset_to_reserved(id: i64, conn: &mut SqliteConnection) -> Result<Option<Listing>, sqlx::Error> {
    let result = sqlx::query_as(
        r#"
            UPDATE listings
            SET status = 'Reserved', reschedule_requested_by = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status != 'Sold'
            RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

pub async fn set_reschedule_flag(
    id: i64,
    requested_by: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Listing, HandoverApiError> {
    let result: Option<Listing> = sqlx::query_as(
        "UPDATE listings SET reschedule_requested_by = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(requested_by)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| HandoverApiError::not_found(id))
}

pub async fn clear_reschedule_flag(id: i64, conn: &mut SqliteConnection) -> Result<Listing, HandoverApiError> {
    let result: Option<Listing> = sqlx::query_as(
        "UPDATE listings SET reschedule_requested_by = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| HandoverApiError::not_found(id))
}

/// Reclaims every in-progress listing whose reservation is older than the abandonment cutoff.
/// `Sold` listings are never touched. Returns the reclaimed listings.
pub async fn reclaim_abandoned(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Listing>, HandoverApiError> {
    let rows: Vec<Listing> = sqlx::query_as(
        r#"
            UPDATE listings
            SET status = 'Available',
                reserved_by = NULL,
                reserved_at = NULL,
                reschedule_requested_by = NULL,
                updated_at = CURRENT_TIMESTAMP
            WHERE status IN ('Reserved', 'LocationProposed', 'LocationSelected', 'OtpGenerated')
              AND reserved_at < $1
            RETURNING *
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    debug!("🗃️ {} abandoned reservations reclaimed", rows.len());
    Ok(rows)
}

/// Clears reschedule-request flags left behind on reservations older than the cutoff. The
/// abandoned-reservation sweep normally covers these rows too, so this is usually a no-op pass.
pub async fn clear_stale_reschedules(cutoff: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE listings
            SET reschedule_requested_by = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE reschedule_requested_by IS NOT NULL AND reserved_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(conn)
    .await?;
    trace!("🗃️ {} stale reschedule flags cleared", result.rows_affected());
    Ok(result.rows_affected())
}
