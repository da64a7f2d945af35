use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CancellationRecord, NewCancellationRecord},
    traits::HandoverApiError,
};

/// Appends an audit record. These rows are never updated or deleted.
pub async fn insert_record(
    record: NewCancellationRecord,
    conn: &mut SqliteConnection,
) -> Result<CancellationRecord, HandoverApiError> {
    let row: CancellationRecord = sqlx::query_as(
        r#"
            INSERT INTO cancellation_records (
                listing_id,
                buyer_id,
                seller_id,
                cancelled_by,
                status_at_cancellation,
                fault,
                reason,
                details,
                kind
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
        "#,
    )
    .bind(record.listing_id)
    .bind(record.buyer_id)
    .bind(record.seller_id)
    .bind(record.cancelled_by)
    .bind(record.status_at_cancellation.to_string())
    .bind(record.fault.to_string())
    .bind(record.reason.to_string())
    .bind(record.details)
    .bind(record.kind.to_string())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ {} record appended for listing #{} ({} at fault)", row.kind, row.listing_id, row.fault);
    Ok(row)
}

pub async fn fetch_for_listing(
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CancellationRecord>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM cancellation_records WHERE listing_id = $1 ORDER BY id ASC")
        .bind(listing_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
