use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CandidateLocation, MeetingPlace, ProposedLocation},
    traits::HandoverApiError,
};

/// Replaces the full candidate set for a listing with the seller's new proposal. The old rows are
/// deleted rather than merged, so a re-proposal always starts from a clean slate.
pub async fn replace_for_listing(
    listing_id: i64,
    candidates: &[ProposedLocation],
    conn: &mut SqliteConnection,
) -> Result<Vec<CandidateLocation>, HandoverApiError> {
    delete_for_listing(listing_id, conn).await?;
    let mut rows = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let row: CandidateLocation = sqlx::query_as(
            r#"
                INSERT INTO candidate_locations (listing_id, place, meeting_time)
                VALUES ($1, $2, $3)
                RETURNING *
            "#,
        )
        .bind(listing_id)
        .bind(candidate.place.to_string())
        .bind(candidate.meeting_time.clone())
        .fetch_one(&mut *conn)
        .await?;
        rows.push(row);
    }
    trace!("🗃️ {} candidate locations stored for listing #{listing_id}", rows.len());
    Ok(rows)
}

pub async fn fetch_for_listing(
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CandidateLocation>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM candidate_locations WHERE listing_id = $1 ORDER BY id ASC")
        .bind(listing_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn fetch_selected(
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CandidateLocation>, sqlx::Error> {
    let row = sqlx::query_as("SELECT * FROM candidate_locations WHERE listing_id = $1 AND is_selected = 1")
        .bind(listing_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Clears every selection flag for the listing and then marks the chosen place. Keeping the clear
/// and the set in the same transaction preserves the at-most-one-selected invariant.
pub async fn select_place(
    listing_id: i64,
    place: MeetingPlace,
    conn: &mut SqliteConnection,
) -> Result<Option<CandidateLocation>, sqlx::Error> {
    deselect_all(listing_id, &mut *conn).await?;
    let row = sqlx::query_as(
        "UPDATE candidate_locations SET is_selected = 1 WHERE listing_id = $1 AND place = $2 RETURNING *",
    )
    .bind(listing_id)
    .bind(place.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn deselect_all(listing_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE candidate_locations SET is_selected = 0 WHERE listing_id = $1")
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_for_listing(listing_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM candidate_locations WHERE listing_id = $1").bind(listing_id).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Deletes candidate rows whose listing has fallen back to `Available`. These are left behind when
/// the abandonment sweep resets a listing, and carry no meaning once the reservation is gone.
pub async fn delete_orphaned(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            DELETE FROM candidate_locations
            WHERE listing_id IN (SELECT id FROM listings WHERE status = 'Available')
        "#,
    )
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
