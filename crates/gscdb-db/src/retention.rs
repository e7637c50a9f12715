//! Retention pruning for facts and rollups.

use sqlx::PgPool;

use crate::{days_ago, DbError};

/// Deletes facts and rollups dated before `today - retention_days`.
///
/// Both deletes share one transaction. Returns the number of fact rows
/// removed; rollup deletions are not counted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either delete fails; nothing is applied.
pub async fn purge_older_than(pool: &PgPool, retention_days: u32) -> Result<u64, DbError> {
    let cutoff = days_ago(retention_days);
    let mut tx = pool.begin().await?;

    let facts_deleted = sqlx::query("DELETE FROM search_facts WHERE fact_date < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM daily_rollups WHERE rollup_date < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(facts_deleted)
}
