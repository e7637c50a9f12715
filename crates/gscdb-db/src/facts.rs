//! Write and read operations for the `search_facts` table.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::DbError;

/// One keyword/page observation for a single day, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFact {
    pub keyword: String,
    pub page: String,
    pub fact_date: NaiveDate,
    pub clicks: i64,
    pub impressions: i64,
    pub ctr: f64,
    pub position: f64,
}

/// A row from the `search_facts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FactRow {
    pub id: i64,
    pub source_id: i64,
    pub keyword: String,
    pub page: String,
    pub fact_date: NaiveDate,
    pub clicks: i64,
    pub impressions: i64,
    pub ctr: f64,
    pub position: f64,
    pub synced_at: DateTime<Utc>,
}

/// Upserts a batch of facts for one source, keyed by
/// `(source_id, keyword, page, fact_date)`.
///
/// Existing keys get the new metric values and a fresh `synced_at`. Duplicate
/// keys inside `facts` collapse to the last occurrence, so the batch goes out
/// as a single `INSERT … SELECT * FROM UNNEST(…) ON CONFLICT` statement and is
/// applied all-or-nothing.
///
/// Returns the number of input rows; an empty batch is a no-op returning 0.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails (including a foreign-key
/// violation for an unknown `source_id`).
pub async fn record_facts(
    pool: &PgPool,
    source_id: i64,
    facts: &[NewFact],
) -> Result<u64, DbError> {
    if facts.is_empty() {
        return Ok(0);
    }

    let unique = collapse_duplicate_keys(facts);

    let mut keywords: Vec<&str> = Vec::with_capacity(unique.len());
    let mut pages: Vec<&str> = Vec::with_capacity(unique.len());
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(unique.len());
    let mut clicks: Vec<i64> = Vec::with_capacity(unique.len());
    let mut impressions: Vec<i64> = Vec::with_capacity(unique.len());
    let mut ctrs: Vec<f64> = Vec::with_capacity(unique.len());
    let mut positions: Vec<f64> = Vec::with_capacity(unique.len());

    for fact in unique {
        keywords.push(&fact.keyword);
        pages.push(&fact.page);
        dates.push(fact.fact_date);
        clicks.push(fact.clicks);
        impressions.push(fact.impressions);
        ctrs.push(fact.ctr);
        positions.push(fact.position);
    }

    sqlx::query(
        "INSERT INTO search_facts \
             (source_id, keyword, page, fact_date, clicks, impressions, ctr, position) \
         SELECT $1, * FROM UNNEST(\
              $2::text[], $3::text[], $4::date[], $5::int8[], $6::int8[], \
              $7::float8[], $8::float8[]) \
         ON CONFLICT (source_id, keyword, page, fact_date) DO UPDATE SET \
             clicks      = EXCLUDED.clicks, \
             impressions = EXCLUDED.impressions, \
             ctr         = EXCLUDED.ctr, \
             position    = EXCLUDED.position, \
             synced_at   = NOW()",
    )
    .bind(source_id)
    .bind(&keywords)
    .bind(&pages)
    .bind(&dates)
    .bind(&clicks)
    .bind(&impressions)
    .bind(&ctrs)
    .bind(&positions)
    .execute(pool)
    .await?;

    Ok(facts.len() as u64)
}

/// Returns all facts for a source ordered by date, keyword, then page.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_facts(pool: &PgPool, source_id: i64) -> Result<Vec<FactRow>, DbError> {
    let rows = sqlx::query_as::<_, FactRow>(
        "SELECT id, source_id, keyword, page, fact_date, clicks, impressions, ctr, position, \
                synced_at \
         FROM search_facts \
         WHERE source_id = $1 \
         ORDER BY fact_date, keyword, page",
    )
    .bind(source_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Last-write-wins collapse of facts sharing a `(keyword, page, fact_date)` key.
///
/// Postgres rejects an `ON CONFLICT DO UPDATE` that touches the same row twice
/// in one statement. First-seen order is preserved.
fn collapse_duplicate_keys(facts: &[NewFact]) -> Vec<&NewFact> {
    let mut slots: HashMap<(&str, &str, NaiveDate), usize> = HashMap::with_capacity(facts.len());
    let mut unique: Vec<&NewFact> = Vec::with_capacity(facts.len());

    for fact in facts {
        let key = (fact.keyword.as_str(), fact.page.as_str(), fact.fact_date);
        if let Some(&slot) = slots.get(&key) {
            unique[slot] = fact;
        } else {
            slots.insert(key, unique.len());
            unique.push(fact);
        }
    }

    unique
}
