//! Explicit seeding of the singleton page rows.
//!
//! The initial migration seeds every page. This repeats the same idempotent
//! step for databases where a page row was removed by hand, and is run by
//! `showcase-cli seed`.

use sqlx::PgPool;

use super::RepositoryError;
use super::singleton::PAGE_TABLES;

/// Insert a default row into every page table that has none.
///
/// Returns the tables that were seeded.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if an insert fails.
pub async fn ensure_page_rows(pool: &PgPool) -> Result<Vec<&'static str>, RepositoryError> {
    let mut seeded = Vec::new();

    for table in PAGE_TABLES {
        let inserted = sqlx::query(&format!(
            "INSERT INTO {table} (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM {table})"
        ))
        .execute(pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(table, "seeded page row");
            seeded.push(table);
        }
    }

    Ok(seeded)
}
