//! Helpers shared by the singleton content-page repositories.
//!
//! Each page table holds exactly one row, seeded by migration. Reads never
//! insert; a missing row reads as `None` and writes fail with `NotFound`.

use std::future::Future;

use sqlx::{PgConnection, PgExecutor};

use super::{RepositoryError, check_version};
use crate::files::{FileStore, StoredFile};

/// The page tables, for seeding and for `create`.
pub const PAGE_TABLES: [&str; 7] = [
    "catalog.company",
    "catalog.homepage",
    "catalog.faq",
    "catalog.partnership",
    "catalog.payment",
    "catalog.delivery",
    "catalog.contacts",
];

/// Id of the page row, if it exists.
///
/// # Errors
///
/// Returns `sqlx::Error` if the query fails.
pub async fn page_id<'e>(
    executor: impl PgExecutor<'e>,
    table: &str,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT id FROM {table} ORDER BY id LIMIT 1"))
        .fetch_optional(executor)
        .await
}

/// Lock the page row for the rest of the transaction and check its version.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the page row is missing and
/// `RepositoryError::Conflict` if `expected_version` is stale.
pub async fn lock_page(
    conn: &mut PgConnection,
    table: &str,
    expected_version: Option<i32>,
) -> Result<i32, RepositoryError> {
    let row: Option<(i32, i32)> = sqlx::query_as(&format!(
        "SELECT id, version FROM {table} ORDER BY id LIMIT 1 FOR UPDATE"
    ))
    .fetch_optional(&mut *conn)
    .await?;

    let (id, version) = row.ok_or(RepositoryError::NotFound)?;
    check_version(expected_version, version)?;
    Ok(id)
}

/// Block concurrent creators and fail if the page row already exists.
///
/// The table lock is released at COMMIT/ROLLBACK, so two racing `create`
/// calls cannot both insert.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if a row exists.
pub async fn ensure_absent(conn: &mut PgConnection, table: &str) -> Result<(), RepositoryError> {
    sqlx::query(&format!("LOCK TABLE {table} IN SHARE ROW EXCLUSIVE MODE"))
        .execute(&mut *conn)
        .await?;

    if page_id(&mut *conn, table).await?.is_some() {
        return Err(RepositoryError::Conflict(format!(
            "{table} already has its page row"
        )));
    }
    Ok(())
}

/// Await a page write and settle the files it touched.
///
/// On success the returned URLs (rows deleted by the write) are removed from
/// disk; on failure this request's `uploads` are removed instead, so a failed
/// write leaves no orphans.
///
/// # Errors
///
/// Returns the write's error.
pub async fn settle_files<F>(
    files: &FileStore,
    uploads: &[StoredFile],
    write: F,
) -> Result<(), RepositoryError>
where
    F: Future<Output = Result<Vec<String>, RepositoryError>>,
{
    match write.await {
        Ok(removed) => {
            files.cleanup(&removed).await;
            Ok(())
        }
        Err(e) => {
            files.discard(uploads).await;
            Err(e)
        }
    }
}
