//! Re-seed singleton content pages.
//!
//! Migrations already create one row per page. This command restores rows
//! that were deleted by hand and leaves existing pages untouched.

use super::{CommandError, connect};

/// Insert an empty row for every content page that has none.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is missing or an insert fails.
pub async fn pages() -> Result<(), CommandError> {
    let pool = connect().await?;

    let seeded = showcase_server::db::seed::ensure_page_rows(&pool).await?;

    if seeded.is_empty() {
        tracing::info!("All pages already present, nothing to seed");
    } else {
        tracing::info!(count = seeded.len(), "Seeding complete!");
        for table in seeded {
            tracing::info!("  seeded {table}");
        }
    }

    Ok(())
}
