//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! showcase-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Migrations live in `crates/server/migrations/`. The last one seeds a row
//! for every singleton content page, so a migrated database serves all pages
//! without a separate seed step.

use super::{CommandError, connect};

/// Apply every pending migration.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is missing, the connection fails, or a
/// migration fails to apply.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
