//! Database operations for the catalog `PostgreSQL` database.
//!
//! # Schema: `catalog`
//!
//! ## Multi-row aggregates
//!
//! - `product` + `product_description_block`, `product_image`
//! - `review`
//! - `order` + `order_item`
//!
//! ## Singleton content pages (seeded by migration)
//!
//! - `company` + `company_description_block`, `company_certificate`
//! - `homepage` + `homepage_carousel_item`
//! - `faq` + `faq_item`
//! - `partnership` + `partnership_block`, `partnership_image`
//! - `payment` + `payment_method`, `payment_description`
//! - `delivery` + `delivery_region`
//! - `contacts` + `contacts_social_link`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p showcase-cli -- migrate
//! ```
//!
//! # Transactions
//!
//! Every write that touches more than one table runs inside
//! [`Storage::with_transaction`]. Repositories hold a reference to a
//! [`Storage`] handle instead of reaching for a global pool.

pub mod children;
pub mod company;
pub mod contacts;
pub mod delivery;
pub mod faq;
pub mod homepage;
pub mod orders;
pub mod partnership;
pub mod payment;
pub mod products;
pub mod reviews;
pub mod seed;
pub mod singleton;

use futures::future::BoxFuture;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use showcase_core::ValidationError;

pub use company::CompanyRepository;
pub use contacts::ContactsRepository;
pub use delivery::DeliveryRepository;
pub use faq::FaqRepository;
pub use homepage::HomepageRepository;
pub use orders::OrderRepository;
pub use partnership::PartnershipRepository;
pub use payment::PaymentRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;

use crate::config::PoolConfig;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Write rejected because the row changed or already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller-supplied content failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Create a `PostgreSQL` connection pool.
///
/// Acquisition waits at most `acquire_timeout`; requests beyond that fail
/// instead of queueing indefinitely.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    config: &PoolConfig,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url.expose_secret())
        .await
}

/// Handle to the connection pool with a scoped-transaction primitive.
///
/// Cloning is cheap; the pool is reference counted.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for single-statement reads.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `unit_of_work` inside one BEGIN/COMMIT boundary.
    ///
    /// Commits when the unit of work returns `Ok`, rolls back and returns the
    /// error when it returns `Err`. The connection goes back to the pool on
    /// every exit path, including a panic inside the unit of work (the
    /// transaction guard rolls back on drop).
    ///
    /// The unit of work only receives a connection, so it cannot open a nested
    /// transaction through this handle.
    ///
    /// # Errors
    ///
    /// Returns the unit of work's error, or a database error from BEGIN/COMMIT.
    pub async fn with_transaction<T, E, F>(&self, unit_of_work: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<sqlx::Error> + std::fmt::Display + Send,
    {
        let mut tx = self.pool.begin().await?;

        match unit_of_work(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rolling back transaction");
                if let Err(rollback_err) = tx.rollback().await {
                    // The connection is discarded by the pool; the original
                    // error is the one worth reporting.
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// Fail with `Conflict` when the caller saw an older version of the row.
///
/// `None` means the caller did not ask for a check (last write wins).
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` on a version mismatch.
pub fn check_version(expected: Option<i32>, actual: i32) -> Result<(), RepositoryError> {
    match expected {
        Some(expected) if expected != actual => Err(RepositoryError::Conflict(format!(
            "record was modified (expected version {expected}, found {actual})"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_check_version_skipped_without_expectation() {
        assert!(check_version(None, 7).is_ok());
    }

    #[test]
    fn test_check_version_matches() {
        assert!(check_version(Some(3), 3).is_ok());
    }

    #[test]
    fn test_check_version_conflict() {
        let err = check_version(Some(2), 3).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(err.to_string().contains("expected version 2, found 3"));
    }

    #[test]
    fn test_validation_error_converts() {
        let err: RepositoryError = ValidationError::required("title").into();
        assert_eq!(err.to_string(), "validation failed: title is required");
    }
}
