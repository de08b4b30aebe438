//! Subcommand implementations.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use showcase_server::config::PoolConfig;
use showcase_server::db;
use sqlx::PgPool;

/// Errors shared by commands that talk to the database.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] db::RepositoryError),
}

/// Connect to the database named by `DATABASE_URL`.
///
/// A single connection is enough for one-shot commands.
async fn connect() -> Result<PgPool, CommandError> {
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    let pool_config = PoolConfig {
        max_connections: 1,
        min_connections: 0,
        ..PoolConfig::default()
    };

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url, &pool_config).await?)
}
