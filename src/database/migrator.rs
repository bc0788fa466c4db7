//! # Database Migration Support
//!
//! Embedded migrations from the crate's `migrations/` directory.
//!
//! ```rust,ignore
//! #[sqlx::test(migrator = "livescore_poller::database::migrator::MIGRATOR")]
//! async fn test_something(pool: PgPool) { /* ... */ }
//! ```

use sqlx::PgPool;
use tracing::info;

use crate::error::PollerResult;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply all pending migrations.
pub async fn run_migrations(pool: &PgPool) -> PollerResult<()> {
    info!("Running database migrations");
    MIGRATOR.run(pool).await?;
    info!("Database migrations complete");
    Ok(())
}
