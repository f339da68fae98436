//! SQLite persistence layer for the Reco assistant.
//!
//! This crate provides async database operations for users, the credit
//! ledger, and mirrored conversation messages using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{Database, models::UserRow, user};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:reco.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let row = UserRow {
//!         id: "c27fb365-0c84-4cf2-8555-814bb065e448".to_string(),
//!         phone_e164: "+34600000001".to_string(),
//!         credits_cents: 300,
//!         message_count: 0,
//!         lang: "es".to_string(),
//!         is_blocked: false,
//!         created_at: String::new(),
//!     };
//!     user::create_user(db.pool(), &row).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod conversation;
pub mod error;
pub mod ledger;
pub mod models;
pub mod user;

pub use error::{DatabaseError, Result};
pub use models::{LedgerRow, MessageRow, UserRow};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `sqlite::memory:` for an in-memory database (testing).
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up
    /// to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
