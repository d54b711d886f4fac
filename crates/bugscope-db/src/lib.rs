//! # bugscope-db
//!
//! Storage layer for bugscope.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL repositories for projects, bug reports and the job queue
//! - An in-memory store implementing the same traits
//!
//! ## Example
//!
//! ```rust,ignore
//! use bugscope_db::{Database, JobRepository, JobType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/bugscope").await?;
//!
//!     if let Some(job) = db.jobs.claim_next(JobType::AnalyzeBug).await? {
//!         println!("Claimed job: {}", job.id);
//!     }
//!     Ok(())
//! }
//! ```
pub mod bugs;
pub mod codec;
pub mod jobs;
pub mod memory;
pub mod pool;
pub mod projects;

// Re-export core types
pub use bugscope_core::*;

// Re-export repository implementations
pub use bugs::PgBugRepository;
pub use jobs::PgJobRepository;
pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use projects::PgProjectRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Project repository.
    pub projects: PgProjectRepository,
    /// Bug report repository.
    pub bugs: PgBugRepository,
    /// Job queue repository.
    pub jobs: PgJobRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            projects: PgProjectRepository::new(pool.clone()),
            bugs: PgBugRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
