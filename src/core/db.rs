use anyhow::{bail, Context};
use sqlx::any::AnyPoolOptions;
use sqlx::{Any, AnyPool, Transaction};
use tracing::{debug, info};

use crate::config::Config;

/// Database engine behind the pool. The DDL differs only in how ids are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> anyhow::Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            bail!("unsupported DATABASE_URL scheme: {}", url.split(':').next().unwrap_or(url))
        }
    }

    fn id_column(self) -> &'static str {
        match self {
            Backend::Postgres => "id BIGSERIAL PRIMARY KEY",
            Backend::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

/// Shared handler state. Handlers receive it through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub pool: AnyPool,
    pub backend: Backend,
}

impl AppState {
    pub fn new(pool: AnyPool, backend: Backend) -> Self {
        Self { pool, backend }
    }

    /// Opens a transaction for a handler that reads and then writes.
    ///
    /// SQLite takes the write lock up front: two deferred transactions that both
    /// read and then write cannot upgrade their shared locks and fail with
    /// SQLITE_BUSY instead of waiting on the busy timeout.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Any>, sqlx::Error> {
        match self.backend {
            Backend::Sqlite => self.pool.begin_with("BEGIN IMMEDIATE").await,
            Backend::Postgres => self.pool.begin().await,
        }
    }
}

/// Opens the pool and makes sure the schema exists.
pub async fn connect(config: &Config) -> anyhow::Result<AppState> {
    let backend = config.backend()?;
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to open database")?;

    run_migrations(&pool, backend).await?;
    Ok(AppState::new(pool, backend))
}

pub async fn run_migrations(pool: &AnyPool, backend: Backend) -> anyhow::Result<()> {
    let id = backend.id_column();
    let statements = [
        (
            "users",
            format!(
                "CREATE TABLE IF NOT EXISTS users (
                    {id},
                    username VARCHAR(50) NOT NULL,
                    firstname VARCHAR(50) NOT NULL,
                    email VARCHAR(120) NOT NULL UNIQUE
                )"
            ),
        ),
        (
            "follower",
            "CREATE TABLE IF NOT EXISTS follower (
                user_from_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                user_to_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (user_from_id, user_to_id)
            )"
            .to_string(),
        ),
        (
            "posts",
            format!(
                "CREATE TABLE IF NOT EXISTS posts (
                    {id},
                    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL
                )"
            ),
        ),
        (
            "media",
            format!(
                "CREATE TABLE IF NOT EXISTS media (
                    {id},
                    type VARCHAR(16) NOT NULL DEFAULT 'image'
                        CHECK (type IN ('image', 'video', 'audio')),
                    url VARCHAR(255) NOT NULL,
                    post_id BIGINT NOT NULL UNIQUE REFERENCES posts(id) ON DELETE CASCADE
                )"
            ),
        ),
        (
            "comments",
            format!(
                "CREATE TABLE IF NOT EXISTS comments (
                    {id},
                    comment_text TEXT NOT NULL,
                    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    post_id BIGINT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL
                )"
            ),
        ),
    ];

    for (table, ddl) in &statements {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("failed to create {} table", table))?;
        debug!(table, "table ready");
    }

    info!(?backend, "database migrations complete");
    Ok(())
}
