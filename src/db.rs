use anyhow::{Context, Result};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::{error::SqlState, NoTls};

/// Tables backing the credential store, rated images and the blob bucket.
///
/// `rated_images.user_id` deliberately has no foreign key: ownership is
/// assumed, not enforced.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT NOT NULL DEFAULT '',
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    profile_image TEXT,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS rated_images (
    id         UUID PRIMARY KEY,
    user_id    UUID NOT NULL,
    blob_name  TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS rated_images_created_at_idx
    ON rated_images (created_at DESC);

CREATE TABLE IF NOT EXISTS blob_files (
    id          UUID PRIMARY KEY,
    filename    TEXT NOT NULL UNIQUE,
    length      BIGINT NOT NULL,
    chunk_size  INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    upload_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS blob_chunks (
    files_id UUID NOT NULL REFERENCES blob_files (id) ON DELETE CASCADE,
    n        INTEGER NOT NULL,
    data     BYTEA NOT NULL,
    PRIMARY KEY (files_id, n)
);
"#;

/// Creates a new database connection pool.
pub fn create_pool(database_url: &str) -> Result<Pool> {
    let mut cfg = Config::new();
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .context("DATABASE_URL is not a valid PostgreSQL connection string")?;

    if let Some(host) = pg_config.get_hosts().first() {
        if let tokio_postgres::config::Host::Tcp(hostname) = host {
            cfg.host = Some(hostname.to_string());
        }
    }

    if let Some(port) = pg_config.get_ports().first() {
        cfg.port = Some(*port);
    }

    if let Some(dbname) = pg_config.get_dbname() {
        cfg.dbname = Some(dbname.to_string());
    }

    if let Some(user) = pg_config.get_user() {
        cfg.user = Some(user.to_string());
    }

    if let Some(password) = pg_config.get_password() {
        cfg.password = Some(String::from_utf8_lossy(password).to_string());
    }

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    cfg.pool = Some(PoolConfig {
        max_size: 32,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(2)),
            recycle: Some(Duration::from_secs(1)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create PostgreSQL pool")
}

/// Creates the tables if they do not exist yet.
pub async fn init_schema(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get a PostgreSQL connection for schema setup")?;
    client
        .batch_execute(SCHEMA)
        .await
        .context("Failed to create database schema")?;
    Ok(())
}

/// Whether `e` is a unique-constraint violation.
pub fn is_unique_violation(e: &tokio_postgres::Error) -> bool {
    e.code() == Some(&SqlState::UNIQUE_VIOLATION)
}
