use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

/// Where users, rated images, sessions and blobs are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL for records and blob chunks, Redis for sessions.
    Postgres,
    /// Process-local maps. Nothing survives a restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown storage backend '{other}' (expected postgres or memory)"),
        }
    }
}

/// Who may upload rated images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatedUploadPolicy {
    /// A valid session is required and the record is owned by its user.
    RequireSession,
    /// Anyone may upload. Without a session the blob is stored but no
    /// rated-image record is created, since a record needs an owner.
    Anonymous,
}

impl FromStr for RatedUploadPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::RequireSession),
            "anonymous" => Ok(Self::Anonymous),
            other => anyhow::bail!("unknown rated image upload policy '{other}' (expected session or anonymous)"),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug)]
pub struct Argon2Settings {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 3,
            parallelism: 6,
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// Which store implementations to construct at startup.
    pub storage_backend: StorageBackend,
    /// The URL of the PostgreSQL database. Required for the Postgres backend.
    pub database_url: Option<String>,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// Whether every authenticated request pushes the session expiry forward.
    pub session_sliding_expiry: bool,
    /// Key used to derive session store keys from client-held identifiers.
    pub session_secret: Zeroizing<Vec<u8>>,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Size of each stored blob chunk, in bytes.
    pub blob_chunk_size: usize,
    /// Access policy for `POST /rated-image`.
    pub rated_upload_policy: RatedUploadPolicy,
    /// Origins allowed to make credentialed cross-origin requests.
    pub cors_allowed_origins: Vec<String>,
    /// Address the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// Whether cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
    /// Password hashing cost.
    pub argon2: Argon2Settings,
}

/// Reads an optional variable and parses it, falling back to `default`.
fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid {key}")),
        Err(_) => Ok(default),
    }
}

fn positive_days(days: i64) -> Result<i64> {
    if days <= 0 {
        anyhow::bail!("SESSION_DURATION_DAYS must be greater than 0");
    }
    Ok(days)
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut secret_hex = env::var("SESSION_SECRET")
            .context("SESSION_SECRET must be set (generate with: openssl rand -hex 32)")?;

        let secret_bytes = hex::decode(secret_hex.trim())
            .context("SESSION_SECRET must be valid hexadecimal")?;

        secret_hex.zeroize();

        if secret_bytes.len() != 32 {
            anyhow::bail!("SESSION_SECRET must be exactly 32 bytes (64 hex characters)");
        }

        let storage_backend: StorageBackend = parse_var("STORAGE_BACKEND", StorageBackend::Postgres)?;

        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let max_upload_bytes: usize = parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        if max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be greater than 0");
        }

        let session_duration_days = positive_days(parse_var("SESSION_DURATION_DAYS", 7)?)?;

        let blob_chunk_size: usize = parse_var("BLOB_CHUNK_SIZE_BYTES", 255 * 1024)?;
        if blob_chunk_size == 0 {
            anyhow::bail!("BLOB_CHUNK_SIZE_BYTES must be greater than 0");
        }

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:4000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let host: IpAddr = parse_var("BIND_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_var("PORT", 3000)?;

        let defaults = Argon2Settings::default();

        Ok(Self {
            storage_backend,
            database_url,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            session_duration_days,
            session_sliding_expiry: parse_var("SESSION_SLIDING_EXPIRY", false)?,
            session_secret: Zeroizing::new(secret_bytes),
            max_upload_bytes,
            blob_chunk_size,
            rated_upload_policy: parse_var("RATED_IMAGE_UPLOAD_POLICY", RatedUploadPolicy::RequireSession)?,
            cors_allowed_origins,
            bind_addr: SocketAddr::new(host, port),
            secure_cookies: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
            argon2: Argon2Settings {
                memory_kib: parse_var("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
                iterations: parse_var("ARGON2_ITERATIONS", defaults.iterations)?,
                parallelism: parse_var("ARGON2_PARALLELISM", defaults.parallelism)?,
            },
        })
    }

    /// Session lifetime in seconds.
    pub fn session_ttl_secs(&self) -> u64 {
        (self.session_duration_days.max(0) as u64) * 86400
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_known_names() {
        assert_eq!("postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert_eq!(" Memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn session_duration_must_be_positive() {
        assert_eq!(positive_days(7).unwrap(), 7);
        assert!(positive_days(0).is_err());
        assert!(positive_days(-3).is_err());
    }

    #[test]
    fn rated_upload_policy_parses_known_names() {
        assert_eq!(
            "session".parse::<RatedUploadPolicy>().unwrap(),
            RatedUploadPolicy::RequireSession
        );
        assert_eq!(
            "ANONYMOUS".parse::<RatedUploadPolicy>().unwrap(),
            RatedUploadPolicy::Anonymous
        );
        assert!("open".parse::<RatedUploadPolicy>().is_err());
    }
}
