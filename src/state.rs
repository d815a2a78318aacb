use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::{
    config::{Config, StorageBackend},
    crypto::{password::CredentialHasher, token::SessionKeys},
    repositories::{
        memory::{MemoryRatedImageStore, MemorySessionStore, MemoryUserStore},
        rated_image::{PgRatedImageStore, RatedImageStore},
        session::{RedisSessionStore, SessionStore},
        user::{PgUserStore, UserStore},
    },
    services::{
        auth::{AuthGate, SessionPolicy},
        download::DownloadPipeline,
        upload::UploadPipeline,
    },
    storage::{blob::BlobStore, memory::MemoryBlobStore, postgres::PgBlobStore},
};

/// The store implementations the application runs on.
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub rated_images: Arc<dyn RatedImageStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Stores {
    /// Process-local stores. Nothing survives a restart.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            users: Arc::new(MemoryUserStore::new()),
            rated_images: Arc::new(MemoryRatedImageStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            blobs: Arc::new(MemoryBlobStore::new(config.blob_chunk_size)),
        }
    }

    /// PostgreSQL for records and blobs, Redis for sessions.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set when STORAGE_BACKEND=postgres"))?;

        let db = crate::db::create_pool(database_url)?;
        crate::db::init_schema(&db).await?;
        tracing::info!("PostgreSQL pool initialized and schema ready");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("Redis connection manager initialized");

        Ok(Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            rated_images: Arc::new(PgRatedImageStore::new(db.clone())),
            sessions: Arc::new(RedisSessionStore::new(redis)),
            blobs: Arc::new(PgBlobStore::new(db, config.blob_chunk_size)),
        })
    }
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    pub auth: AuthGate,
    pub uploads: UploadPipeline,
    pub downloads: DownloadPipeline,
    pub rated_images: Arc<dyn RatedImageStore>,
}

impl AppState {
    /// Creates a new `AppState` on the backend named by the configuration.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let stores = match config.storage_backend {
            StorageBackend::Postgres => Stores::connect(config).await?,
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Stores::in_memory(config)
            }
        };
        Self::with_stores(config, stores)
    }

    /// Wires the services on top of the given stores.
    pub fn with_stores(config: &Config, stores: Stores) -> anyhow::Result<Self> {
        let hasher = CredentialHasher::new(config.argon2)?;
        let keys = SessionKeys::new(&config.session_secret)?;

        let auth = AuthGate::new(
            stores.users.clone(),
            stores.sessions,
            hasher,
            keys,
            SessionPolicy {
                ttl_secs: config.session_ttl_secs(),
                sliding: config.session_sliding_expiry,
            },
        );

        let uploads = UploadPipeline::new(
            stores.blobs.clone(),
            stores.users,
            stores.rated_images.clone(),
            config.max_upload_bytes,
        );

        Ok(AppState {
            config: Arc::new(config.clone()),
            auth,
            uploads,
            downloads: DownloadPipeline::new(stores.blobs),
            rated_images: stores.rated_images,
        })
    }
}
