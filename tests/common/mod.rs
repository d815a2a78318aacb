#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};

use once_cell::sync::Lazy;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use zeroize::Zeroizing;

use gallery_backend::{
    config::{Argon2Settings, Config, RatedUploadPolicy, StorageBackend},
    routes::build_router,
    state::AppState,
};

pub const PASSWORD: &str = "secret123";

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Configuration for a throwaway in-memory server.
pub fn test_config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        database_url: None,
        redis_url: String::new(),
        session_duration_days: 1,
        session_sliding_expiry: false,
        session_secret: Zeroizing::new(vec![7u8; 32]),
        max_upload_bytes: 1024,
        blob_chunk_size: 4,
        rated_upload_policy: RatedUploadPolicy::RequireSession,
        cors_allowed_origins: vec!["http://localhost:4000".to_string()],
        bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        secure_cookies: false,
        argon2: Argon2Settings {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
    }
}

// Shared test context
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestContext {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Starts a server on an ephemeral port with a tweaked configuration.
    pub async fn spawn_with(configure: impl FnOnce(&mut Config)) -> Self {
        Lazy::force(&TRACING);

        let mut config = test_config();
        configure(&mut config);

        let state = AppState::new(&config).await.unwrap();
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind(config.bind_addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            client: Self::new_client(),
            base_url: format!("http://{}", addr),
        }
    }

    /// A client with its own cookie jar, i.e. a separate browser.
    pub fn new_client() -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn signup(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/signup"))
            .json(&json!({
                "firstName": "Test",
                "lastName": "User",
                "email": email,
                "password": password
            }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Signs up and logs in with the context's client.
    pub async fn signed_in(&self, email: &str) {
        assert_eq!(self.signup(email, PASSWORD).await.status().as_u16(), 200);
        assert_eq!(self.login(email, PASSWORD).await.status().as_u16(), 200);
    }

    pub async fn upload(&self, path: &str, filename: &str, data: &[u8]) -> reqwest::Response {
        let form = Form::new().part(
            "image",
            Part::bytes(data.to_vec()).file_name(filename.to_string()),
        );
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }
}
