#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

use archery_api::config::AppConfig;
use archery_api::seed::{self, UserSpec};
use archery_api::store::{MemoryStore, Store};
use archery_api::{app, AppState};

pub const ADMIN: (&str, &str) = ("admin", "archery-admin");
pub const MEMBER: (&str, &str) = ("robin", "longbow-123");

/// One server per test, running in the test's own runtime on a free port
/// over a fresh in-memory store.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub store: Arc<dyn Store>,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(configure: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("archery_api=warn"))
            .with_test_writer()
            .try_init();

        let mut config = AppConfig::development();
        config.auth.password_hash_cost = 4;
        configure(&mut config);

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        seed::create_user(&*store, 4, UserSpec::admin(ADMIN.0, ADMIN.1)).await?;
        seed::create_user(
            &*store,
            4,
            UserSpec {
                username: MEMBER.0.to_string(),
                email: Some("robin@example.com".to_string()),
                password: MEMBER.1.to_string(),
                is_staff: false,
                is_superuser: false,
            },
        )
        .await?;

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let router = app(AppState::new(config, store.clone()));
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let test_app = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: Client::new(),
            store,
        };
        test_app.wait_ready(Duration::from_secs(10)).await?;
        Ok(test_app)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.client.patch(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// `{access, refresh}` for `credentials`.
    pub async fn tokens(&self, credentials: (&str, &str)) -> Result<Value> {
        let res = self
            .post("/api/token/")
            .json(&json!({ "username": credentials.0, "password": credentials.1 }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "token request failed: {}", res.status());
        Ok(res.json().await?)
    }

    pub async fn access_token(&self, credentials: (&str, &str)) -> Result<String> {
        let tokens = self.tokens(credentials).await?;
        tokens["access"]
            .as_str()
            .map(str::to_string)
            .context("missing access token")
    }

    pub async fn create_archer(&self, token: &str, body: Value) -> Result<Value> {
        let res = self.post("/archers/").bearer_auth(token).json(&body).send().await?;
        expect_status(res, StatusCode::CREATED).await
    }

    pub async fn create_club(&self, token: &str, body: Value) -> Result<Value> {
        let res = self.post("/clubs/").bearer_auth(token).json(&body).send().await?;
        expect_status(res, StatusCode::CREATED).await
    }
}

/// The JSON body of `res`, failing with the body text when the status differs.
pub async fn expect_status(res: Response, status: StatusCode) -> Result<Value> {
    let actual = res.status();
    let text = res.text().await?;
    anyhow::ensure!(actual == status, "expected {}, got {}: {}", status, actual, text);
    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}
