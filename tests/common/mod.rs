#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

pub const JWT_SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // In-memory store: DATABASE_URL is removed so a developer .env cannot leak in
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_devconnector-api"));
        cmd.env("PORT", port.to_string())
            .env("HOST", "127.0.0.1")
            .env("APP_ENV", "development")
            .env("JWT_SECRET", JWT_SECRET)
            .env("DATABASE_URL", "")
            .env("GITHUB_API_BASE", "http://127.0.0.1:1")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Unique address so tests sharing one server never collide
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix.to_lowercase(), uuid::Uuid::new_v4().simple())
}

/// Register a fresh user and return its token
pub async fn register(client: &reqwest::Client, server: &TestServer, name: &str) -> Result<String> {
    let resp = client
        .post(server.url("/api/users"))
        .json(&json!({ "name": name, "email": unique_email(name), "password": "secret1" }))
        .send()
        .await?;
    anyhow::ensure!(resp.status() == StatusCode::OK, "register failed: {}", resp.status());
    let body: Value = resp.json().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("register response has no token")
}
