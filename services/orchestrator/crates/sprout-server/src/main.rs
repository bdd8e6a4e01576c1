//! Orchestrator entry point.
//!
//! Initialises tracing, loads configuration from `SPROUT_*` environment
//! variables, wires the provider clients into the application state, and
//! serves the HTTP API until SIGINT.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use sprout_server::api::{AppState, router};
use sprout_server::application::locks::PrototypeLocks;
use sprout_server::domain::BranchNamer;
use sprout_server::infra::github::GithubClient;
use sprout_server::infra::memory::InMemoryPrototypeStore;
use sprout_server::infra::neon::NeonClient;
use sprout_server::infra::vercel::VercelClient;

/// Server configuration loaded from environment variables via `envy`.
///
/// Each field maps to `SPROUT_<FIELD>`:
///   - `SPROUT_LISTEN_ADDR`            (default `0.0.0.0:8080`)
///   - `SPROUT_GITHUB_API_BASE`        (default `https://api.github.com`)
///   - `SPROUT_GITHUB_TOKEN`           (required)
///   - `SPROUT_GITHUB_OWNER`           (required)
///   - `SPROUT_GITHUB_REPO`            (required)
///   - `SPROUT_GITHUB_BASE_BRANCH`     (default `main`)
///   - `SPROUT_NEON_API_BASE`          (default `https://console.neon.tech/api/v2`)
///   - `SPROUT_NEON_API_KEY`           (required)
///   - `SPROUT_NEON_PROJECT_ID`        (required)
///   - `SPROUT_NEON_PARENT_BRANCH_ID`  (required)
///   - `SPROUT_VERCEL_API_BASE`        (default `https://api.vercel.com`)
///   - `SPROUT_VERCEL_TOKEN`           (required)
///   - `SPROUT_VERCEL_PROJECT_ID`      (required)
///   - `SPROUT_VERCEL_TEAM_ID`         (optional)
///   - `SPROUT_DATABASE_URL_KEY`       (default `DATABASE_URL`)
///   - `SPROUT_AGENT_WEBHOOK_SECRET`   (optional, disables the check when unset)
#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default = "default_listen_addr")]
    listen_addr: String,

    #[serde(default = "default_github_api_base")]
    github_api_base: String,
    github_token: String,
    github_owner: String,
    github_repo: String,
    #[serde(default = "default_base_branch")]
    github_base_branch: String,

    #[serde(default = "default_neon_api_base")]
    neon_api_base: String,
    neon_api_key: String,
    neon_project_id: String,
    neon_parent_branch_id: String,

    #[serde(default = "default_vercel_api_base")]
    vercel_api_base: String,
    vercel_token: String,
    vercel_project_id: String,
    vercel_team_id: Option<String>,

    /// Env-var key the database connection string is bound under on
    /// preview deployments.
    #[serde(default = "default_database_url_key")]
    database_url_key: String,

    agent_webhook_secret: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_neon_api_base() -> String {
    "https://console.neon.tech/api/v2".to_string()
}

fn default_vercel_api_base() -> String {
    "https://api.vercel.com".to_string()
}

fn default_database_url_key() -> String {
    "DATABASE_URL".to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("sprout-server starting");

    let config: Config = envy::prefixed("SPROUT_").from_env().context(
        "failed to load config from SPROUT_* env vars \
             (GitHub, Neon, and Vercel credentials are required)",
    )?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        github_repo = %format!("{}/{}", config.github_owner, config.github_repo),
        base_branch = %config.github_base_branch,
        neon_project = %config.neon_project_id,
        vercel_project = %config.vercel_project_id,
        webhook_auth = config.agent_webhook_secret.is_some(),
        "configuration loaded",
    );

    let state = Arc::new(AppState {
        vcs: GithubClient::new(
            config.github_api_base,
            config.github_token,
            config.github_owner,
            config.github_repo,
            config.github_base_branch,
        ),
        db: NeonClient::new(
            config.neon_api_base,
            config.neon_api_key,
            config.neon_project_id,
            config.neon_parent_branch_id,
        ),
        deploy: VercelClient::new(
            config.vercel_api_base,
            config.vercel_token,
            config.vercel_project_id,
            config.vercel_team_id,
        ),
        store: InMemoryPrototypeStore::new(),
        locks: PrototypeLocks::new(),
        namer: BranchNamer::new(),
        database_url_key: config.database_url_key,
        agent_webhook_secret: config.agent_webhook_secret,
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .context("failed to bind TCP listener")?;

    tracing::info!("orchestrator ready — http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("sprout-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
        return;
    }
    tracing::info!("received shutdown signal");
}
