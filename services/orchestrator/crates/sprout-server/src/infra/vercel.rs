//! Vercel adapter for the `DeploymentConfig` port.
//!
//! Secret bindings are preview-target environment variables scoped to one
//! git branch, so a prototype's database credentials are visible only to
//! that branch's preview deployments. Deployment status is read from the
//! most recent deployment for the branch.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use sprout_common::DeploymentState;

use crate::application::ports::{Deployment, DeploymentConfig};
use crate::domain::Secret;

pub struct VercelClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    project_id: String,
    team_id: Option<String>,
}

impl VercelClient {
    #[must_use]
    pub fn new(
        api_base: String,
        token: String,
        project_id: String,
        team_id: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            token,
            project_id,
            team_id,
        }
    }

    fn with_team(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.team_id {
            Some(team) => builder.query(&[("teamId", team.as_str())]),
            None => builder,
        }
    }
}

#[async_trait]
impl DeploymentConfig for VercelClient {
    async fn bind_secret(&self, branch: &str, key: &str, value: &Secret) -> Result<String> {
        let url = format!("{}/v10/projects/{}/env", self.api_base, self.project_id);
        let response = self
            .with_team(self.http.post(&url))
            .bearer_auth(&self.token)
            .json(&json!({
                "key": key,
                "value": value.reveal(),
                "type": "encrypted",
                "target": ["preview"],
                "gitBranch": branch,
            }))
            .send()
            .await
            .context("binding preview secret")?;
        let status = response.status();
        if !status.is_success() {
            bail!("vercel returned {status} for env creation");
        }
        let created: CreatedEnv = response
            .json()
            .await
            .context("decoding env-creation response")?;
        Ok(created.created.id)
    }

    async fn unbind_secret(&self, binding_id: &str) -> Result<()> {
        let url = format!(
            "{}/v9/projects/{}/env/{binding_id}",
            self.api_base, self.project_id
        );
        let response = self
            .with_team(self.http.delete(&url))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("removing preview secret")?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            bail!("vercel returned {status} for env deletion");
        }
        Ok(())
    }

    async fn deployment_status(&self, branch: &str) -> Result<Deployment> {
        let url = format!("{}/v6/deployments", self.api_base);
        let response = self
            .with_team(self.http.get(&url))
            .bearer_auth(&self.token)
            .query(&[
                ("projectId", self.project_id.as_str()),
                ("gitBranch", branch),
                ("limit", "1"),
            ])
            .send()
            .await
            .context("listing deployments")?;
        let status = response.status();
        if !status.is_success() {
            bail!("vercel returned {status} for deployment listing");
        }
        let listing: DeploymentListing = response
            .json()
            .await
            .context("decoding deployment listing")?;
        let Some(latest) = listing.deployments.into_iter().next() else {
            return Ok(Deployment {
                state: DeploymentState::NotFound,
                url: None,
            });
        };
        let state = map_state(latest.state.as_deref());
        let url = latest.url.map(|host| format!("https://{host}"));
        Ok(Deployment { state, url })
    }
}

fn map_state(state: Option<&str>) -> DeploymentState {
    match state {
        Some("READY") => DeploymentState::Ready,
        Some("QUEUED" | "INITIALIZING") => DeploymentState::Queued,
        Some("BUILDING") => DeploymentState::Building,
        Some("CANCELED") => DeploymentState::Canceled,
        Some("ERROR") | None => DeploymentState::Error,
        Some(other) => {
            tracing::debug!(state = other, "unrecognized deployment state");
            DeploymentState::Error
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreatedEnv {
    created: EnvBody,
}

#[derive(Deserialize)]
struct EnvBody {
    id: String,
}

#[derive(Deserialize)]
struct DeploymentListing {
    deployments: Vec<DeploymentBody>,
}

#[derive(Deserialize)]
struct DeploymentBody {
    state: Option<String>,
    url: Option<String>,
}
