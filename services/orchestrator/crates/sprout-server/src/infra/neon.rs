//! Neon adapter for the `DatabaseBranches` port.
//!
//! Branches are created under a fixed parent branch configured at startup.
//! Neon populates the connection URI asynchronously, so `create_branch`
//! returns whatever the creation response carried and the saga polls
//! `connection_string` for the rest.
//!
//! Connection URIs are credentials: they go straight into [`Secret`] and
//! never into logs or error messages.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::application::ports::{DatabaseBranch, DatabaseBranches};
use crate::domain::Secret;

pub struct NeonClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    project_id: String,
    parent_branch_id: String,
}

impl NeonClient {
    #[must_use]
    pub fn new(
        api_base: String,
        api_key: String,
        project_id: String,
        parent_branch_id: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            api_key,
            project_id,
            parent_branch_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/projects/{}{path}", self.api_base, self.project_id)
    }
}

#[async_trait]
impl DatabaseBranches for NeonClient {
    async fn create_branch(&self, name: &str) -> Result<DatabaseBranch> {
        let path = "/branches";
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "branch": { "name": name, "parent_id": self.parent_branch_id },
                "endpoints": [{ "type": "read_write" }],
            }))
            .send()
            .await
            .context("creating database branch")?;
        let status = response.status();
        if !status.is_success() {
            bail!("neon returned {status} for {path}");
        }
        let created: CreatedBranch = response
            .json()
            .await
            .context("decoding branch-creation response")?;
        Ok(DatabaseBranch {
            branch_id: created.branch.id,
            connection_string: created
                .connection_uris
                .into_iter()
                .flatten()
                .next()
                .map(|c| Secret::new(c.connection_uri)),
        })
    }

    async fn connection_string(&self, branch_id: &str) -> Result<Secret> {
        let path = format!("/connection_uri?branch_id={branch_id}&database_name=neondb&role_name=neondb_owner");
        let response = self
            .http
            .get(self.url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("resolving connection uri")?;
        let status = response.status();
        if !status.is_success() {
            bail!("neon returned {status} for /connection_uri");
        }
        let uri: ConnectionUri = response
            .json()
            .await
            .context("decoding connection-uri response")?;
        Ok(Secret::new(uri.uri))
    }

    async fn delete_branch(&self, branch_id: &str) -> Result<()> {
        let path = format!("/branches/{branch_id}");
        let response = self
            .http
            .delete(self.url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("deleting database branch")?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            bail!("neon returned {status} for /branches/{{id}}");
        }
        Ok(())
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreatedBranch {
    branch: BranchBody,
    #[serde(default)]
    connection_uris: Option<Vec<ConnectionUriBody>>,
}

#[derive(Deserialize)]
struct BranchBody {
    id: String,
}

#[derive(Deserialize)]
struct ConnectionUriBody {
    connection_uri: String,
}

#[derive(Deserialize)]
struct ConnectionUri {
    uri: String,
}
