//! GitHub adapter for the `VersionControl` port.
//!
//! Branch and commit operations go through the git-data API so a batch of
//! file changes lands as one commit: blobs are uploaded first, then a tree,
//! a commit, and a ref update. Until the ref update lands the branch is
//! untouched, which gives the atomic-batch guarantee the ingest gate needs.
//!
//! Errors carry the HTTP status and the API path only — response bodies may
//! echo request content and are never attached.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sprout_common::FileChange;

use crate::application::ports::{ChangeRequest, VersionControl};

/// Labels attached to every opened change request. Best-effort; a labelling
/// failure does not fail the submission.
const CHANGE_REQUEST_LABELS: &[&str] = &["prototype", "needs-review"];

pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    base_branch: String,
}

impl GithubClient {
    #[must_use]
    pub fn new(
        api_base: String,
        token: String,
        owner: String,
        repo: String,
        base_branch: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            token,
            owner,
            repo,
            base_branch,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{path}", self.api_base, self.owner, self.repo)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "sprout-orchestrator")
    }

    async fn expect_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        path: &str,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            bail!("github returned {status} for {path}");
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("decoding github response for {path}"))
    }

    async fn head_sha(&self, branch: &str) -> Result<String> {
        let path = format!("/git/ref/heads/{branch}");
        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .context("fetching branch ref")?;
        let reference: GitRef = Self::expect_json(response, &path).await?;
        Ok(reference.object.sha)
    }

    async fn commit_tree_sha(&self, commit_sha: &str) -> Result<String> {
        let path = format!("/git/commits/{commit_sha}");
        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .context("fetching commit")?;
        let commit: GitCommit = Self::expect_json(response, &path).await?;
        Ok(commit.tree.sha)
    }

    async fn create_blob(&self, content: &str) -> Result<String> {
        let path = "/git/blobs";
        let response = self
            .request(reqwest::Method::POST, path)
            .json(&json!({
                "content": BASE64.encode(content),
                "encoding": "base64",
            }))
            .send()
            .await
            .context("uploading blob")?;
        let blob: ShaOnly = Self::expect_json(response, path).await?;
        Ok(blob.sha)
    }
}

#[async_trait]
impl VersionControl for GithubClient {
    async fn create_branch(&self, name: &str) -> Result<()> {
        let base_sha = self.head_sha(&self.base_branch).await?;
        let path = "/git/refs";
        let response = self
            .request(reqwest::Method::POST, path)
            .json(&json!({
                "ref": format!("refs/heads/{name}"),
                "sha": base_sha,
            }))
            .send()
            .await
            .context("creating branch ref")?;
        let status = response.status();
        if !status.is_success() {
            bail!("github returned {status} for {path}");
        }
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        let path = format!("/git/refs/heads/{name}");
        let response = self
            .request(reqwest::Method::DELETE, &path)
            .send()
            .await
            .context("deleting branch ref")?;
        let status = response.status();
        // 404/422: the ref is already gone, which is the desired end state.
        if !status.is_success()
            && status != StatusCode::NOT_FOUND
            && status != StatusCode::UNPROCESSABLE_ENTITY
        {
            bail!("github returned {status} for {path}");
        }
        Ok(())
    }

    async fn commit_files(&self, branch: &str, files: &[FileChange], message: &str) -> Result<()> {
        let head = self.head_sha(branch).await?;
        let base_tree = self.commit_tree_sha(&head).await?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let sha = self.create_blob(&file.content).await?;
            entries.push(json!({
                "path": file.path.trim_start_matches('/'),
                "mode": "100644",
                "type": "blob",
                "sha": sha,
            }));
        }

        let tree_path = "/git/trees";
        let response = self
            .request(reqwest::Method::POST, tree_path)
            .json(&json!({ "base_tree": base_tree, "tree": entries }))
            .send()
            .await
            .context("creating tree")?;
        let tree: ShaOnly = Self::expect_json(response, tree_path).await?;

        let commit_path = "/git/commits";
        let response = self
            .request(reqwest::Method::POST, commit_path)
            .json(&json!({
                "message": message,
                "tree": tree.sha,
                "parents": [head],
            }))
            .send()
            .await
            .context("creating commit")?;
        let commit: ShaOnly = Self::expect_json(response, commit_path).await?;

        // The branch only moves here; everything above is invisible staging.
        let ref_path = format!("/git/refs/heads/{branch}");
        let response = self
            .request(reqwest::Method::PATCH, &ref_path)
            .json(&json!({ "sha": commit.sha, "force": false }))
            .send()
            .await
            .context("advancing branch ref")?;
        let status = response.status();
        if !status.is_success() {
            bail!("github returned {status} for {ref_path}");
        }
        Ok(())
    }

    async fn open_change_request(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<ChangeRequest> {
        let path = "/pulls";
        let response = self
            .request(reqwest::Method::POST, path)
            .json(&json!({
                "title": title,
                "body": body,
                "head": branch,
                "base": self.base_branch,
            }))
            .send()
            .await
            .context("opening pull request")?;
        let pull: PullRequest = Self::expect_json(response, path).await?;

        let label_path = format!("/issues/{}/labels", pull.number);
        let labelled = self
            .request(reqwest::Method::POST, &label_path)
            .json(&json!({ "labels": CHANGE_REQUEST_LABELS }))
            .send()
            .await;
        match labelled {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(
                    pull = pull.number,
                    status = %response.status(),
                    "failed to label pull request"
                );
            }
            Err(err) => {
                tracing::warn!(pull = pull.number, error = %err, "failed to label pull request");
            }
        }

        Ok(ChangeRequest {
            number: pull.number,
            url: pull.html_url,
        })
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GitRef {
    object: ShaOnly,
}

#[derive(Deserialize)]
struct GitCommit {
    tree: ShaOnly,
}

#[derive(Serialize, Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct PullRequest {
    number: u64,
    html_url: String,
}
