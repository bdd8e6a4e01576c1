//! Shared stub ports for application-service tests.
//!
//! Stubs record every call so tests can assert ordering and compensation;
//! `fail_*` flags inject failures at specific saga steps.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sprout_common::{DeploymentState, FileChange};

use crate::application::ports::{
    ChangeRequest, DatabaseBranch, DatabaseBranches, Deployment, DeploymentConfig, VersionControl,
};
use crate::domain::Secret;
use crate::infra::memory::InMemoryPrototypeStore;

/// Fresh in-memory store (the real infra impl doubles as the test store).
pub fn mem_store() -> InMemoryPrototypeStore {
    InMemoryPrototypeStore::new()
}

// ── Version control ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StubVcs {
    pub fail_create: bool,
    pub fail_delete: bool,
    pub fail_commit: bool,
    pub fail_open: bool,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    /// (branch, file count, message) per commit.
    pub commits: Mutex<Vec<(String, usize, String)>>,
    /// (branch, title) per opened change request.
    pub opened: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl VersionControl for StubVcs {
    async fn create_branch(&self, name: &str) -> Result<()> {
        anyhow::ensure!(!self.fail_create, "simulated branch-create failure");
        self.created.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        anyhow::ensure!(!self.fail_delete, "simulated branch-delete failure");
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn commit_files(&self, branch: &str, files: &[FileChange], message: &str) -> Result<()> {
        anyhow::ensure!(!self.fail_commit, "simulated commit failure");
        self.commits
            .lock()
            .unwrap()
            .push((branch.to_string(), files.len(), message.to_string()));
        Ok(())
    }

    async fn open_change_request(
        &self,
        branch: &str,
        title: &str,
        _body: &str,
    ) -> Result<ChangeRequest> {
        anyhow::ensure!(!self.fail_open, "simulated change-request failure");
        self.opened
            .lock()
            .unwrap()
            .push((branch.to_string(), title.to_string()));
        Ok(ChangeRequest {
            number: 7,
            url: "https://vcs.example.test/pull/7".to_string(),
        })
    }
}

// ── Database branches ─────────────────────────────────────────────────────────

pub struct StubDb {
    pub fail_create: bool,
    /// When true (default), `create_branch` returns the connection string
    /// synchronously; when false, resolution must poll.
    pub connection_on_create: bool,
    /// `connection_string` succeeds on this call number (1-based).
    pub resolve_after_attempts: u32,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub resolve_calls: Mutex<u32>,
}

impl Default for StubDb {
    fn default() -> Self {
        Self {
            fail_create: false,
            connection_on_create: true,
            resolve_after_attempts: 1,
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            resolve_calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl DatabaseBranches for StubDb {
    async fn create_branch(&self, name: &str) -> Result<DatabaseBranch> {
        anyhow::ensure!(!self.fail_create, "simulated db-branch failure");
        self.created.lock().unwrap().push(name.to_string());
        Ok(DatabaseBranch {
            branch_id: "br-1".to_string(),
            connection_string: self
                .connection_on_create
                .then(|| Secret::new("postgres://preview.example.test/db")),
        })
    }

    async fn connection_string(&self, _branch_id: &str) -> Result<Secret> {
        let mut calls = self.resolve_calls.lock().unwrap();
        *calls += 1;
        anyhow::ensure!(*calls >= self.resolve_after_attempts, "not ready yet");
        Ok(Secret::new("postgres://preview.example.test/db"))
    }

    async fn delete_branch(&self, branch_id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(branch_id.to_string());
        Ok(())
    }
}

// ── Deployment config ─────────────────────────────────────────────────────────

pub struct StubDeploy {
    pub fail_bind: bool,
    pub fail_status: bool,
    pub deployment: Deployment,
    /// (branch, key) per bound secret.
    pub bound: Mutex<Vec<(String, String)>>,
    pub unbound: Mutex<Vec<String>>,
}

impl Default for StubDeploy {
    fn default() -> Self {
        Self {
            fail_bind: false,
            fail_status: false,
            deployment: Deployment {
                state: DeploymentState::Ready,
                url: Some("https://preview.example.test".to_string()),
            },
            bound: Mutex::new(Vec::new()),
            unbound: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DeploymentConfig for StubDeploy {
    async fn bind_secret(&self, branch: &str, key: &str, _value: &Secret) -> Result<String> {
        anyhow::ensure!(!self.fail_bind, "simulated bind failure");
        self.bound
            .lock()
            .unwrap()
            .push((branch.to_string(), key.to_string()));
        Ok("env-1".to_string())
    }

    async fn unbind_secret(&self, binding_id: &str) -> Result<()> {
        self.unbound.lock().unwrap().push(binding_id.to_string());
        Ok(())
    }

    async fn deployment_status(&self, _branch: &str) -> Result<Deployment> {
        anyhow::ensure!(!self.fail_status, "simulated status failure");
        Ok(self.deployment.clone())
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Store whose every operation fails — exercises the persist step and the
/// tombstone swallow path.
pub struct FailingStore;

#[async_trait]
impl crate::application::ports::PrototypeStore for FailingStore {
    async fn insert(&self, _prototype: crate::domain::Prototype) -> Result<()> {
        anyhow::bail!("simulated store failure")
    }

    async fn get(&self, _id: &str) -> Result<Option<crate::domain::Prototype>> {
        anyhow::bail!("simulated store failure")
    }

    async fn update(&self, _prototype: &crate::domain::Prototype) -> Result<()> {
        anyhow::bail!("simulated store failure")
    }

    async fn find_by_agent_project(
        &self,
        _project_id: &str,
    ) -> Result<Option<crate::domain::Prototype>> {
        anyhow::bail!("simulated store failure")
    }

    async fn find_by_change_request(
        &self,
        _number: u64,
    ) -> Result<Option<crate::domain::Prototype>> {
        anyhow::bail!("simulated store failure")
    }

    async fn list_by_owner(
        &self,
        _owner_id: &str,
        _status: Option<sprout_common::PrototypeStatus>,
        _search: Option<&str>,
    ) -> Result<Vec<crate::domain::Prototype>> {
        anyhow::bail!("simulated store failure")
    }
}
