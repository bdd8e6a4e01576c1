//! Port trait definitions for the application layer.
//!
//! Ports are the capability contracts that infrastructure must fulfill.
//! Each external system is an isolated capability behind an injected value
//! — never a module-level singleton — and the orchestrator never assumes
//! two of them share a transaction. This file imports only from
//! `crate::domain`.
//!
//! Traits use `async_trait` so port values can be held behind generic
//! application state and exercised from multi-threaded handlers.

use anyhow::Result;
use async_trait::async_trait;
use sprout_common::{DeploymentState, FileChange, PrototypeStatus};

use crate::domain::{Prototype, Secret};

// ── Value types ───────────────────────────────────────────────────────────────

/// An opened external change request (e.g. a pull request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub number: u64,
    pub url: String,
}

/// A freshly created database branch. Providers may not return the
/// connection string synchronously.
#[derive(Debug, Clone)]
pub struct DatabaseBranch {
    pub branch_id: String,
    pub connection_string: Option<Secret>,
}

/// Deployment status for one branch.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub state: DeploymentState,
    pub url: Option<String>,
}

// ── Provider ports ────────────────────────────────────────────────────────────

/// Version-control capability: branches, atomic commits, change requests.
#[async_trait]
pub trait VersionControl {
    /// Create `name` from the mainline head.
    async fn create_branch(&self, name: &str) -> Result<()>;

    /// Delete `name`. Tolerant of not-found — deleting an absent branch
    /// succeeds.
    async fn delete_branch(&self, name: &str) -> Result<()>;

    /// Commit all `files` to `branch` as a single atomic commit. If the
    /// operation fails partway, no partial state is visible on the branch.
    async fn commit_files(&self, branch: &str, files: &[FileChange], message: &str) -> Result<()>;

    /// Open a change request for `branch` against mainline.
    async fn open_change_request(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<ChangeRequest>;
}

/// Database-branching capability. The parent branch is fixed adapter
/// configuration, not a per-call decision.
#[async_trait]
pub trait DatabaseBranches {
    /// Create a database branch named `name` from the configured parent.
    async fn create_branch(&self, name: &str) -> Result<DatabaseBranch>;

    /// Resolve the live connection string for `branch_id`. May need to be
    /// retried — providers populate this asynchronously.
    async fn connection_string(&self, branch_id: &str) -> Result<Secret>;

    /// Delete `branch_id`. Tolerant of not-found.
    async fn delete_branch(&self, branch_id: &str) -> Result<()>;
}

/// Deployment-configuration capability: preview-scoped secret bindings and
/// deployment status.
#[async_trait]
pub trait DeploymentConfig {
    /// Bind `value` as a preview-only secret named `key`, scoped to
    /// `branch`. Returns the binding id needed to undo the binding later.
    async fn bind_secret(&self, branch: &str, key: &str, value: &Secret) -> Result<String>;

    /// Remove a secret binding. Tolerant of not-found.
    async fn unbind_secret(&self, binding_id: &str) -> Result<()>;

    /// Latest deployment state for `branch`.
    async fn deployment_status(&self, branch: &str) -> Result<Deployment>;
}

// ── Persistence port ──────────────────────────────────────────────────────────

/// Prototype record persistence, consumed by the excluded UI layers through
/// the API. Listing is ordered by `updated_at` descending.
#[async_trait]
pub trait PrototypeStore {
    async fn insert(&self, prototype: Prototype) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Prototype>>;

    /// Replace the stored record with `prototype` (matched by id).
    async fn update(&self, prototype: &Prototype) -> Result<()>;

    /// Resolve an inbound agent batch to its prototype.
    async fn find_by_agent_project(&self, project_id: &str) -> Result<Option<Prototype>>;

    /// Resolve an external merge notification to its prototype.
    async fn find_by_change_request(&self, number: u64) -> Result<Option<Prototype>>;

    /// The owner's prototypes, newest activity first, optionally filtered
    /// by status and a case-insensitive description search.
    async fn list_by_owner(
        &self,
        owner_id: &str,
        status: Option<PrototypeStatus>,
        search: Option<&str>,
    ) -> Result<Vec<Prototype>>;
}
