//! Lifecycle use-cases: fetch/list, submit, archive, merge notification,
//! and preview refresh.
//!
//! Every mutating use-case acquires the per-prototype lock, re-reads the
//! record under the lock, and validates the transition table before
//! touching any external system.

use chrono::Utc;
use sprout_common::PrototypeStatus;

use crate::application::locks::PrototypeLocks;
use crate::application::ports::{
    ChangeRequest, DatabaseBranches, Deployment, DeploymentConfig, PrototypeStore, VersionControl,
};
use crate::application::services::provision;
use crate::domain::lifecycle::guard;
use crate::domain::{Action, OrchestratorError, Prototype, TransientError, TransitionError};

/// Load a prototype and enforce ownership.
///
/// # Errors
///
/// `NotFound` when the id is unknown, `Forbidden` when `owner_id` is not
/// the creator.
pub async fn fetch(
    store: &impl PrototypeStore,
    id: &str,
    owner_id: &str,
) -> Result<Prototype, OrchestratorError> {
    let prototype = store
        .get(id)
        .await
        .map_err(OrchestratorError::Store)?
        .ok_or(OrchestratorError::NotFound)?;
    if prototype.owner_id != owner_id {
        return Err(OrchestratorError::Forbidden);
    }
    Ok(prototype)
}

/// The owner's prototypes, newest activity first.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn list(
    store: &impl PrototypeStore,
    owner_id: &str,
    status: Option<PrototypeStatus>,
    search: Option<&str>,
) -> Result<Vec<Prototype>, OrchestratorError> {
    store
        .list_by_owner(owner_id, status, search)
        .await
        .map_err(OrchestratorError::Store)
}

/// Submit: open the external change request and hand the prototype off for
/// review. Requires `IN_PROGRESS` and a ready preview deployment.
///
/// # Errors
///
/// `InvalidTransition`/`PreviewNotReady` leave the status unchanged; a
/// change-request failure is a retryable transient error.
pub async fn submit(
    vcs: &impl VersionControl,
    store: &impl PrototypeStore,
    locks: &PrototypeLocks,
    id: &str,
    owner_id: &str,
) -> Result<ChangeRequest, OrchestratorError> {
    let _guard = locks.acquire(id).await;
    let mut prototype = fetch(store, id, owner_id).await?;
    guard(prototype.status, Action::Submit)?;
    let Some(preview_url) = prototype.preview_url.clone() else {
        return Err(TransitionError::PreviewNotReady.into());
    };

    let title = format!("Prototype: {}", truncate(&prototype.description, 72));
    let body = change_request_body(&prototype, &preview_url);
    let change_request = vcs
        .open_change_request(&prototype.branch_name, &title, &body)
        .await
        .map_err(|source| TransientError {
            system: "version-control",
            source,
        })?;

    prototype.status = PrototypeStatus::Submitted;
    prototype.change_request_number = Some(change_request.number);
    prototype.submitted_at = Some(Utc::now());
    prototype.touch();
    store
        .update(&prototype)
        .await
        .map_err(OrchestratorError::Store)?;

    tracing::info!(
        prototype = %prototype.id,
        change_request = change_request.number,
        "prototype submitted"
    );
    Ok(change_request)
}

/// Archive (soft-delete): release the environment, then flip the status.
/// Idempotent — archiving an already-archived prototype succeeds without
/// touching the providers again.
///
/// # Errors
///
/// `InvalidTransition` for `SUBMITTED`/`MERGED`; ownership and store errors
/// as in [`fetch`].
pub async fn archive(
    vcs: &impl VersionControl,
    db: &impl DatabaseBranches,
    deploy: &impl DeploymentConfig,
    store: &impl PrototypeStore,
    locks: &PrototypeLocks,
    id: &str,
    owner_id: &str,
) -> Result<(), OrchestratorError> {
    let lock = locks.acquire(id).await;
    let mut prototype = fetch(store, id, owner_id).await?;
    if prototype.status == PrototypeStatus::Archived {
        drop(lock);
        locks.discard(id);
        return Ok(());
    }
    guard(prototype.status, Action::Archive)?;

    // Resources are released before the status flips so the environment
    // never outlives a live record pointing at it.
    provision::deprovision(vcs, db, deploy, &prototype).await;
    prototype.environment = None;
    prototype.status = PrototypeStatus::Archived;
    prototype.touch();
    store
        .update(&prototype)
        .await
        .map_err(OrchestratorError::Store)?;

    // Terminal: no further serialized operation will touch this id.
    drop(lock);
    locks.discard(id);

    tracing::info!(prototype = %prototype.id, "prototype archived");
    Ok(())
}

/// External merge notification: `SUBMITTED → MERGED`.
///
/// # Errors
///
/// `NotFound` for an unknown change-request number; `InvalidTransition`
/// from any status but `SUBMITTED`.
pub async fn mark_merged(
    store: &impl PrototypeStore,
    locks: &PrototypeLocks,
    change_request_number: u64,
) -> Result<Prototype, OrchestratorError> {
    let found = store
        .find_by_change_request(change_request_number)
        .await
        .map_err(OrchestratorError::Store)?
        .ok_or(OrchestratorError::NotFound)?;
    let lock = locks.acquire(&found.id).await;
    let mut prototype = store
        .get(&found.id)
        .await
        .map_err(OrchestratorError::Store)?
        .ok_or(OrchestratorError::NotFound)?;
    guard(prototype.status, Action::Merge)?;

    prototype.status = PrototypeStatus::Merged;
    prototype.touch();
    store
        .update(&prototype)
        .await
        .map_err(OrchestratorError::Store)?;

    // Terminal: no further serialized operation will touch this id.
    drop(lock);
    locks.discard(&prototype.id);

    tracing::info!(
        prototype = %prototype.id,
        change_request = change_request_number,
        "change request merged"
    );
    Ok(prototype)
}

/// Poll the deployment provider and record `preview_url` once the preview
/// is ready. Only an `IN_PROGRESS` prototype is mutated; other statuses get
/// a read-only status report.
///
/// # Errors
///
/// Provider failures surface as retryable transient errors.
pub async fn refresh_preview(
    deploy: &impl DeploymentConfig,
    store: &impl PrototypeStore,
    locks: &PrototypeLocks,
    id: &str,
    owner_id: &str,
) -> Result<Deployment, OrchestratorError> {
    let _guard = locks.acquire(id).await;
    let mut prototype = fetch(store, id, owner_id).await?;
    let deployment = deploy
        .deployment_status(&prototype.branch_name)
        .await
        .map_err(|source| TransientError {
            system: "deployment",
            source,
        })?;

    if prototype.status == PrototypeStatus::InProgress
        && deployment.state == sprout_common::DeploymentState::Ready
        && let Some(url) = &deployment.url
        && prototype.preview_url.as_deref() != Some(url)
    {
        prototype.preview_url = Some(url.clone());
        prototype.touch();
        store
            .update(&prototype)
            .await
            .map_err(OrchestratorError::Store)?;
    }
    Ok(deployment)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}…")
}

fn change_request_body(prototype: &Prototype, preview_url: &str) -> String {
    format!(
        "## Prototype submission\n\n\
         **Description:** {}\n\n\
         **Preview:** {}\n\n\
         **Branch:** `{}`\n\n\
         ---\n\n\
         Only example-content paths can be modified through this flow; \
         writes to protected files are rejected before they reach the branch.\n",
        prototype.description, preview_url, prototype.branch_name
    )
}
