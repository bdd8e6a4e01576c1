//! Change-ingest gate: the only write path from the agent into a
//! prototype's branch.
//!
//! The whole batch is validated against the write policy before anything
//! touches version control; one bad path rejects the entire batch. A
//! rejected or failed batch leaves the prototype record untouched.

use sprout_common::FileChange;

use crate::application::locks::PrototypeLocks;
use crate::application::ports::{PrototypeStore, VersionControl};
use crate::domain::lifecycle::guard;
use crate::domain::{
    Action, OrchestratorError, PolicyRejection, TransientError, ValidationError, scan_batch,
};

/// Apply a batch of agent file changes to the prototype registered for
/// `project_id`. Returns the number of files committed.
///
/// # Errors
///
/// `UnknownAgentProject` for an unregistered project id, `EmptyBatch` for
/// a batch with no files, `InvalidTransition` outside `IN_PROGRESS`,
/// `PolicyRejection` when any path is not on the modifiable allow-list,
/// and a transient error when the commit itself fails. None of these
/// mutate the prototype.
pub async fn ingest(
    vcs: &impl VersionControl,
    store: &impl PrototypeStore,
    locks: &PrototypeLocks,
    project_id: &str,
    files: &[FileChange],
    message: Option<&str>,
) -> Result<usize, OrchestratorError> {
    let found = store
        .find_by_agent_project(project_id)
        .await
        .map_err(OrchestratorError::Store)?
        .ok_or(OrchestratorError::UnknownAgentProject)?;

    // Lock, then re-read: the status may have moved between the lookup and
    // the lock grant (e.g. a concurrent submit).
    let _guard = locks.acquire(&found.id).await;
    let mut prototype = store
        .get(&found.id)
        .await
        .map_err(OrchestratorError::Store)?
        .ok_or(OrchestratorError::UnknownAgentProject)?;
    guard(prototype.status, Action::Ingest)?;

    if files.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }
    let violations = scan_batch(files);
    if !violations.is_clean() {
        if !violations.protected.is_empty() {
            tracing::warn!(
                security_event = true,
                prototype = %prototype.id,
                owner = %prototype.owner_id,
                paths = ?violations.protected,
                "agent attempted to modify protected paths"
            );
        }
        return Err(PolicyRejection {
            disallowed: violations.disallowed,
            protected: violations.protected,
        }
        .into());
    }

    let default_message = format!("Apply {} agent file change(s)", files.len());
    let message = message.unwrap_or(&default_message);
    vcs.commit_files(&prototype.branch_name, files, message)
        .await
        .map_err(|source| TransientError {
            system: "version-control",
            source,
        })?;

    prototype.touch();
    store
        .update(&prototype)
        .await
        .map_err(OrchestratorError::Store)?;

    tracing::info!(
        prototype = %prototype.id,
        files = files.len(),
        "agent changes committed"
    );
    Ok(files.len())
}
