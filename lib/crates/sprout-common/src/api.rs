//! Request and response bodies exchanged between the orchestrator and its
//! (excluded) UI and agent collaborators.
//!
//! `PrototypeView` deliberately carries no environment fields: the database
//! connection string is a secret owned by the server side and must never
//! cross this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{FileChange, PrototypeStatus};

/// Body of `POST /api/prototypes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrototypeRequest {
    /// Natural-language description of the change, 10–500 characters.
    pub description: String,
}

/// Owner-facing projection of a prototype record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeView {
    pub id: String,
    pub description: String,
    pub branch_name: String,
    pub status: PrototypeStatus,
    pub agent_project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_request_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/webhooks/agent` — a change batch from the AI agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentChangesRequest {
    /// External agent project identifier, resolved back to a prototype.
    pub project_id: String,
    /// Proposed file changes; validated as one atomic batch.
    pub files: Vec<FileChange>,
    /// Optional commit message; the server supplies a default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `POST /api/webhooks/change-request` — external merge notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequestEvent {
    /// Number of the change request that was merged.
    pub change_request_number: u64,
}

/// Response of `POST /api/prototypes/{id}/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub change_request_number: u64,
    pub change_request_url: String,
}

/// Response of `POST /api/prototypes/{id}/preview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Raw provider deployment state, e.g. `BUILDING` or `READY`.
    pub deployment_state: crate::types::DeploymentState,
}

/// Response of `POST /api/webhooks/agent` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Number of files committed.
    pub committed: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn agent_changes_request_parses_without_message() {
        let req: AgentChangesRequest = serde_json::from_str(
            r#"{"project_id":"v0-abc","files":[{"path":"/app/page.tsx","content":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(req.project_id, "v0-abc");
        assert_eq!(req.files.len(), 1);
        assert!(req.message.is_none());
    }

    #[test]
    fn prototype_view_omits_absent_optionals() {
        let view = PrototypeView {
            id: "proto-0123456789abcdef".into(),
            description: "Make the landing hero friendlier".into(),
            branch_name: "prototype-user1234-1700000000000".into(),
            status: PrototypeStatus::InProgress,
            agent_project_id: "v0-abc".into(),
            preview_url: None,
            change_request_number: None,
            error_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            submitted_at: None,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("preview_url"));
        assert!(!json.contains("submitted_at"));
        assert!(!json.contains("error_reason"));
    }
}
