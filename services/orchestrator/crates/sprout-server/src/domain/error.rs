//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error`. Messages are user-facing
//! and actionable; they never carry provider credentials or raw provider
//! response bodies. The API layer maps each variant to an HTTP status.

use std::fmt;

use sprout_common::PrototypeStatus;
use thiserror::Error;

// ── Validation ────────────────────────────────────────────────────────────────

/// Bad caller input. Reported as-is; no state change.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Description must be between 10 and 500 characters (got {len}).")]
    DescriptionLength { len: usize },

    #[error("Change batch is empty; nothing to commit.")]
    EmptyBatch,
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

/// Externally triggered action validated by the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    Archive,
    Ingest,
    Merge,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submit => "submit",
            Self::Archive => "archive",
            Self::Ingest => "apply changes to",
            Self::Merge => "merge",
        };
        f.write_str(s)
    }
}

/// A lifecycle guard was violated. Reported; no state change.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot {requested} a prototype in status {from}.")]
    InvalidTransition {
        from: PrototypeStatus,
        requested: Action,
    },

    #[error("Preview deployment must be ready before submission.")]
    PreviewNotReady,
}

// ── Security ──────────────────────────────────────────────────────────────────

/// A change batch touched paths outside the modifiable allow-list.
/// The whole batch is rejected; no commit occurs.
#[derive(Debug, Error)]
#[error("These paths cannot be modified: {}. Only example content (landing page, /app/examples/, example components, /public/) is writable.", disallowed.join(", "))]
pub struct PolicyRejection {
    /// Every offending path, in batch order.
    pub disallowed: Vec<String>,
    /// The subset that hit the protected deny-list (logged as a security
    /// event by the ingest gate).
    pub protected: Vec<String>,
}

// ── Provisioning ──────────────────────────────────────────────────────────────

/// Which saga step failed. `Display` gives the external-system name used in
/// user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    VersionControl,
    Database,
    Deployment,
    Persistence,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VersionControl => "version-control",
            Self::Database => "database",
            Self::Deployment => "deployment",
            Self::Persistence => "persistence",
        };
        f.write_str(s)
    }
}

/// A saga step failed. Compensation has already run by the time this is
/// returned; the message names only the failed system.
#[derive(Debug, Error)]
#[error("Provisioning failed at the {step} step.")]
pub struct ProvisionError {
    pub step: ProvisionStep,
    #[source]
    pub source: anyhow::Error,
}

// ── Transient provider failures ───────────────────────────────────────────────

/// Network/provider failure during ingest or submit. Retryable; the
/// operation changed no prototype state.
#[derive(Debug, Error)]
#[error("Temporary failure talking to {system}; please retry.")]
pub struct TransientError {
    /// External-system name, e.g. `version-control` or `deployment`.
    pub system: &'static str,
    #[source]
    pub source: anyhow::Error,
}

// ── Umbrella ──────────────────────────────────────────────────────────────────

/// Top-level error surface of the application services.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Policy(#[from] PolicyRejection),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Transient(#[from] TransientError),

    #[error("Prototype not found.")]
    NotFound,

    #[error("You don't have permission to access this prototype.")]
    Forbidden,

    #[error("No prototype is registered for this agent project.")]
    UnknownAgentProject,

    #[error("Internal storage failure.")]
    Store(#[source] anyhow::Error),
}
