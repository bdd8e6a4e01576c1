use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a prototype.
///
/// Statuses only move forward: `Provisioning → InProgress → Submitted →
/// Merged`, with `Archived` as the soft-delete terminal and `Error` recorded
/// when provisioning fails after compensation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrototypeStatus {
    Provisioning,
    InProgress,
    Submitted,
    Merged,
    Archived,
    Error,
}

impl PrototypeStatus {
    /// True when no further owner mutation is permitted (`Submitted`,
    /// `Merged`, `Archived`).
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Submitted | Self::Merged | Self::Archived)
    }

    /// True for states that admit no outgoing transition at all.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Archived)
    }
}

impl fmt::Display for PrototypeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Provisioning => "PROVISIONING",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Merged => "MERGED",
            Self::Archived => "ARCHIVED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Error)]
#[error("unknown prototype status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for PrototypeStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROVISIONING" => Ok(Self::Provisioning),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUBMITTED" => Ok(Self::Submitted),
            "MERGED" => Ok(Self::Merged),
            "ARCHIVED" => Ok(Self::Archived),
            "ERROR" => Ok(Self::Error),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// State of a preview deployment as reported by the deployment provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Queued,
    Building,
    Ready,
    Error,
    Canceled,
    NotFound,
}

/// One proposed file change inside an agent change batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative path, with or without a leading `/`.
    pub path: String,
    /// Full replacement content for the file.
    pub content: String,
}
