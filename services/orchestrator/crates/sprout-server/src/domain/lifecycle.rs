//! Lifecycle transition table.
//!
//! Statuses only move forward; `MERGED` and `ARCHIVED` admit no outgoing
//! transition and `SUBMITTED` admits only the external merge notification.
//! Every illegal transition is a typed error naming the current status and
//! the requested action — never a silent no-op.

use sprout_common::PrototypeStatus;

use crate::domain::error::{Action, TransitionError};

/// Check whether `action` is legal from `from`.
///
/// # Errors
///
/// Returns `TransitionError::InvalidTransition` when the transition table
/// does not list the action for the current status.
pub fn guard(from: PrototypeStatus, action: Action) -> Result<(), TransitionError> {
    let legal = match action {
        // Agent writes and submission are only legal on a live prototype.
        Action::Submit | Action::Ingest => from == PrototypeStatus::InProgress,
        // Soft-delete is legal from anything that has not been handed off
        // for review. Archiving an already-archived prototype is handled
        // as an idempotent no-op by the caller before this check.
        Action::Archive => !matches!(from, PrototypeStatus::Submitted | PrototypeStatus::Merged),
        Action::Merge => from == PrototypeStatus::Submitted,
    };
    if legal {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            from,
            requested: action,
        })
    }
}
