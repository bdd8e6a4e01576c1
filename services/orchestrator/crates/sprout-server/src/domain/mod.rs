//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! or `crate::api`, and performs no I/O. All functions are synchronous and
//! take data in, returning data out.

pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod prototype;

pub use error::{
    Action, OrchestratorError, PolicyRejection, ProvisionError, ProvisionStep, TransientError,
    TransitionError, ValidationError,
};
pub use policy::{BatchViolations, PathClass, classify, scan_batch};
pub use prototype::{
    BranchNamer, Prototype, ProvisionedEnvironment, Secret, validate_description,
};
