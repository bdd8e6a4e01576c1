//! Application layer — port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain` — never on `crate::infra`
//! or `crate::api`.

pub mod locks;
pub mod ports;
pub mod retry;
pub mod services;

pub use locks::PrototypeLocks;
pub use ports::{
    ChangeRequest, DatabaseBranch, DatabaseBranches, Deployment, DeploymentConfig, PrototypeStore,
    VersionControl,
};
pub use retry::RetryPolicy;
