//! Application services — use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain
//! logic with port trait calls. Services import only from `crate::domain`
//! and `crate::application` — never from `crate::infra` or `crate::api`.

pub mod ingest;
pub mod lifecycle;
pub mod provision;

#[cfg(test)]
pub(crate) mod test_support;
