//! Write-path policy for agent-originated file changes.
//!
//! Classifies a file path in the governed application repository as
//! `Protected`, `Modifiable`, or `Neutral`. The deny-list covers the
//! application's authentication code, its orchestrator-facing API routes,
//! dashboard and prototype pages, provider-client modules (everything under
//! `/lib/`, which also holds this policy's counterpart file in that repo),
//! and configuration/secret files. Deny always wins over allow.
//!
//! Policy decision: **default-deny**. The allow-list is the sole source of
//! write permission — a `Neutral` path (on neither list) is a rejection,
//! not a pass-through. Matching is case-insensitive and prefix-based, so
//! every trailing segment beneath a protected prefix is protected
//! regardless of casing.
//!
//! Pure and deterministic; safe to call from any number of threads.

use sprout_common::FileChange;

/// Path prefixes the agent is never permitted to write.
const PROTECTED_PREFIXES: &[&str] = &[
    "/app/api/",
    "/app/dashboard/",
    "/app/(auth)/",
    "/app/prototype/",
    "/lib/",
    "/middleware.ts",
    "/prisma/schema.prisma",
    "/.env",
    "/package.json",
    "/next.config",
    "/tsconfig.json",
];

/// Path prefixes that are safe to modify (example content only).
const MODIFIABLE_PREFIXES: &[&str] = &[
    "/app/page.tsx",
    "/app/examples/",
    "/app/globals.css",
    "/components/ui/",
    "/components/examples/",
    "/public/",
];

/// Classification of a single file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// On the deny-list. Absolute — overrides any allow-list match.
    Protected,
    /// On the allow-list and not protected.
    Modifiable,
    /// On neither list. Treated as not allowed for batch validation.
    Neutral,
}

/// Classify a file path. Paths are normalized to a leading `/` and
/// lowercased before prefix comparison.
#[must_use]
pub fn classify(path: &str) -> PathClass {
    let normalized = normalize(path);
    if PROTECTED_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        return PathClass::Protected;
    }
    if MODIFIABLE_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        return PathClass::Modifiable;
    }
    PathClass::Neutral
}

fn normalize(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with('/') {
        lower
    } else {
        format!("/{lower}")
    }
}

/// Paths in a batch that fail validation, in batch order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchViolations {
    /// Every path that is not `Modifiable` (protected and neutral alike).
    pub disallowed: Vec<String>,
    /// The subset of `disallowed` that hit the protected deny-list.
    pub protected: Vec<String>,
}

impl BatchViolations {
    /// True when every path in the batch is modifiable.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.disallowed.is_empty()
    }
}

/// Scan a change batch against the policy. The whole batch is evaluated so
/// the caller can surface the complete list of offending paths.
#[must_use]
pub fn scan_batch(files: &[FileChange]) -> BatchViolations {
    let mut violations = BatchViolations::default();
    for file in files {
        match classify(&file.path) {
            PathClass::Modifiable => {}
            PathClass::Protected => {
                violations.disallowed.push(file.path.clone());
                violations.protected.push(file.path.clone());
            }
            PathClass::Neutral => violations.disallowed.push(file.path.clone()),
        }
    }
    violations
}
