//! Provisioning saga: ordered multi-resource allocation with reverse-order
//! compensation.
//!
//! Steps run strictly in order: version-control branch → database branch
//! (plus connection-string resolution) → deployment secret binding →
//! persist. On any step failure the undo list is unwound in strictly
//! reverse order of *completed* steps; each undo is fire-and-forget with
//! the swallowed error logged, so a half-deleted resource never masks the
//! original failure. There is no automatic retry of a failed step and no
//! mid-step cancellation.

use sprout_common::PrototypeStatus;

use crate::application::ports::{
    DatabaseBranches, DeploymentConfig, PrototypeStore, VersionControl,
};
use crate::application::retry::{self, RetryPolicy};
use crate::domain::{
    BranchNamer, OrchestratorError, Prototype, ProvisionError, ProvisionStep,
    ProvisionedEnvironment, validate_description,
};

/// A completed step's undo action, pushed as steps succeed.
enum Undo {
    VcsBranch(String),
    DbBranch(String),
    Binding(String),
}

/// Allocate the three external resources for a new prototype and persist
/// the record only after all of them exist.
///
/// # Errors
///
/// `ValidationError` for a bad description (nothing allocated);
/// `ProvisionError` naming the failed system after compensation has
/// released every resource allocated so far.
#[allow(clippy::too_many_arguments)]
pub async fn provision(
    vcs: &impl VersionControl,
    db: &impl DatabaseBranches,
    deploy: &impl DeploymentConfig,
    store: &impl PrototypeStore,
    namer: &BranchNamer,
    database_url_key: &str,
    owner_id: &str,
    description: &str,
) -> Result<Prototype, OrchestratorError> {
    validate_description(description)?;
    let branch_name = namer.next(owner_id);
    let mut prototype = Prototype::provisioning(owner_id, description, branch_name.clone());
    let mut undo: Vec<Undo> = Vec::new();

    // Step 1: version-control branch from mainline head.
    if let Err(source) = vcs.create_branch(&branch_name).await {
        return Err(fail(
            vcs,
            db,
            deploy,
            store,
            &undo,
            prototype,
            ProvisionStep::VersionControl,
            source,
        )
        .await
        .into());
    }
    undo.push(Undo::VcsBranch(branch_name.clone()));

    // Step 2: database branch from the configured parent.
    let created = match db.create_branch(&branch_name).await {
        Ok(branch) => branch,
        Err(source) => {
            return Err(fail(
                vcs,
                db,
                deploy,
                store,
                &undo,
                prototype,
                ProvisionStep::Database,
                source,
            )
            .await
            .into());
        }
    };
    undo.push(Undo::DbBranch(created.branch_id.clone()));

    // Step 3: resolve the connection string, polling when the provider does
    // not return it synchronously.
    let connection_string = match created.connection_string {
        Some(secret) => secret,
        None => {
            match retry::retry(
                RetryPolicy::connection_string(),
                "resolve connection string",
                || db.connection_string(&created.branch_id),
            )
            .await
            {
                Ok(secret) => secret,
                Err(source) => {
                    return Err(fail(
                        vcs,
                        db,
                        deploy,
                        store,
                        &undo,
                        prototype,
                        ProvisionStep::Database,
                        source,
                    )
                    .await
                    .into());
                }
            }
        }
    };

    // Step 4: bind the connection string as a preview-scoped secret keyed
    // to the branch.
    let binding = match deploy
        .bind_secret(&branch_name, database_url_key, &connection_string)
        .await
    {
        Ok(binding) => binding,
        Err(source) => {
            return Err(fail(
                vcs,
                db,
                deploy,
                store,
                &undo,
                prototype,
                ProvisionStep::Deployment,
                source,
            )
            .await
            .into());
        }
    };
    undo.push(Undo::Binding(binding.clone()));

    // Step 5: persist, now that all three resources exist.
    prototype.environment = Some(ProvisionedEnvironment {
        database_branch_id: created.branch_id,
        connection_string,
        deployment_binding: binding,
    });
    prototype.status = PrototypeStatus::InProgress;
    prototype.touch();
    if let Err(source) = store.insert(prototype.clone()).await {
        return Err(fail(
            vcs,
            db,
            deploy,
            store,
            &undo,
            prototype,
            ProvisionStep::Persistence,
            source,
        )
        .await
        .into());
    }

    tracing::info!(
        prototype = %prototype.id,
        branch = %prototype.branch_name,
        owner = %prototype.owner_id,
        "prototype provisioned"
    );
    Ok(prototype)
}

/// Release every external resource a prototype may hold, in reverse
/// allocation order, tolerating already-deleted resources. Never fails:
/// undo errors are logged with enough context for out-of-band reconciliation.
pub async fn deprovision(
    vcs: &impl VersionControl,
    db: &impl DatabaseBranches,
    deploy: &impl DeploymentConfig,
    prototype: &Prototype,
) {
    if let Some(env) = &prototype.environment {
        if let Err(err) = deploy.unbind_secret(&env.deployment_binding).await {
            log_undo_failure("deployment", &env.deployment_binding, &prototype.branch_name, &err);
        }
        if let Err(err) = db.delete_branch(&env.database_branch_id).await {
            log_undo_failure("database", &env.database_branch_id, &prototype.branch_name, &err);
        }
    }
    if let Err(err) = vcs.delete_branch(&prototype.branch_name).await {
        log_undo_failure(
            "version-control",
            &prototype.branch_name,
            &prototype.branch_name,
            &err,
        );
    }
}

/// Compensate, record the failure tombstone, and build the caller's error.
#[allow(clippy::too_many_arguments)]
async fn fail(
    vcs: &impl VersionControl,
    db: &impl DatabaseBranches,
    deploy: &impl DeploymentConfig,
    store: &impl PrototypeStore,
    undo: &[Undo],
    prototype: Prototype,
    step: ProvisionStep,
    source: anyhow::Error,
) -> ProvisionError {
    tracing::error!(
        prototype = %prototype.id,
        branch = %prototype.branch_name,
        step = %step,
        error = %source,
        "provisioning step failed, compensating"
    );
    compensate(vcs, db, deploy, undo, &prototype.branch_name).await;
    record_failure(store, prototype, step).await;
    ProvisionError { step, source }
}

/// Unwind completed steps in strictly reverse order. Each undo failure is
/// logged and swallowed: the resource may already be gone or will be
/// garbage-collected out-of-band.
async fn compensate(
    vcs: &impl VersionControl,
    db: &impl DatabaseBranches,
    deploy: &impl DeploymentConfig,
    undo: &[Undo],
    branch_name: &str,
) {
    for entry in undo.iter().rev() {
        match entry {
            Undo::Binding(binding_id) => {
                if let Err(err) = deploy.unbind_secret(binding_id).await {
                    log_undo_failure("deployment", binding_id, branch_name, &err);
                }
            }
            Undo::DbBranch(branch_id) => {
                if let Err(err) = db.delete_branch(branch_id).await {
                    log_undo_failure("database", branch_id, branch_name, &err);
                }
            }
            Undo::VcsBranch(name) => {
                if let Err(err) = vcs.delete_branch(name).await {
                    log_undo_failure("version-control", name, branch_name, &err);
                }
            }
        }
    }
}

fn log_undo_failure(step: &str, resource: &str, branch: &str, err: &anyhow::Error) {
    tracing::warn!(
        step,
        resource,
        branch,
        error = %err,
        "undo failed; resource may need out-of-band cleanup"
    );
}

/// Persist an `ERROR` tombstone carrying the generic failure reason. The
/// tombstone owns no environment — compensation already released every
/// resource. A store failure here is swallowed: the caller still gets the
/// original provisioning error.
async fn record_failure(store: &impl PrototypeStore, mut prototype: Prototype, step: ProvisionStep) {
    prototype.status = PrototypeStatus::Error;
    prototype.error_reason = Some(format!("Provisioning failed at the {step} step."));
    prototype.environment = None;
    prototype.touch();
    if let Err(err) = store.insert(prototype).await {
        tracing::warn!(error = %err, "failed to record provisioning error tombstone");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use sprout_common::PrototypeStatus;

    use super::*;
    use crate::application::services::test_support::{
        FailingStore, StubDb, StubDeploy, StubVcs, mem_store,
    };
    use crate::domain::BranchNamer;

    const DESC: &str = "Rework the landing hero to feature testimonials";

    #[tokio::test]
    async fn success_persists_in_progress_with_environment() {
        let (vcs, db, deploy) = (StubVcs::default(), StubDb::default(), StubDeploy::default());
        let store = mem_store();
        let namer = BranchNamer::new();

        let prototype = provision(&vcs, &db, &deploy, &store, &namer, "DATABASE_URL", "owner-1", DESC)
            .await
            .expect("provision");

        assert_eq!(prototype.status, PrototypeStatus::InProgress);
        let env = prototype.environment.as_ref().expect("environment");
        assert_eq!(env.database_branch_id, "br-1");
        let stored = store.get(&prototype.id).await.unwrap().expect("stored");
        assert_eq!(stored.status, PrototypeStatus::InProgress);
        assert_eq!(vcs.created.lock().unwrap().len(), 1);
        assert!(vcs.deleted.lock().unwrap().is_empty());
        let bound = deploy.bound.lock().unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].1, "DATABASE_URL");
    }

    #[tokio::test]
    async fn bad_description_allocates_nothing() {
        let (vcs, db, deploy) = (StubVcs::default(), StubDb::default(), StubDeploy::default());
        let store = mem_store();
        let err = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            "too short",
        )
        .await
        .expect_err("expected validation error");
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert!(vcs.created.lock().unwrap().is_empty());
        assert!(db.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn database_failure_deletes_vcs_branch_and_persists_no_record() {
        let vcs = StubVcs::default();
        let db = StubDb {
            fail_create: true,
            ..StubDb::default()
        };
        let deploy = StubDeploy::default();
        let store = mem_store();

        let err = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            DESC,
        )
        .await
        .expect_err("expected provisioning failure");

        match err {
            OrchestratorError::Provision(e) => assert_eq!(e.step, ProvisionStep::Database),
            other => panic!("unexpected error: {other}"),
        }
        // The one created branch was compensated.
        let created = vcs.created.lock().unwrap().clone();
        assert_eq!(vcs.deleted.lock().unwrap().clone(), created);
        // No live record — only the ERROR tombstone.
        let records = store.list_by_owner("owner-1", None, None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, PrototypeStatus::Error);
        assert!(records[0].environment.is_none());
        assert!(
            records[0]
                .error_reason
                .as_deref()
                .unwrap()
                .contains("database")
        );
    }

    #[tokio::test]
    async fn deployment_failure_unwinds_database_then_vcs() {
        let vcs = StubVcs::default();
        let db = StubDb::default();
        let deploy = StubDeploy {
            fail_bind: true,
            ..StubDeploy::default()
        };
        let store = mem_store();

        let err = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            DESC,
        )
        .await
        .expect_err("expected provisioning failure");

        match err {
            OrchestratorError::Provision(e) => assert_eq!(e.step, ProvisionStep::Deployment),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db.deleted.lock().unwrap().as_slice(), ["br-1"]);
        assert_eq!(vcs.deleted.lock().unwrap().len(), 1);
        // Nothing was bound, so nothing to unbind.
        assert!(deploy.unbound.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolution_retries_then_succeeds() {
        let vcs = StubVcs::default();
        let db = StubDb {
            connection_on_create: false,
            resolve_after_attempts: 3,
            ..StubDb::default()
        };
        let deploy = StubDeploy::default();
        let store = mem_store();

        tokio::time::pause();
        let prototype = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            DESC,
        )
        .await
        .expect("provision");
        assert_eq!(prototype.status, PrototypeStatus::InProgress);
        assert_eq!(*db.resolve_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn resolution_exhaustion_is_a_database_step_failure() {
        let vcs = StubVcs::default();
        let db = StubDb {
            connection_on_create: false,
            resolve_after_attempts: u32::MAX,
            ..StubDb::default()
        };
        let deploy = StubDeploy::default();
        let store = mem_store();

        tokio::time::pause();
        let err = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            DESC,
        )
        .await
        .expect_err("expected failure");
        match err {
            OrchestratorError::Provision(e) => assert_eq!(e.step, ProvisionStep::Database),
            other => panic!("unexpected error: {other}"),
        }
        // Database branch existed by then, so it was compensated too.
        assert_eq!(db.deleted.lock().unwrap().as_slice(), ["br-1"]);
        assert_eq!(vcs.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persist_failure_releases_all_three_resources() {
        let vcs = StubVcs::default();
        let db = StubDb::default();
        let deploy = StubDeploy::default();
        let store = FailingStore;

        let err = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            DESC,
        )
        .await
        .expect_err("expected failure");
        match err {
            OrchestratorError::Provision(e) => assert_eq!(e.step, ProvisionStep::Persistence),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(deploy.unbound.lock().unwrap().len(), 1);
        assert_eq!(db.deleted.lock().unwrap().as_slice(), ["br-1"]);
        assert_eq!(vcs.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn compensation_failure_does_not_mask_the_original_error() {
        let vcs = StubVcs {
            fail_delete: true,
            ..StubVcs::default()
        };
        let db = StubDb {
            fail_create: true,
            ..StubDb::default()
        };
        let deploy = StubDeploy::default();
        let store = mem_store();

        let err = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            DESC,
        )
        .await
        .expect_err("expected failure");
        match err {
            OrchestratorError::Provision(e) => assert_eq!(e.step, ProvisionStep::Database),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn deprovision_tolerates_already_deleted_resources() {
        let vcs = StubVcs::default();
        let db = StubDb::default();
        let deploy = StubDeploy::default();
        let store = mem_store();
        let prototype = provision(
            &vcs,
            &db,
            &deploy,
            &store,
            &BranchNamer::new(),
            "DATABASE_URL",
            "owner-1",
            DESC,
        )
        .await
        .expect("provision");

        deprovision(&vcs, &db, &deploy, &prototype).await;
        deprovision(&vcs, &db, &deploy, &prototype).await;
        // Both passes issued deletes; the stubs (like real providers in the
        // contract) tolerate the second round.
        assert_eq!(vcs.deleted.lock().unwrap().len(), 2);
        assert_eq!(db.deleted.lock().unwrap().len(), 2);
        assert_eq!(deploy.unbound.lock().unwrap().len(), 2);
    }
}
