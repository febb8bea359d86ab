use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use rolewarden_core::{AppError, AppResult, PrincipalId, RealmId, RoleId};
use rolewarden_domain::Grant;

use crate::grant_ports::{GrantStore, UpsertGrantInput};
use crate::reconciliation::ReconciliationScheduler;


/// Façade the command layer talks to.
///
/// Holds no state beyond the configured default grant duration; persistence
/// belongs to the store and sweeping to the scheduler. Store failures on
/// `grant` surface to the caller so a request is never silently dropped.
pub struct GrantService {
    store: Arc<dyn GrantStore>,
    scheduler: Arc<ReconciliationScheduler>,
    default_grant_duration: Duration,
}

impl GrantService {
    /// Creates the façade over an already-validated configuration.
    #[must_use]
    pub fn new(
        store: Arc<dyn GrantStore>,
        scheduler: Arc<ReconciliationScheduler>,
        default_grant_duration: Duration,
    ) -> Self {
        Self {
            store,
            scheduler,
            default_grant_duration,
        }
    }

    /// Records a temporary grant expiring at the given instant, replacing
    /// any earlier grant for the same `(principal, realm, role)` triple.
    pub async fn grant(
        &self,
        principal_id: PrincipalId,
        realm_id: RealmId,
        role_id: RoleId,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Grant> {
        if expires_at <= Utc::now() {
            return Err(AppError::Validation(format!(
                "grant expiry '{expires_at}' is not in the future"
            )));
        }

        self.store
            .upsert(UpsertGrantInput {
                principal_id,
                realm_id,
                role_id,
                expires_at,
            })
            .await
    }

    /// Records a temporary grant expiring after the configured default
    /// duration.
    pub async fn grant_for_default_duration(
        &self,
        principal_id: PrincipalId,
        realm_id: RealmId,
        role_id: RoleId,
    ) -> AppResult<Grant> {
        self.store
            .upsert(UpsertGrantInput {
                principal_id,
                realm_id,
                role_id,
                expires_at: Utc::now() + self.default_grant_duration,
            })
            .await
    }

    /// Returns the grants still in effect for the principal within the realm.
    pub async fn list_active(
        &self,
        principal_id: PrincipalId,
        realm_id: RealmId,
    ) -> AppResult<Vec<Grant>> {
        self.store
            .list_active(principal_id, realm_id, Utc::now())
            .await
    }

    /// Total recorded grants, expired-but-unreconciled rows included.
    pub async fn count(&self) -> AppResult<i64> {
        self.store.count().await
    }

    /// Forces one reconciliation pass and returns the number of roles
    /// whose removal was confirmed.
    pub async fn revoke_now(&self) -> AppResult<u64> {
        self.scheduler.run_once().await
    }
}
