use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use rolewarden_core::{AppError, AppResult, GrantId};
use rolewarden_domain::Grant;

use crate::grant_ports::{GrantStore, RoleAuthority};


const REVOCATION_AUDIT_REASON: &str = "temporary role expired";

/// Periodic sweep over expired grants.
///
/// Each pass pulls the expired rows from the store, attempts revocation
/// through the authorization system, and deletes only the rows whose
/// outcome was settled — revoked, already absent, or permission-denied.
/// Rows that failed transiently stay for the next pass.
pub struct ReconciliationScheduler {
    store: Arc<dyn GrantStore>,
    authority: Arc<dyn RoleAuthority>,
    pass_guard: Mutex<()>,
}

enum PassOutcome {
    Revoked,
    NothingToRevoke,
}

impl ReconciliationScheduler {
    /// Creates a scheduler over the given store and authorization handle.
    #[must_use]
    pub fn new(store: Arc<dyn GrantStore>, authority: Arc<dyn RoleAuthority>) -> Self {
        Self {
            store,
            authority,
            pass_guard: Mutex::new(()),
        }
    }

    /// Spawns the periodic reconciliation loop.
    ///
    /// The first pass runs immediately so grants that expired while the
    /// process was down are picked up on startup. Pass failures are logged
    /// and never stop the loop; aborting the returned handle cancels the
    /// loop as a unit.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let scheduler = self;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(period_secs = period.as_secs(), "reconciliation loop started");

            loop {
                ticker.tick().await;

                if let Err(pass_error) = scheduler.run_once().await {
                    error!(error = %pass_error, "reconciliation pass failed");
                }
            }
        })
    }

    /// Performs one reconciliation pass and returns the number of grants
    /// whose role removal was confirmed.
    ///
    /// At most one pass is in flight at a time; a call that lands while
    /// another pass is running is skipped and reports zero revocations.
    pub async fn run_once(&self) -> AppResult<u64> {
        let Ok(_pass) = self.pass_guard.try_lock() else {
            info!("reconciliation pass already in flight, skipping");
            return Ok(0);
        };

        let now = Utc::now();
        let expired = self.store.list_expired(now).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let mut resolved: Vec<GrantId> = Vec::with_capacity(expired.len());
        let mut revoked = 0_u64;

        for grant in &expired {
            match self.resolve_grant(grant).await {
                Ok(PassOutcome::Revoked) => {
                    revoked += 1;
                    resolved.push(grant.id);
                }
                Ok(PassOutcome::NothingToRevoke) => resolved.push(grant.id),
                Err(grant_error) => {
                    warn!(
                        grant_id = %grant.id,
                        principal_id = %grant.principal_id,
                        realm_id = %grant.realm_id,
                        error = %grant_error,
                        "leaving expired grant for the next pass"
                    );
                }
            }
        }

        let deleted = if resolved.is_empty() {
            0
        } else {
            self.store.delete_many(&resolved).await?
        };

        info!(
            expired = expired.len(),
            revoked, deleted, "reconciliation pass finished"
        );

        Ok(revoked)
    }

    async fn resolve_grant(&self, grant: &Grant) -> AppResult<PassOutcome> {
        let Some(realm) = self.authority.find_realm(grant.realm_id).await? else {
            warn!(
                realm_id = %grant.realm_id,
                grant_id = %grant.id,
                "realm no longer exists, resolving grant without revocation"
            );
            return Ok(PassOutcome::NothingToRevoke);
        };

        let Some(member) = self
            .authority
            .find_member(&realm, grant.principal_id)
            .await?
        else {
            warn!(
                principal_id = %grant.principal_id,
                realm_id = %grant.realm_id,
                "member no longer present, resolving grant without revocation"
            );
            return Ok(PassOutcome::NothingToRevoke);
        };

        let Some(role) = self.authority.find_role(&realm, grant.role_id).await? else {
            warn!(
                role_id = %grant.role_id,
                realm_id = %grant.realm_id,
                "role no longer exists, resolving grant without revocation"
            );
            return Ok(PassOutcome::NothingToRevoke);
        };

        if !member.has_role(role.id) {
            return Ok(PassOutcome::NothingToRevoke);
        }

        match self
            .authority
            .revoke_role(&realm, &member, &role, REVOCATION_AUDIT_REASON)
            .await
        {
            Ok(()) => {
                info!(
                    principal_id = %grant.principal_id,
                    realm_id = %grant.realm_id,
                    role_id = %grant.role_id,
                    "revoked expired role"
                );
                Ok(PassOutcome::Revoked)
            }
            // The row is still resolved: retrying forever without an
            // operator fixing permissions would leak it, while the role
            // itself stays visible as a symptom.
            Err(AppError::Forbidden(detail)) => {
                warn!(
                    principal_id = %grant.principal_id,
                    realm_id = %grant.realm_id,
                    role_id = %grant.role_id,
                    detail = %detail,
                    "revocation forbidden, resolving grant anyway"
                );
                Ok(PassOutcome::NothingToRevoke)
            }
            Err(AppError::NotFound(_)) => Ok(PassOutcome::NothingToRevoke),
            Err(revoke_error) => Err(revoke_error),
        }
    }
}
