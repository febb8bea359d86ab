use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolewarden_core::{AppResult, GrantId, PrincipalId, RealmId, RoleId};
use rolewarden_domain::{Grant, Member, Realm, RoleHandle};

/// Input payload for recording a temporary grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertGrantInput {
    /// Principal the role applies to.
    pub principal_id: PrincipalId,
    /// Realm the role and principal belong to.
    pub realm_id: RealmId,
    /// Role scheduled for automatic removal.
    pub role_id: RoleId,
    /// Instant after which the grant becomes eligible for revocation.
    pub expires_at: DateTime<Utc>,
}

/// Durable table of active temporary grants.
///
/// Operations fail with [`rolewarden_core::AppError::StorageUnavailable`]
/// when the backing store cannot be reached.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Idempotently creates the grant table and its supporting indexes.
    async fn ensure_schema(&self) -> AppResult<()>;

    /// Inserts a grant, or replaces the existing one for the same
    /// `(principal, realm, role)` triple in a single atomic step,
    /// refreshing both expiry and creation instants.
    async fn upsert(&self, input: UpsertGrantInput) -> AppResult<Grant>;

    /// Returns every grant whose expiry has passed, oldest expiry first.
    async fn list_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Grant>>;

    /// Returns grants still in effect for the principal within the realm,
    /// soonest expiry first.
    async fn list_active(
        &self,
        principal_id: PrincipalId,
        realm_id: RealmId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Grant>>;

    /// Removes the given grants, ignoring identifiers already absent,
    /// and returns the number actually deleted.
    async fn delete_many(&self, ids: &[GrantId]) -> AppResult<u64>;

    /// Total rows currently stored, expired rows awaiting reconciliation included.
    async fn count(&self) -> AppResult<i64>;
}

/// The external authorization system consulted and mutated during
/// reconciliation.
///
/// Lookups answer `Ok(None)` for resources that no longer exist; revocation
/// distinguishes permission denial (`Forbidden`) from failures worth
/// retrying (`Transient`).
#[async_trait]
pub trait RoleAuthority: Send + Sync {
    /// Resolves a realm, or `None` when it is gone.
    async fn find_realm(&self, realm_id: RealmId) -> AppResult<Option<Realm>>;

    /// Resolves a member of the realm together with the roles they hold,
    /// or `None` when the principal is no longer a member.
    async fn find_member(
        &self,
        realm: &Realm,
        principal_id: PrincipalId,
    ) -> AppResult<Option<Member>>;

    /// Resolves a role within the realm, or `None` when it is gone.
    async fn find_role(&self, realm: &Realm, role_id: RoleId) -> AppResult<Option<RoleHandle>>;

    /// Removes the role from the member, recording `audit_reason` with the
    /// authorization system.
    async fn revoke_role(
        &self,
        realm: &Realm,
        member: &Member,
        role: &RoleHandle,
        audit_reason: &str,
    ) -> AppResult<()>;
}
