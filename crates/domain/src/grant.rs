use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolewarden_core::{GrantId, PrincipalId, RealmId, RoleId};

/// A record that a principal holds a role in a realm until a given expiry.
///
/// At most one grant exists per `(principal_id, realm_id, role_id)` triple;
/// a later grant for the same triple replaces the earlier one rather than
/// adding a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Surrogate identifier assigned by the store, stable for the grant's lifetime.
    pub id: GrantId,
    /// Principal holding the role.
    pub principal_id: PrincipalId,
    /// Realm the role and principal belong to.
    pub realm_id: RealmId,
    /// Role scheduled for automatic removal.
    pub role_id: RoleId,
    /// Instant after which the grant is eligible for revocation.
    pub expires_at: DateTime<Utc>,
    /// Instant the grant was recorded, set by the store.
    pub created_at: DateTime<Utc>,
}

impl Grant {
    /// Returns true once the expiry instant has been reached.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use rolewarden_core::{GrantId, PrincipalId, RealmId, RoleId};

    use super::Grant;

    #[test]
    fn grant_expires_exactly_at_its_expiry_instant() {
        let now = Utc::now();
        let grant = Grant {
            id: GrantId::new(1),
            principal_id: PrincipalId::new(10),
            realm_id: RealmId::new(20),
            role_id: RoleId::new(30),
            expires_at: now,
            created_at: now - Duration::hours(48),
        };

        assert!(grant.is_expired_at(now));
        assert!(!grant.is_expired_at(now - Duration::seconds(1)));
    }
}
