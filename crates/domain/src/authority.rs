use rolewarden_core::{PrincipalId, RealmId, RoleId};

/// A realm the authorization system currently knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Realm {
    /// Realm identifier.
    pub id: RealmId,
}

/// Live membership snapshot for a principal within a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Principal the snapshot belongs to.
    pub principal_id: PrincipalId,
    /// Roles the principal currently holds in the realm.
    pub role_ids: Vec<RoleId>,
}

impl Member {
    /// Returns true when the member currently holds the given role.
    #[must_use]
    pub fn has_role(&self, role_id: RoleId) -> bool {
        self.role_ids.contains(&role_id)
    }
}

/// A role the authorization system currently knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleHandle {
    /// Role identifier.
    pub id: RoleId,
}

#[cfg(test)]
mod tests {
    use rolewarden_core::{PrincipalId, RoleId};

    use super::Member;

    #[test]
    fn member_reports_held_roles_only() {
        let member = Member {
            principal_id: PrincipalId::new(1),
            role_ids: vec![RoleId::new(5), RoleId::new(9)],
        };

        assert!(member.has_role(RoleId::new(9)));
        assert!(!member.has_role(RoleId::new(7)));
    }
}
