//! Shared primitives for all Rust crates in Rolewarden.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Rolewarden crates.
pub type AppResult<T> = Result<T, AppError>;

/// Store-assigned surrogate identifier of a persisted grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantId(i64);

impl GrantId {
    /// Wraps a surrogate key returned by the store.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for GrantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of the entity a role applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(i64);

impl PrincipalId {
    /// Wraps a chat-platform snowflake identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for PrincipalId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of the tenant/server scope a role and principal belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RealmId(i64);

impl RealmId {
    /// Wraps a chat-platform snowflake identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for RealmId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of a role within a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(i64);

impl RoleId {
    /// Wraps a chat-platform snowflake identifier.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for RoleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// The durable store cannot be reached or a call could not complete.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The authorization system rejected the operation for lack of permission.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Temporary failure worth retrying on a later pass.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::{AppError, PrincipalId, RoleId};

    #[test]
    fn identifiers_format_as_plain_integers() {
        assert_eq!(PrincipalId::new(1234).to_string(), "1234");
        assert_eq!(RoleId::new(987_654_321).to_string(), "987654321");
    }

    #[test]
    fn storage_unavailable_carries_detail() {
        let error = AppError::StorageUnavailable("pool exhausted".to_owned());
        assert_eq!(error.to_string(), "storage unavailable: pool exhausted");
    }
}
