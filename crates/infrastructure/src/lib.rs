//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod database;
mod http_role_authority;
mod postgres_grant_store;

pub use database::{StoreConfig, connect_with_retry};
pub use http_role_authority::HttpRoleAuthority;
pub use postgres_grant_store::PostgresGrantStore;
