//! Application services and ports for the temporary-grant lifecycle.

#![forbid(unsafe_code)]

mod grant_ports;
mod grant_service;
mod reconciliation;

pub use grant_ports::{GrantStore, RoleAuthority, UpsertGrantInput};
pub use grant_service::GrantService;
pub use reconciliation::ReconciliationScheduler;
