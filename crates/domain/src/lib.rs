//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod authority;
mod grant;

pub use authority::{Member, Realm, RoleHandle};
pub use grant::Grant;
