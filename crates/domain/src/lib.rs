//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod hierarchy;
mod role;
mod role_ref;

pub use hierarchy::HierarchyEdge;
pub use role::{Capability, ROLE_NAME_MAX_LENGTH, Role, RoleId, RoleName};
pub use role_ref::RoleRef;
