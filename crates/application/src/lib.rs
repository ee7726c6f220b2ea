//! Application services and ports.

#![forbid(unsafe_code)]

mod access_guard;
mod capability_resolver;
mod hierarchy_graph;
mod hierarchy_visualizer;
mod role_ports;
mod role_service;

#[cfg(test)]
mod test_support;

pub use access_guard::AccessGuard;
pub use capability_resolver::CapabilityResolver;
pub use hierarchy_graph::{HierarchyGraph, HierarchySnapshot, ParentAssignment};
pub use hierarchy_visualizer::{HierarchyVisualizer, VISUALIZATION_HEADER};
pub use role_ports::{NewRole, RoleChanges, RoleRepository};
pub use role_service::{CreateRoleInput, RoleService, UpdateRoleInput};
