use tracing::{debug, warn};

use lineage_domain::{RoleId, RoleRef};

use crate::{CapabilityResolver, HierarchyGraph, HierarchySnapshot};

/// The single allow/deny decision point for protected operations.
///
/// A decision is evaluated against one snapshot, has no side effects and
/// caches nothing across calls.
#[derive(Clone)]
pub struct AccessGuard {
    graph: HierarchyGraph,
}

/// An assigned role after boundary resolution.
struct ResolvedRole<'a> {
    reference: &'a RoleRef,
    role_id: Option<RoleId>,
    name: Option<&'a str>,
}

impl AccessGuard {
    /// Creates a guard over the shared hierarchy graph.
    #[must_use]
    pub fn new(graph: HierarchyGraph) -> Self {
        Self { graph }
    }

    /// Returns true when any assigned role satisfies any required role.
    ///
    /// An empty requirement list allows every authenticated caller; an empty
    /// assignment denies every non-empty requirement. Assigned references that
    /// cannot be resolved grant nothing instead of failing the request, and a
    /// store that cannot report its revision denies.
    pub async fn is_authorized(&self, assigned_roles: &[RoleRef], required_roles: &[String]) -> bool {
        if required_roles.is_empty() {
            return true;
        }
        if assigned_roles.is_empty() {
            debug!(?required_roles, "denied caller without assigned roles");
            return false;
        }

        let snapshot = match self.graph.current_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "role hierarchy could not be verified, denying");
                return false;
            }
        };
        let allowed = Self::decide(&snapshot, assigned_roles, required_roles);
        debug!(?assigned_roles, ?required_roles, allowed, "access guard decision");
        allowed
    }

    fn decide(
        snapshot: &HierarchySnapshot,
        assigned_roles: &[RoleRef],
        required_roles: &[String],
    ) -> bool {
        let resolved = assigned_roles
            .iter()
            .map(|reference| resolve(snapshot, reference))
            .collect::<Vec<_>>();

        for required in required_roles {
            if resolved
                .iter()
                .any(|role| role.name == Some(required.as_str()))
            {
                return true;
            }

            for role in &resolved {
                let Some(role_id) = role.role_id else {
                    continue;
                };
                match CapabilityResolver::has_capability_in(snapshot, role_id, required) {
                    Ok(true) => return true,
                    Ok(false) => {}
                    Err(error) => {
                        warn!(reference = %role.reference, %error, "assigned role grants nothing");
                    }
                }
            }
        }

        false
    }
}

fn resolve<'a>(snapshot: &'a HierarchySnapshot, reference: &'a RoleRef) -> ResolvedRole<'a> {
    match reference {
        RoleRef::ByName(name) => ResolvedRole {
            reference,
            role_id: snapshot.role_by_name(name).map(|role| role.id()),
            name: Some(name.as_str()),
        },
        RoleRef::ById(role_id) => ResolvedRole {
            reference,
            role_id: Some(*role_id),
            name: snapshot.role(*role_id).map(|role| role.name().as_str()),
        },
    }
}
