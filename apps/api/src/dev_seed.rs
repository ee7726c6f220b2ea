use lineage_application::{CreateRoleInput, RoleService};
use lineage_core::AppResult;
use lineage_domain::Role;
use tracing::info;

struct SeedRole {
    name: &'static str,
    description: &'static str,
    capabilities: &'static [&'static str],
}

/// Default chain, least privileged first. Each role inherits from the one before it.
const DEV_SEED_ROLES: [SeedRole; 4] = [
    SeedRole {
        name: "user",
        description: "Basic user with limited access",
        capabilities: &["read:own"],
    },
    SeedRole {
        name: "editor",
        description: "Can edit content",
        capabilities: &["create:content", "edit:content"],
    },
    SeedRole {
        name: "manager",
        description: "Can manage content and users",
        capabilities: &["approve:content", "manage:users"],
    },
    SeedRole {
        name: "admin",
        description: "Full access to the system",
        capabilities: &["delete:any"],
    },
];

/// Ensures the default hierarchy exists. Safe to run repeatedly.
pub async fn run(role_service: &RoleService) -> AppResult<()> {
    let mut previous: Option<Role> = None;

    for seed in &DEV_SEED_ROLES {
        let role = ensure_seed_role(role_service, seed).await?;

        if let Some(parent) = &previous {
            role_service.link_roles(parent.id(), role.id()).await?;
        }
        previous = Some(role);
    }

    info!(roles = DEV_SEED_ROLES.len(), "role hierarchy seed applied");
    Ok(())
}

async fn ensure_seed_role(role_service: &RoleService, seed: &SeedRole) -> AppResult<Role> {
    match role_service.graph().role_by_name(seed.name).await {
        Ok(role) => Ok(role),
        Err(error) if error.is_not_found() => {
            let role = role_service
                .create_role(CreateRoleInput {
                    name: seed.name.to_owned(),
                    description: Some(seed.description.to_owned()),
                    capabilities: seed
                        .capabilities
                        .iter()
                        .map(|capability| (*capability).to_owned())
                        .collect(),
                    parent_role_id: None,
                })
                .await?;
            info!(role_id = %role.id(), role = seed.name, "seeded role");
            Ok(role)
        }
        Err(error) => Err(error),
    }
}
