use std::collections::{BTreeSet, HashSet};

use lineage_core::AppError;
use lineage_domain::{HierarchyEdge, Role, RoleId, RoleName};
use proptest::prelude::*;

use super::{HierarchyGraph, HierarchySnapshot, ParentAssignment, SnapshotChange};
use crate::{CapabilityResolver, RoleChanges};
use crate::test_support::{
    empty_graph, new_role, seeded_chain, seeded_chain_with_repository, unwrap_ok,
};

#[tokio::test]
async fn ancestors_are_listed_nearest_first() {
    let (graph, chain) = seeded_chain().await;

    let ancestors = unwrap_ok(graph.ancestors_of(chain.admin).await);
    assert_eq!(ancestors, vec![chain.manager, chain.editor, chain.user]);

    let root_ancestors = unwrap_ok(graph.ancestors_of(chain.user).await);
    assert!(root_ancestors.is_empty());
}

#[tokio::test]
async fn direct_neighbours_only() {
    let (graph, chain) = seeded_chain().await;

    assert_eq!(
        unwrap_ok(graph.parents_of(chain.manager).await),
        BTreeSet::from([chain.editor])
    );
    assert_eq!(
        unwrap_ok(graph.children_of(chain.manager).await),
        BTreeSet::from([chain.admin])
    );
    assert!(unwrap_ok(graph.children_of(chain.admin).await).is_empty());
}

#[tokio::test]
async fn closing_the_chain_is_a_circular_dependency() {
    let (graph, chain) = seeded_chain().await;

    let result = graph.add_edge(chain.admin, chain.user).await;
    assert!(matches!(result, Err(AppError::CircularDependency(_))));

    let result = graph.add_edge(chain.manager, chain.editor).await;
    assert!(matches!(result, Err(AppError::CircularDependency(_))));
}

#[tokio::test]
async fn self_loops_are_rejected_even_for_unknown_roles() {
    let (graph, chain) = seeded_chain().await;

    let known = graph.add_edge(chain.editor, chain.editor).await;
    assert!(matches!(known, Err(AppError::CircularDependency(_))));

    let unknown = graph.add_edge(RoleId::new(404), RoleId::new(404)).await;
    assert!(matches!(unknown, Err(AppError::CircularDependency(_))));
}

#[tokio::test]
async fn unknown_endpoints_are_not_found() {
    let (graph, chain) = seeded_chain().await;

    let missing_parent = graph.add_edge(RoleId::new(404), chain.user).await;
    assert!(matches!(missing_parent, Err(AppError::NotFound(_))));

    let missing_child = graph.add_edge(chain.user, RoleId::new(404)).await;
    assert!(matches!(missing_child, Err(AppError::NotFound(_))));

    let missing_query = graph.ancestors_of(RoleId::new(404)).await;
    assert!(matches!(missing_query, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn parallel_edge_is_accepted_and_deduplicated() {
    let (graph, chain) = seeded_chain().await;

    let edge = unwrap_ok(graph.add_edge(chain.user, chain.admin).await);
    assert_eq!(edge.parent_id(), chain.user);

    let ancestors = unwrap_ok(graph.ancestors_of(chain.admin).await);
    assert_eq!(ancestors, vec![chain.user, chain.manager, chain.editor]);

    let again = unwrap_ok(graph.add_edge(chain.user, chain.admin).await);
    assert_eq!(again, edge);
    assert_eq!(unwrap_ok(graph.edges().await).len(), 4);
}

#[tokio::test]
async fn removing_missing_edge_is_a_no_op() {
    let (graph, chain) = seeded_chain().await;

    let removed = unwrap_ok(graph.remove_edge(chain.admin, chain.user).await);
    assert!(!removed);
    assert_eq!(unwrap_ok(graph.edges().await).len(), 3);
}

#[tokio::test]
async fn remove_all_edges_for_detaches_role() {
    let (graph, chain, repository) = seeded_chain_with_repository().await;

    let removed = unwrap_ok(graph.remove_all_edges_for(chain.editor).await);
    assert_eq!(removed, 2);
    assert_eq!(repository.stored_edges().await, vec![(chain.manager, chain.admin)]);
    assert!(unwrap_ok(graph.parents_of(chain.manager).await).is_empty());
}

#[tokio::test]
async fn deleting_role_cascades_edges_but_keeps_descendants() {
    let (graph, chain, repository) = seeded_chain_with_repository().await;

    unwrap_ok(graph.delete_role(chain.editor).await);

    assert!(matches!(graph.role(chain.editor).await, Err(AppError::NotFound(_))));
    assert!(graph.role(chain.manager).await.is_ok());
    assert_eq!(repository.stored_edges().await, vec![(chain.manager, chain.admin)]);
    assert_eq!(
        unwrap_ok(graph.ancestors_of(chain.admin).await),
        vec![chain.manager]
    );

    let deleted_again = graph.delete_role(chain.editor).await;
    assert!(matches!(deleted_again, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn create_role_with_unknown_parent_writes_nothing() {
    let (graph, repository) = empty_graph().await;

    let result = graph
        .create_role(new_role("orphan", &[]), Some(RoleId::new(7)))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(repository.stored_role_count().await, 0);
    assert!(unwrap_ok(graph.roles().await).is_empty());
}

#[tokio::test]
async fn failed_parent_link_rolls_back_created_role() {
    let (graph, chain, repository) = seeded_chain_with_repository().await;
    repository.fail_edge_inserts();

    let result = graph
        .create_role(new_role("auditor", &[]), Some(chain.user))
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(repository.stored_role_count().await, 4);
    assert!(graph.role_by_name("auditor").await.is_err());
}

#[tokio::test]
async fn duplicate_role_name_is_a_conflict() {
    let (graph, _) = seeded_chain().await;

    let result = graph.create_role(new_role("editor", &[]), None).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn parent_reassignment_checks_cycles_before_removing_edges() {
    let (graph, chain, repository) = seeded_chain_with_repository().await;

    let result = graph
        .update_role(
            chain.user,
            RoleChanges::default(),
            ParentAssignment::Replace(chain.admin),
        )
        .await;
    assert!(matches!(result, Err(AppError::CircularDependency(_))));
    assert_eq!(repository.stored_edges().await.len(), 3);
}

#[tokio::test]
async fn parent_reassignment_replaces_and_clears_edges() {
    let (graph, chain) = seeded_chain().await;

    unwrap_ok(
        graph
            .update_role(
                chain.admin,
                RoleChanges::default(),
                ParentAssignment::Replace(chain.user),
            )
            .await,
    );
    assert_eq!(
        unwrap_ok(graph.parents_of(chain.admin).await),
        BTreeSet::from([chain.user])
    );

    let changes = RoleChanges {
        description: Some(Some("Full access".to_owned())),
        capabilities: None,
    };
    let updated = unwrap_ok(
        graph
            .update_role(chain.admin, changes, ParentAssignment::Clear)
            .await,
    );
    assert_eq!(updated.description(), Some("Full access"));
    assert!(unwrap_ok(graph.parents_of(chain.admin).await).is_empty());
    assert!(unwrap_ok(graph.ancestors_of(chain.admin).await).is_empty());
}

#[tokio::test]
async fn edge_change_invalidates_only_affected_closures() {
    let (graph, chain) = seeded_chain().await;

    let warm = unwrap_ok(graph.current_snapshot().await);
    for role_id in chain.all() {
        let _ = warm.ancestors_of(role_id);
    }
    assert_eq!(warm.cached_roles().len(), 4);

    unwrap_ok(graph.remove_edge(chain.editor, chain.manager).await);
    let next = graph.snapshot().await;
    assert_eq!(next.cached_roles(), BTreeSet::from([chain.user, chain.editor]));
    assert_eq!(next.ancestors_of(chain.admin).to_vec(), vec![chain.manager]);
}

#[tokio::test]
async fn cycles_written_behind_the_graph_are_quarantined() {
    let (graph, chain, repository) = seeded_chain_with_repository().await;
    repository.force_edge(chain.admin, chain.user).await;

    let snapshot = unwrap_ok(graph.current_snapshot().await);

    for role_id in chain.all() {
        assert!(snapshot.is_quarantined(role_id));
        assert!(snapshot.ancestors_of(role_id).is_empty());
    }
    let result = graph.add_edge(chain.user, chain.manager).await;
    assert!(matches!(result, Err(AppError::CircularDependency(_))));
}

#[tokio::test]
async fn failed_parent_reassignment_still_publishes_committed_attributes() {
    let (graph, chain, repository) = seeded_chain_with_repository().await;
    let resolver = CapabilityResolver::new(graph.clone());
    assert!(matches!(
        resolver.has_capability(chain.manager, "edit:content").await,
        Ok(true)
    ));
    repository.fail_parent_replacements();

    let changes = RoleChanges {
        description: None,
        capabilities: Some(BTreeSet::new()),
    };
    let result = graph
        .update_role(chain.editor, changes, ParentAssignment::Clear)
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    let published = graph.snapshot().await;
    let editor = published.role(chain.editor).cloned();
    assert!(editor.is_some_and(|role| role.capabilities().is_empty()));
    assert!(matches!(
        CapabilityResolver::has_capability_in(&published, chain.manager, "edit:content"),
        Ok(false)
    ));
    assert!(matches!(
        resolver.has_capability(chain.manager, "edit:content").await,
        Ok(false)
    ));
    assert_eq!(
        unwrap_ok(graph.parents_of(chain.editor).await),
        BTreeSet::from([chain.user])
    );
}

#[tokio::test]
async fn another_graph_over_the_same_store_sees_committed_changes() {
    let (writer, chain, repository) = seeded_chain_with_repository().await;
    let reader = unwrap_ok(HierarchyGraph::load(repository).await);
    assert_eq!(
        unwrap_ok(reader.ancestors_of(chain.manager).await),
        vec![chain.editor, chain.user]
    );

    unwrap_ok(writer.remove_edge(chain.user, chain.editor).await);
    assert_eq!(
        unwrap_ok(reader.ancestors_of(chain.manager).await),
        vec![chain.editor]
    );

    unwrap_ok(writer.delete_role(chain.admin).await);
    assert!(matches!(reader.role(chain.admin).await, Err(AppError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ring_insertions_leave_exactly_one_rejected() {
    const RING: i64 = 8;
    let (graph, repository) = empty_graph().await;

    let mut ids = Vec::new();
    for index in 0..RING {
        let role = unwrap_ok(
            graph
                .create_role(new_role(&format!("ring-{index}"), &[]), None)
                .await,
        );
        ids.push(role.id());
    }

    let mut handles = Vec::new();
    for index in 0..ids.len() {
        let graph = graph.clone();
        let parent_id = ids[index];
        let child_id = ids[(index + 1) % ids.len()];
        handles.push(tokio::spawn(async move {
            graph.add_edge(parent_id, child_id).await
        }));
    }

    let mut rejected = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(AppError::CircularDependency(_))) => rejected += 1,
            Ok(Err(error)) => panic!("unexpected error: {error}"),
            Err(join_error) => panic!("task failed: {join_error}"),
        }
    }

    assert_eq!(rejected, 1);
    assert_eq!(repository.stored_edges().await.len(), ids.len() - 1);

    let rebuilt = HierarchySnapshot::build(
        unwrap_ok(graph.roles().await),
        unwrap_ok(graph.edges().await),
    );
    assert!(ids.iter().all(|role_id| !rebuilt.is_quarantined(*role_id)));
}

fn plain_role(index: i64) -> Role {
    let name = unwrap_ok(RoleName::new(format!("role-{index}")));
    Role::new(RoleId::new(index), name, None, BTreeSet::new())
}

proptest! {
    #[test]
    fn checked_insertions_keep_graph_acyclic_and_cache_exact(
        candidates in prop::collection::vec((1_i64..=12, 1_i64..=12), 0..60)
    ) {
        let roles = (1..=12).map(plain_role).collect::<Vec<_>>();
        let mut snapshot = HierarchySnapshot::build(roles.clone(), Vec::new());

        for (parent, child) in candidates {
            let (parent_id, child_id) = (RoleId::new(parent), RoleId::new(child));
            for role in &roles {
                let _ = snapshot.ancestors_of(role.id());
            }
            if snapshot.would_create_cycle(parent_id, child_id) {
                prop_assert!(
                    parent_id == child_id || snapshot.ancestors_of(parent_id).contains(&child_id)
                );
                continue;
            }
            let Ok(edge) = HierarchyEdge::new(parent_id, child_id, "2024-01-01T00:00:00Z") else {
                continue;
            };
            snapshot = snapshot.apply(&SnapshotChange::AddEdge(edge));
        }

        let rebuilt = HierarchySnapshot::build(roles.clone(), snapshot.edges().cloned().collect());
        for role in &roles {
            prop_assert!(!rebuilt.is_quarantined(role.id()));
            prop_assert!(!snapshot.ancestors_of(role.id()).contains(&role.id()));

            let cached: HashSet<RoleId> = snapshot.ancestors_of(role.id()).iter().copied().collect();
            let fresh: HashSet<RoleId> = rebuilt.ancestors_of(role.id()).iter().copied().collect();
            prop_assert_eq!(cached, fresh);
        }
    }
}
