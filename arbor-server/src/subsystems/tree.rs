use std::collections::HashSet;

use arbor_core::graph::restrict_branches;
use arbor_core::models::{BranchFilter, FragmentFilters};
use arbor_core::tree::{build_memory_tree, MemoryTree};
use arbor_core::{ArborError, GraphStore};

/// All of the owner's fragments and the connections among them.
pub async fn memory_tree(store: &dyn GraphStore, owner: &str) -> Result<MemoryTree, ArborError> {
    let fragments = store
        .find_fragments(owner, &FragmentFilters::default())
        .await
        .map_err(|e| e.escalate("memory_tree", &[owner]))?;
    let branches = store
        .find_branches(&BranchFilter::owner(owner))
        .await
        .map_err(|e| e.escalate("memory_tree", &[owner]))?;

    let ids: HashSet<String> = fragments.iter().map(|f| f.id.clone()).collect();
    let branches = restrict_branches(branches, &ids);

    let tree = build_memory_tree(&fragments, &branches);
    tracing::debug!(
        owner,
        fragments = tree.stats.total_fragments,
        connections = tree.stats.total_connections,
        "Memory tree built"
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::branches::create_branch;
    use arbor_core::models::{BranchType, CreateBranch, NewFragment};
    use arbor_core::InMemoryGraphStore;

    #[tokio::test]
    async fn test_memory_tree_for_owner() {
        let store = InMemoryGraphStore::new();
        let a = store.create_fragment("u1", NewFragment::new("a")).await.unwrap();
        let b = store.create_fragment("u1", NewFragment::new("b")).await.unwrap();
        store.create_fragment("u1", NewFragment::new("c")).await.unwrap();
        store.create_fragment("u2", NewFragment::new("other")).await.unwrap();
        create_branch(
            &store,
            "u1",
            CreateBranch {
                source_id: a.id.clone(),
                target_id: b.id.clone(),
                branch_type: BranchType::Theme,
                weight: Some(0.75),
                metadata: None,
            },
        )
        .await
        .unwrap();

        let tree = memory_tree(&store, "u1").await.unwrap();
        assert_eq!(tree.stats.total_fragments, 3);
        assert_eq!(tree.stats.total_connections, 1);
        assert!((tree.stats.average_connections - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(tree.stats.strongest_connection, 0.75);
        assert_eq!(tree.stats.connection_types[&BranchType::Theme], 1);

        let empty = memory_tree(&store, "nobody").await.unwrap();
        assert_eq!(empty.stats.total_fragments, 0);
        assert_eq!(empty.stats.average_connections, 0.0);
    }
}
