//! Fragment CRUD scoped to an owner

use arbor_core::models::{Fragment, FragmentFilters, FragmentPatch, NewFragment};
use arbor_core::{ArborError, GraphStore};

pub async fn create_fragment(
    store: &dyn GraphStore,
    owner: &str,
    fragment: NewFragment,
) -> Result<Fragment, ArborError> {
    fragment.validate()?;
    let created = store
        .create_fragment(owner, fragment)
        .await
        .map_err(|e| e.escalate("create_fragment", &[owner]))?;

    tracing::info!(
        owner,
        fragment_id = %created.id,
        fragment_type = %created.fragment_type,
        "Fragment created"
    );
    Ok(created)
}

/// The owner's fragment, or `NotFound`.
pub async fn get_fragment(
    store: &dyn GraphStore,
    owner: &str,
    id: &str,
) -> Result<Fragment, ArborError> {
    store
        .find_fragment_by_id(id, owner)
        .await
        .map_err(|e| e.escalate("get_fragment", &[owner, id]))?
        .ok_or_else(|| ArborError::NotFound("Fragment not found".to_string()))
}

pub async fn list_fragments(
    store: &dyn GraphStore,
    owner: &str,
    filters: &FragmentFilters,
) -> Result<Vec<Fragment>, ArborError> {
    store
        .find_fragments(owner, filters)
        .await
        .map_err(|e| e.escalate("list_fragments", &[owner]))
}

pub async fn update_fragment(
    store: &dyn GraphStore,
    owner: &str,
    id: &str,
    patch: &FragmentPatch,
) -> Result<Fragment, ArborError> {
    patch.validate()?;
    let updated = store
        .update_fragment(id, owner, patch)
        .await
        .map_err(|e| e.escalate("update_fragment", &[owner, id]))?;

    tracing::info!(owner, fragment_id = %id, "Fragment updated");
    Ok(updated)
}

/// Deletes the fragment and every connection touching it.
pub async fn delete_fragment(store: &dyn GraphStore, owner: &str, id: &str) -> Result<(), ArborError> {
    store
        .delete_fragment(id, owner)
        .await
        .map_err(|e| e.escalate("delete_fragment", &[owner, id]))?;

    tracing::info!(owner, fragment_id = %id, "Fragment deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::models::{BranchType, CreateBranch};
    use arbor_core::InMemoryGraphStore;

    #[tokio::test]
    async fn test_fragment_lifecycle() {
        let store = InMemoryGraphStore::new();
        let mut new = NewFragment::new("Morning pages");
        new.tags = vec!["writing".into()];
        let created = create_fragment(&store, "u1", new).await.unwrap();

        let fetched = get_fragment(&store, "u1", &created.id).await.unwrap();
        assert_eq!(fetched.content, "Morning pages");

        let patch = FragmentPatch {
            mood: Some("calm".into()),
            ..Default::default()
        };
        let updated = update_fragment(&store, "u1", &created.id, &patch).await.unwrap();
        assert_eq!(updated.mood.as_deref(), Some("calm"));
        assert_eq!(updated.tags, vec!["writing".to_string()]);

        delete_fragment(&store, "u1", &created.id).await.unwrap();
        let err = get_fragment(&store, "u1", &created.id).await.unwrap_err();
        assert!(matches!(err, ArborError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_read() {
        let store = InMemoryGraphStore::new();
        let created = create_fragment(&store, "u1", NewFragment::new("private"))
            .await
            .unwrap();
        let err = get_fragment(&store, "u2", &created.id).await.unwrap_err();
        assert!(matches!(err, ArborError::NotFound(_)));
        assert!(list_fragments(&store, "u2", &FragmentFilters::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let store = InMemoryGraphStore::new();
        let err = create_fragment(&store, "u1", NewFragment::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ArborError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_connections() {
        let store = InMemoryGraphStore::new();
        let a = create_fragment(&store, "u1", NewFragment::new("a")).await.unwrap();
        let b = create_fragment(&store, "u1", NewFragment::new("b")).await.unwrap();
        crate::subsystems::branches::create_branch(
            &store,
            "u1",
            CreateBranch {
                source_id: a.id.clone(),
                target_id: b.id.clone(),
                branch_type: BranchType::Manual,
                weight: None,
                metadata: None,
            },
        )
        .await
        .unwrap();

        delete_fragment(&store, "u1", &a.id).await.unwrap();
        assert_eq!(store.branch_count().await, 0);
    }
}
