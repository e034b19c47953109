//! Branch CRUD
//!
//! Every operation is scoped to the owner's fragments and answers with
//! [`BranchRecord`]s: the branch joined with summaries of both endpoints.

use std::collections::HashMap;

use arbor_core::models::{
    Branch, BranchFilter, BranchPatch, BranchRecord, BranchWrite, CreateBranch, Fragment,
    FragmentFilters, NewBranch,
};
use arbor_core::{ArborError, GraphStore};

fn connection_not_found() -> ArborError {
    ArborError::NotFound("Connection not found".to_string())
}

/// All of the owner's fragments keyed by id, for joining branch endpoints.
pub(crate) async fn fragment_index(
    store: &dyn GraphStore,
    owner: &str,
) -> Result<HashMap<String, Fragment>, ArborError> {
    let fragments = store
        .find_fragments(owner, &FragmentFilters::default())
        .await
        .map_err(|e| e.escalate("load_fragments", &[owner]))?;
    Ok(fragments.into_iter().map(|f| (f.id.clone(), f)).collect())
}

fn join(branch: Branch, index: &HashMap<String, Fragment>) -> Option<BranchRecord> {
    let source = index.get(&branch.source_id)?;
    let target = index.get(&branch.target_id)?;
    Some(BranchRecord::new(branch, source, target))
}

async fn load_record(
    store: &dyn GraphStore,
    owner: &str,
    branch: Branch,
) -> Result<BranchRecord, ArborError> {
    let source = store
        .find_fragment_by_id(&branch.source_id, owner)
        .await
        .map_err(|e| e.escalate("load_branch_endpoints", &[owner, &branch.id]))?;
    let target = store
        .find_fragment_by_id(&branch.target_id, owner)
        .await
        .map_err(|e| e.escalate("load_branch_endpoints", &[owner, &branch.id]))?;

    match (source, target) {
        (Some(source), Some(target)) => Ok(BranchRecord::new(branch, &source, &target)),
        _ => Err(connection_not_found()),
    }
}

/// Create a connection between two of the owner's fragments.
///
/// Checks run in order: endpoints exist, no self-loop, weight in range, pair not
/// already connected in either direction.
pub async fn create_branch(
    store: &dyn GraphStore,
    owner: &str,
    request: CreateBranch,
) -> Result<BranchRecord, ArborError> {
    let ids = [owner, request.source_id.as_str(), request.target_id.as_str()];
    let source = store
        .find_fragment_by_id(&request.source_id, owner)
        .await
        .map_err(|e| e.escalate("create_branch", &ids))?
        .ok_or_else(|| ArborError::NotFound("Source fragment not found".to_string()))?;
    let target = store
        .find_fragment_by_id(&request.target_id, owner)
        .await
        .map_err(|e| e.escalate("create_branch", &ids))?
        .ok_or_else(|| ArborError::NotFound("Target fragment not found".to_string()))?;

    let new_branch = NewBranch::from(request);
    new_branch.validate()?;

    match store
        .create_branch(new_branch)
        .await
        .map_err(|e| e.escalate("create_branch", &[owner, &source.id, &target.id]))?
    {
        BranchWrite::Created(branch) => {
            tracing::info!(
                owner,
                branch_id = %branch.id,
                source_id = %branch.source_id,
                target_id = %branch.target_id,
                branch_type = %branch.branch_type,
                weight = branch.weight,
                "Connection created"
            );
            Ok(BranchRecord::new(branch, &source, &target))
        }
        BranchWrite::Conflict => Err(ArborError::Conflict(
            "Connection already exists between these fragments".to_string(),
        )),
    }
}

pub async fn get_branch(
    store: &dyn GraphStore,
    owner: &str,
    id: &str,
) -> Result<BranchRecord, ArborError> {
    let branch = store
        .find_branch_by_id(id, owner)
        .await
        .map_err(|e| e.escalate("get_branch", &[owner, id]))?
        .ok_or_else(connection_not_found)?;
    load_record(store, owner, branch).await
}

/// Branches touching the owner's fragments, newest first. `filter.involving_owner`
/// is always overwritten with `owner`.
pub async fn list_branches(
    store: &dyn GraphStore,
    owner: &str,
    mut filter: BranchFilter,
) -> Result<Vec<BranchRecord>, ArborError> {
    filter.involving_owner = owner.to_string();
    let branches = store
        .find_branches(&filter)
        .await
        .map_err(|e| e.escalate("list_branches", &[owner]))?;
    let index = fragment_index(store, owner).await?;
    Ok(branches
        .into_iter()
        .filter_map(|b| join(b, &index))
        .collect())
}

pub async fn update_branch(
    store: &dyn GraphStore,
    owner: &str,
    id: &str,
    patch: &BranchPatch,
) -> Result<BranchRecord, ArborError> {
    patch.validate()?;
    store
        .find_branch_by_id(id, owner)
        .await
        .map_err(|e| e.escalate("update_branch", &[owner, id]))?
        .ok_or_else(connection_not_found)?;

    let updated = store
        .update_branch(id, patch)
        .await
        .map_err(|e| e.escalate("update_branch", &[owner, id]))?;

    tracing::info!(owner, branch_id = %id, "Connection updated");
    load_record(store, owner, updated).await
}

pub async fn delete_branch(store: &dyn GraphStore, owner: &str, id: &str) -> Result<(), ArborError> {
    store
        .find_branch_by_id(id, owner)
        .await
        .map_err(|e| e.escalate("delete_branch", &[owner, id]))?
        .ok_or_else(connection_not_found)?;

    store
        .delete_branch(id)
        .await
        .map_err(|e| e.escalate("delete_branch", &[owner, id]))?;

    tracing::info!(owner, branch_id = %id, "Connection deleted");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
