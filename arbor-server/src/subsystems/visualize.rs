//! Visualization subsystem
//!
//! Loads the owner's graph with the request's upstream filters, narrows it to the
//! neighbourhood of a focus fragment when one is given, then derives the
//! render-ready view.

use std::collections::HashSet;

use arbor_core::config::VisualizationConfig;
use arbor_core::graph::{connected_set, restrict_branches};
use arbor_core::models::{BranchFilter, FragmentFilters, VisualizationRequest};
use arbor_core::visualize::{derive, Visualization};
use arbor_core::{ArborError, GraphStore};
use chrono::{DateTime, Utc};

pub const MAX_DEPTH_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

pub async fn visualize(
    store: &dyn GraphStore,
    owner: &str,
    request: &VisualizationRequest,
    defaults: &VisualizationConfig,
    now: DateTime<Utc>,
) -> Result<Visualization, ArborError> {
    let max_depth = request.max_depth.unwrap_or(defaults.max_depth);
    if !MAX_DEPTH_RANGE.contains(&max_depth) {
        return Err(ArborError::InvalidInput(
            "maxDepth must be between 1 and 5".to_string(),
        ));
    }
    let min_weight = request.min_weight.unwrap_or(defaults.min_weight);
    if !(0.0..=1.0).contains(&min_weight) {
        return Err(ArborError::InvalidInput(
            "minWeight must be between 0 and 1".to_string(),
        ));
    }

    let fragment_filters = FragmentFilters {
        fragment_types: request.fragment_types.clone(),
        tags: request.tags.clone(),
        created_after: request.created_after,
        created_before: request.created_before,
        ..Default::default()
    };
    let mut fragments = store
        .find_fragments(owner, &fragment_filters)
        .await
        .map_err(|e| e.escalate("visualize", &[owner]))?;

    let branch_filter = BranchFilter {
        types: request.connection_types.clone(),
        min_weight: Some(min_weight),
        ..BranchFilter::owner(owner)
    };
    let branches = store
        .find_branches(&branch_filter)
        .await
        .map_err(|e| e.escalate("visualize", &[owner]))?;

    let visible: HashSet<String> = fragments.iter().map(|f| f.id.clone()).collect();
    let mut branches = restrict_branches(branches, &visible);

    if let Some(focus_id) = &request.focus_fragment_id {
        store
            .find_fragment_by_id(focus_id, owner)
            .await
            .map_err(|e| e.escalate("visualize", &[owner, focus_id.as_str()]))?
            .ok_or_else(|| ArborError::NotFound("Fragment not found".to_string()))?;

        let reachable = connected_set(focus_id, &branches, max_depth as usize);
        fragments.retain(|f| reachable.contains(&f.id));
        branches = restrict_branches(branches, &reachable);
    }

    tracing::debug!(
        owner,
        nodes = fragments.len(),
        edges = branches.len(),
        focus = ?request.focus_fragment_id,
        "Visualization derived"
    );

    Ok(derive(&fragments, &branches, &request.style, now))
}

// ============================================================================
// TESTS
// ============================================================================
