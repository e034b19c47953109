//! Linker subsystem: automatic connection discovery
//!
//! Scores fragment pairs with the scoring engine and persists the strongest ones:
//! - With a focus fragment, every other fragment not yet connected to it is
//!   scored as `(candidate -> focus)`
//! - Without one, every ordered pair of the owner's most recent fragments is scored
//! - Candidates below `min_weight` are dropped; the rest are ranked by weight and
//!   capped at `max_connections`
//! - Writes are sequential and best-effort: an already-connected pair is skipped,
//!   any other failed write is logged and skipped

use std::collections::HashMap;

use arbor_core::config::AutoLinkConfig;
use arbor_core::models::{
    AutoLinkRequest, BranchRecord, BranchType, BranchWrite, Fragment, FragmentFilters, Metadata,
    NewBranch,
};
use arbor_core::{scoring, ArborError, GraphStore};

/// Allowed `max_connections` range
pub const MAX_CONNECTIONS_LIMIT: usize = 50;

/// Forward weight a pair needs before bidirectional mode also proposes the reverse
const REVERSE_THRESHOLD: f64 = 0.5;

/// Resolved auto-link parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AutoLinkOptions {
    pub focus_fragment_id: Option<String>,
    pub types: Vec<BranchType>,
    pub min_weight: f64,
    pub max_connections: usize,
    pub bidirectional: bool,
}

impl AutoLinkOptions {
    /// Fill unset request fields from `defaults` and range-check the result.
    pub fn resolve(request: AutoLinkRequest, defaults: &AutoLinkConfig) -> Result<Self, ArborError> {
        let options = Self {
            focus_fragment_id: request.focus_fragment_id,
            types: request.types.unwrap_or_else(|| defaults.types.clone()),
            min_weight: request.min_weight.unwrap_or(defaults.min_weight),
            max_connections: request.max_connections.unwrap_or(defaults.max_connections),
            bidirectional: request.bidirectional.unwrap_or(defaults.bidirectional),
        };

        if !(0.0..=1.0).contains(&options.min_weight) {
            return Err(ArborError::InvalidInput(
                "minWeight must be between 0 and 1".to_string(),
            ));
        }
        if !(1..=MAX_CONNECTIONS_LIMIT).contains(&options.max_connections) {
            return Err(ArborError::InvalidInput(format!(
                "maxConnections must be between 1 and {}",
                MAX_CONNECTIONS_LIMIT
            )));
        }
        Ok(options)
    }
}

/// A scored, not yet persisted connection
#[derive(Debug, Clone, PartialEq)]
pub struct LinkCandidate {
    pub source_id: String,
    pub target_id: String,
    pub branch_type: BranchType,
    pub weight: f64,
    pub metadata: Metadata,
}

impl From<LinkCandidate> for NewBranch {
    fn from(c: LinkCandidate) -> Self {
        Self {
            source_id: c.source_id,
            target_id: c.target_id,
            branch_type: c.branch_type,
            weight: c.weight,
            metadata: c.metadata,
        }
    }
}

/// Score ordered `(source, target)` pairs and return the ranked, capped candidates.
///
/// Ranking is a stable sort on weight, so equal weights keep pair order.
pub fn rank_candidates<'a, I>(pairs: I, options: &AutoLinkOptions) -> Vec<LinkCandidate>
where
    I: IntoIterator<Item = (&'a Fragment, &'a Fragment)>,
{
    let mut candidates = Vec::new();
    for (source, target) in pairs {
        let score = scoring::score(source, target, &options.types);
        if score.weight < options.min_weight {
            continue;
        }

        let reverse = (options.bidirectional && score.weight > REVERSE_THRESHOLD).then(|| {
            LinkCandidate {
                source_id: target.id.clone(),
                target_id: source.id.clone(),
                branch_type: score.branch_type,
                weight: score.weight,
                metadata: score.metadata.clone(),
            }
        });
        candidates.push(LinkCandidate {
            source_id: source.id.clone(),
            target_id: target.id.clone(),
            branch_type: score.branch_type,
            weight: score.weight,
            metadata: score.metadata,
        });
        candidates.extend(reverse);
    }

    candidates.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(options.max_connections);
    candidates
}

/// Every ordered pair of distinct fragments in `pool`
fn all_ordered_pairs(pool: &[Fragment]) -> Vec<(&Fragment, &Fragment)> {
    pool.iter()
        .flat_map(|f| {
            pool.iter()
                .filter(move |g| g.id != f.id)
                .map(move |g| (f, g))
        })
        .collect()
}

/// Discover and persist connections for `owner`.
///
/// Returns the branches actually created, in creation order.
pub async fn auto_link(
    store: &dyn GraphStore,
    owner: &str,
    options: &AutoLinkOptions,
    pool_limit: usize,
) -> Result<Vec<BranchRecord>, ArborError> {
    let (pool, focus) = match &options.focus_fragment_id {
        Some(focus_id) => {
            let focus = store
                .find_fragment_by_id(focus_id, owner)
                .await
                .map_err(|e| e.escalate("auto_link", &[owner, focus_id]))?
                .ok_or_else(|| ArborError::NotFound("Fragment not found".to_string()))?;

            let others = store
                .find_fragments(owner, &FragmentFilters::default())
                .await
                .map_err(|e| e.escalate("auto_link", &[owner, focus_id]))?;

            let mut pool = Vec::with_capacity(others.len());
            for fragment in others {
                if fragment.id == focus.id {
                    continue;
                }
                let connected = store
                    .branch_exists(&fragment.id, &focus.id)
                    .await
                    .map_err(|e| e.escalate("auto_link", &[owner, &fragment.id, &focus.id]))?;
                if !connected {
                    pool.push(fragment);
                }
            }
            (pool, Some(focus))
        }
        None => {
            let recent = store
                .find_fragments(owner, &FragmentFilters::newest(pool_limit))
                .await
                .map_err(|e| e.escalate("auto_link", &[owner]))?;
            (recent, None)
        }
    };

    let candidates = match &focus {
        Some(focus) => rank_candidates(pool.iter().map(|f| (f, focus)), options),
        None => rank_candidates(all_ordered_pairs(&pool), options),
    };

    tracing::debug!(
        owner,
        pool = pool.len(),
        candidates = candidates.len(),
        focused = focus.is_some(),
        "Auto-link candidates ranked"
    );

    let index: HashMap<&str, &Fragment> = pool
        .iter()
        .chain(focus.iter())
        .map(|f| (f.id.as_str(), f))
        .collect();

    let mut created = Vec::new();
    for candidate in candidates {
        let (source_id, target_id) = (candidate.source_id.clone(), candidate.target_id.clone());
        match store.create_branch(NewBranch::from(candidate)).await {
            Ok(BranchWrite::Created(branch)) => {
                if let (Some(source), Some(target)) =
                    (index.get(source_id.as_str()), index.get(target_id.as_str()))
                {
                    created.push(BranchRecord::new(branch, source, target));
                }
            }
            Ok(BranchWrite::Conflict) => {
                tracing::debug!(
                    owner,
                    source_id = %source_id,
                    target_id = %target_id,
                    "Connection exists, skipped"
                );
            }
            Err(e) => {
                tracing::warn!(
                    owner,
                    source_id = %source_id,
                    target_id = %target_id,
                    error = %e,
                    "Failed to persist auto-link candidate"
                );
            }
        }
    }

    if !created.is_empty() {
        tracing::info!(owner, links = created.len(), "Auto-link created connections");
    }

    Ok(created)
}

// ============================================================================
// TESTS
// ============================================================================
