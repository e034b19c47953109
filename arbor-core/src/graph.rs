//! Bounded breadth-first traversal over branches
//!
//! Branches are treated as undirected: a walk from `a` reaches `b` whether the
//! branch was stored as `a -> b` or `b -> a`. The result depends only on the
//! set of branches, never on their order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::Branch;

/// Undirected adjacency built once per traversal
fn adjacency(branches: &[Branch]) -> HashMap<&str, Vec<&str>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for branch in branches {
        adjacency
            .entry(branch.source_id.as_str())
            .or_default()
            .push(branch.target_id.as_str());
        adjacency
            .entry(branch.target_id.as_str())
            .or_default()
            .push(branch.source_id.as_str());
    }
    adjacency
}

/// Fragment ids reachable from `focus_id` within `max_depth` hops.
///
/// The focus itself is always included, so depth 0 yields `{focus_id}`.
pub fn connected_set(focus_id: &str, branches: &[Branch], max_depth: usize) -> HashSet<String> {
    let adjacency = adjacency(branches);

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    visited.insert(focus_id);
    queue.push_back((focus_id, 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(neighbours) = adjacency.get(node) else {
            continue;
        };
        for &next in neighbours {
            if visited.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }

    visited.into_iter().map(str::to_string).collect()
}

/// Keep only branches whose endpoints are both in `ids`
pub fn restrict_branches(branches: Vec<Branch>, ids: &HashSet<String>) -> Vec<Branch> {
    branches
        .into_iter()
        .filter(|b| ids.contains(&b.source_id) && ids.contains(&b.target_id))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BranchType, Metadata};
    use chrono::Utc;

    fn branch(source: &str, target: &str) -> Branch {
        let now = Utc::now();
        Branch {
            id: format!("{}-{}", source, target),
            source_id: source.to_string(),
            target_id: target.to_string(),
            branch_type: BranchType::Theme,
            weight: 0.5,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// a - b - c - d, plus e - a and an isolated x - y
    fn chain() -> Vec<Branch> {
        vec![
            branch("a", "b"),
            branch("c", "b"),
            branch("c", "d"),
            branch("e", "a"),
            branch("x", "y"),
        ]
    }

    // ========================================================================
    // TEST 1: depth 0 is the focus alone
    // ========================================================================
    #[test]
    fn test_depth_zero_is_focus_only() {
        assert_eq!(connected_set("a", &chain(), 0), ids(&["a"]));
    }

    // ========================================================================
    // TEST 2: edges are followed in both directions
    // ========================================================================
    #[test]
    fn test_undirected_expansion() {
        assert_eq!(connected_set("a", &chain(), 1), ids(&["a", "b", "e"]));
        assert_eq!(connected_set("a", &chain(), 2), ids(&["a", "b", "c", "e"]));
        assert_eq!(
            connected_set("a", &chain(), 5),
            ids(&["a", "b", "c", "d", "e"])
        );
    }

    // ========================================================================
    // TEST 3: unknown focus still contains itself
    // ========================================================================
    #[test]
    fn test_isolated_focus() {
        assert_eq!(connected_set("zzz", &chain(), 3), ids(&["zzz"]));
        assert_eq!(connected_set("a", &[], 3), ids(&["a"]));
    }

    // ========================================================================
    // TEST 4: never shrinks as depth grows
    // ========================================================================
    #[test]
    fn test_monotonic_in_depth() {
        let branches = chain();
        let mut previous = connected_set("d", &branches, 0);
        for depth in 1..=6 {
            let current = connected_set("d", &branches, depth);
            assert!(previous.is_subset(&current), "depth {} shrank", depth);
            previous = current;
        }
    }

    // ========================================================================
    // TEST 5: order of branches does not matter
    // ========================================================================
    #[test]
    fn test_order_independent() {
        let forward = chain();
        let mut reversed = chain();
        reversed.reverse();
        for depth in 0..4 {
            assert_eq!(
                connected_set("c", &forward, depth),
                connected_set("c", &reversed, depth)
            );
        }
    }

    // ========================================================================
    // TEST 6: cycles terminate
    // ========================================================================
    #[test]
    fn test_cycle_terminates() {
        let cycle = vec![branch("a", "b"), branch("b", "c"), branch("c", "a")];
        assert_eq!(connected_set("a", &cycle, 10), ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_restrict_branches() {
        let kept = restrict_branches(chain(), &ids(&["a", "b", "c"]));
        let kept_ids: Vec<&str> = kept.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(kept_ids, vec!["a-b", "c-b"]);
    }
}
