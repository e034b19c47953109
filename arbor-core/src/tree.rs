//! Memory tree: every fragment of an owner with its incident connections
//! and aggregate statistics.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Branch, BranchType, Fragment, FragmentType, Metadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub fragment_type: FragmentType,
    pub tags: Vec<String>,
    pub mood: Option<String>,
    pub created_at: DateTime<Utc>,
    pub connection_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub weight: f64,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub total_fragments: usize,
    pub total_connections: usize,
    pub average_connections: f64,
    pub strongest_connection: f64,
    pub connection_types: BTreeMap<BranchType, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryTree {
    pub nodes: Vec<TreeNode>,
    pub edges: Vec<TreeEdge>,
    pub stats: TreeStats,
}

pub fn build_memory_tree(fragments: &[Fragment], branches: &[Branch]) -> MemoryTree {
    let mut degree: HashMap<&str, usize> = HashMap::new();
    let mut connection_types: BTreeMap<BranchType, usize> = BTreeMap::new();
    for branch in branches {
        *degree.entry(branch.source_id.as_str()).or_default() += 1;
        *degree.entry(branch.target_id.as_str()).or_default() += 1;
        *connection_types.entry(branch.branch_type).or_default() += 1;
    }

    let nodes: Vec<TreeNode> = fragments
        .iter()
        .map(|f| TreeNode {
            id: f.id.clone(),
            content: f.content.clone(),
            fragment_type: f.fragment_type,
            tags: f.tags.clone(),
            mood: f.mood.clone(),
            created_at: f.created_at,
            connection_count: degree.get(f.id.as_str()).copied().unwrap_or(0),
        })
        .collect();

    let edges: Vec<TreeEdge> = branches
        .iter()
        .map(|b| TreeEdge {
            id: b.id.clone(),
            source: b.source_id.clone(),
            target: b.target_id.clone(),
            branch_type: b.branch_type,
            weight: b.weight,
            metadata: b.metadata.clone(),
        })
        .collect();

    let average_connections = if nodes.is_empty() {
        0.0
    } else {
        edges.len() as f64 / nodes.len() as f64
    };
    let strongest_connection = branches.iter().map(|b| b.weight).fold(0.0, f64::max);

    MemoryTree {
        stats: TreeStats {
            total_fragments: nodes.len(),
            total_connections: edges.len(),
            average_connections,
            strongest_connection,
            connection_types,
        },
        nodes,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(id: &str) -> Fragment {
        let now = Utc::now();
        Fragment {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            content: format!("content {}", id),
            fragment_type: FragmentType::Text,
            tags: vec![],
            mood: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn branch(source: &str, target: &str, branch_type: BranchType, weight: f64) -> Branch {
        let now = Utc::now();
        Branch {
            id: format!("{}{}", source, target),
            source_id: source.to_string(),
            target_id: target.to_string(),
            branch_type,
            weight,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tree_counts_and_stats() {
        let fragments = vec![fragment("a"), fragment("b"), fragment("c"), fragment("d")];
        let branches = vec![
            branch("a", "b", BranchType::Theme, 0.6),
            branch("c", "a", BranchType::Time, 0.9),
            branch("b", "c", BranchType::Theme, 0.4),
        ];

        let tree = build_memory_tree(&fragments, &branches);
        let counts: Vec<usize> = tree.nodes.iter().map(|n| n.connection_count).collect();
        assert_eq!(counts, vec![2, 2, 2, 0]);
        assert_eq!(tree.stats.total_fragments, 4);
        assert_eq!(tree.stats.total_connections, 3);
        assert!((tree.stats.average_connections - 0.75).abs() < 1e-9);
        assert!((tree.stats.strongest_connection - 0.9).abs() < 1e-9);
        assert_eq!(tree.stats.connection_types[&BranchType::Theme], 2);
        assert_eq!(tree.stats.connection_types[&BranchType::Time], 1);
        assert_eq!(tree.edges[1].source, "c");
    }

    #[test]
    fn test_empty_tree() {
        let tree = build_memory_tree(&[], &[]);
        assert_eq!(tree.stats.average_connections, 0.0);
        assert_eq!(tree.stats.strongest_connection, 0.0);
        assert!(tree.stats.connection_types.is_empty());
    }

    #[test]
    fn test_tree_json_shape() {
        let tree = build_memory_tree(
            &[fragment("a"), fragment("b")],
            &[branch("a", "b", BranchType::Emotion, 0.8)],
        );
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["stats"]["totalConnections"], 1);
        assert_eq!(json["stats"]["connectionTypes"]["EMOTION"], 1);
        assert_eq!(json["nodes"][0]["connectionCount"], 1);
        assert_eq!(json["edges"][0]["type"], "EMOTION");
    }

    #[test]
    fn test_average_is_connections_per_fragment() {
        let tree = build_memory_tree(
            &[fragment("a"), fragment("b")],
            &[branch("a", "b", BranchType::Manual, 1.0)],
        );
        // one connection shared by two fragments, not mean degree
        assert_eq!(tree.stats.average_connections, 0.5);
        assert_eq!(tree.nodes[0].connection_count, 1);
    }
}
