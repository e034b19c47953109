//! Visualization derivation
//!
//! Turns a set of fragments and branches into a render-ready graph: sized and
//! coloured nodes with a cluster key, coloured edges with a stroke width, and
//! summary statistics with legends. Pure and deterministic given `now`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Branch, BranchType, Fragment, FragmentType, Metadata};

const BASE_SIZE: f64 = 10.0;
const MAX_SIZE: f64 = 50.0;
const UNIFORM_SIZE: f64 = 15.0;
const RECENCY_WINDOW_DAYS: f64 = 30.0;
const MIN_EDGE_WIDTH: f64 = 1.0;
const EDGE_WIDTH_SCALE: f64 = 5.0;
const NEUTRAL_COLOR: &str = "#6B7280";
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationLayout {
    #[default]
    Force,
    Hierarchical,
    Circular,
    Timeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSizeBy {
    #[default]
    Connections,
    ContentLength,
    Recency,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBy {
    #[default]
    Type,
    Mood,
    Tags,
    Time,
    Connections,
}

/// Presentation choices for one derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualStyle {
    pub layout: VisualizationLayout,
    pub node_size_by: NodeSizeBy,
    pub color_by: ColorBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualNode {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub fragment_type: FragmentType,
    pub tags: Vec<String>,
    pub mood: Option<String>,
    pub created_at: DateTime<Utc>,
    pub connection_count: usize,
    pub size: f64,
    pub color: String,
    pub cluster: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub weight: f64,
    pub metadata: Metadata,
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeLegend {
    pub min: f64,
    pub max: f64,
    pub metric: NodeSizeBy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub clusters: usize,
    pub time_span: TimeSpan,
    pub color_legend: BTreeMap<String, String>,
    pub size_legend: SizeLegend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub layout: VisualizationLayout,
    pub stats: VisualStats,
}

// ============================================================================
// Colour and size tables
// ============================================================================

pub fn type_color(fragment_type: FragmentType) -> &'static str {
    match fragment_type {
        FragmentType::Text => "#3B82F6",
        FragmentType::Audio => "#10B981",
        FragmentType::Dream => "#8B5CF6",
        FragmentType::Quote => "#F59E0B",
        FragmentType::Feeling => "#EF4444",
        FragmentType::Reflection => "#6366F1",
    }
}

pub fn mood_color(mood: Option<&str>) -> &'static str {
    let Some(mood) = mood else {
        return NEUTRAL_COLOR;
    };
    match mood.to_lowercase().as_str() {
        "happy" => "#10B981",
        "sad" => "#3B82F6",
        "angry" => "#EF4444",
        "anxious" => "#F59E0B",
        "peaceful" => "#8B5CF6",
        "excited" => "#EC4899",
        "calm" => "#06B6D4",
        "frustrated" => "#DC2626",
        "grateful" => "#059669",
        "worried" => "#D97706",
        _ => NEUTRAL_COLOR,
    }
}

/// (upper bound in days, colour, legend label)
const AGE_BANDS: [(f64, &str, &str); 4] = [
    (1.0, "#10B981", "Today"),
    (7.0, "#3B82F6", "This Week"),
    (30.0, "#F59E0B", "This Month"),
    (90.0, "#8B5CF6", "This Quarter"),
];

pub fn age_color(age_days: f64) -> &'static str {
    AGE_BANDS
        .iter()
        .find(|(max, _, _)| age_days <= *max)
        .map(|(_, color, _)| *color)
        .unwrap_or(NEUTRAL_COLOR)
}

pub fn edge_color(branch_type: BranchType) -> &'static str {
    match branch_type {
        BranchType::Theme => "#3B82F6",
        BranchType::Emotion => "#EF4444",
        BranchType::Time => "#10B981",
        BranchType::Memory => "#8B5CF6",
        BranchType::Manual => "#F59E0B",
        BranchType::Semantic => "#6366F1",
    }
}

fn age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

fn node_size(fragment: &Fragment, connections: usize, by: NodeSizeBy, now: DateTime<Utc>) -> f64 {
    let size = match by {
        NodeSizeBy::Connections => BASE_SIZE + 5.0 * connections as f64,
        NodeSizeBy::ContentLength => {
            BASE_SIZE + fragment.content.encode_utf16().count() as f64 / 10.0
        }
        NodeSizeBy::Recency => {
            BASE_SIZE + (RECENCY_WINDOW_DAYS - age_days(fragment.created_at, now)).max(0.0)
        }
        NodeSizeBy::Uniform => UNIFORM_SIZE,
    };
    size.min(MAX_SIZE)
}

fn node_color(fragment: &Fragment, by: ColorBy, now: DateTime<Utc>) -> &'static str {
    match by {
        ColorBy::Type | ColorBy::Tags => type_color(fragment.fragment_type),
        ColorBy::Mood => mood_color(fragment.mood.as_deref()),
        ColorBy::Time => age_color(age_days(fragment.created_at, now)),
        ColorBy::Connections => NEUTRAL_COLOR,
    }
}

fn cluster_key(fragment: &Fragment, by: ColorBy) -> String {
    match by {
        ColorBy::Mood => fragment
            .mood
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "neutral".to_string()),
        ColorBy::Tags => fragment
            .tags
            .first()
            .cloned()
            .unwrap_or_else(|| "untagged".to_string()),
        ColorBy::Time => fragment.created_at.format("%Y-%m").to_string(),
        ColorBy::Type | ColorBy::Connections => fragment.fragment_type.as_str().to_string(),
    }
}

fn color_legend(fragments: &[Fragment], by: ColorBy) -> BTreeMap<String, String> {
    match by {
        ColorBy::Type => FragmentType::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), type_color(*t).to_string()))
            .collect(),
        ColorBy::Time => AGE_BANDS
            .iter()
            .map(|(_, color, label)| (label.to_string(), color.to_string()))
            .chain(std::iter::once(("Older".to_string(), NEUTRAL_COLOR.to_string())))
            .collect(),
        ColorBy::Mood => fragments
            .iter()
            .filter_map(|f| f.mood.as_deref().filter(|m| !m.is_empty()))
            .map(|m| (m.to_string(), mood_color(Some(m)).to_string()))
            .collect(),
        ColorBy::Tags | ColorBy::Connections => BTreeMap::new(),
    }
}

fn time_span(fragments: &[Fragment], now: DateTime<Utc>) -> TimeSpan {
    let start = fragments.iter().map(|f| f.created_at).min().unwrap_or(now);
    let end = fragments.iter().map(|f| f.created_at).max().unwrap_or(now);
    let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    TimeSpan {
        start,
        end,
        days: (seconds / SECONDS_PER_DAY).ceil() as i64,
    }
}

/// Derive a visualization of `fragments` and `branches`.
///
/// Connection counts only consider the branches supplied here, so callers that
/// filter branches upstream see node sizes consistent with the drawn edges.
pub fn derive(
    fragments: &[Fragment],
    branches: &[Branch],
    style: &VisualStyle,
    now: DateTime<Utc>,
) -> Visualization {
    let mut connections: HashMap<&str, usize> = HashMap::new();
    for branch in branches {
        *connections.entry(branch.source_id.as_str()).or_default() += 1;
        *connections.entry(branch.target_id.as_str()).or_default() += 1;
    }

    let nodes: Vec<VisualNode> = fragments
        .iter()
        .map(|f| {
            let count = connections.get(f.id.as_str()).copied().unwrap_or(0);
            VisualNode {
                id: f.id.clone(),
                content: f.content.clone(),
                fragment_type: f.fragment_type,
                tags: f.tags.clone(),
                mood: f.mood.clone(),
                created_at: f.created_at,
                connection_count: count,
                size: node_size(f, count, style.node_size_by, now),
                color: node_color(f, style.color_by, now).to_string(),
                cluster: cluster_key(f, style.color_by),
            }
        })
        .collect();

    let edges: Vec<VisualEdge> = branches
        .iter()
        .map(|b| VisualEdge {
            id: b.id.clone(),
            source: b.source_id.clone(),
            target: b.target_id.clone(),
            branch_type: b.branch_type,
            weight: b.weight,
            metadata: b.metadata.clone(),
            color: edge_color(b.branch_type).to_string(),
            width: (b.weight * EDGE_WIDTH_SCALE).max(MIN_EDGE_WIDTH),
        })
        .collect();

    let clusters: BTreeSet<&str> = nodes.iter().map(|n| n.cluster.as_str()).collect();
    let (min_size, max_size) = if nodes.is_empty() {
        (0.0, 0.0)
    } else {
        nodes.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), n| {
            (lo.min(n.size), hi.max(n.size))
        })
    };

    let stats = VisualStats {
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        clusters: clusters.len(),
        time_span: time_span(fragments, now),
        color_legend: color_legend(fragments, style.color_by),
        size_legend: SizeLegend {
            min: min_size,
            max: max_size,
            metric: style.node_size_by,
        },
    };

    Visualization {
        nodes,
        edges,
        layout: style.layout,
        stats,
    }
}

// ============================================================================
// TESTS
// ============================================================================
