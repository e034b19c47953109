use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BranchType, FragmentType};
use crate::visualize::VisualStyle;

/// Auto-link parameters as sent by a caller. Unset fields fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLinkRequest {
    pub focus_fragment_id: Option<String>,
    pub types: Option<Vec<BranchType>>,
    pub min_weight: Option<f64>,
    pub max_connections: Option<usize>,
    pub bidirectional: Option<bool>,
}

/// Visualization parameters: upstream filters, optional focus, and presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationRequest {
    pub focus_fragment_id: Option<String>,
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub fragment_types: Vec<FragmentType>,
    /// Fragment must carry every listed tag
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub connection_types: Vec<BranchType>,
    pub min_weight: Option<f64>,
    #[serde(flatten)]
    pub style: VisualStyle,
}
