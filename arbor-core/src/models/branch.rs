use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArborError;
use crate::models::fragment::{Fragment, FragmentSummary, Metadata};

/// Weight given to manually created branches when none is supplied
pub const DEFAULT_MANUAL_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchType {
    Theme,
    Emotion,
    Time,
    Memory,
    Manual,
    Semantic,
}

impl BranchType {
    pub const ALL: [BranchType; 6] = [
        BranchType::Theme,
        BranchType::Emotion,
        BranchType::Time,
        BranchType::Memory,
        BranchType::Manual,
        BranchType::Semantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BranchType::Theme => "THEME",
            BranchType::Emotion => "EMOTION",
            BranchType::Time => "TIME",
            BranchType::Memory => "MEMORY",
            BranchType::Manual => "MANUAL",
            BranchType::Semantic => "SEMANTIC",
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BranchType {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BranchType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ArborError::InvalidInput(format!("Invalid branch type: {}", s)))
    }
}

/// A typed, weighted edge between two fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub weight: f64,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    pub fn touches(&self, fragment_id: &str) -> bool {
        self.source_id == fragment_id || self.target_id == fragment_id
    }

    /// The endpoint opposite `fragment_id`, if the branch is incident to it.
    pub fn other_end(&self, fragment_id: &str) -> Option<&str> {
        if self.source_id == fragment_id {
            Some(&self.target_id)
        } else if self.target_id == fragment_id {
            Some(&self.source_id)
        } else {
            None
        }
    }

    pub fn pair_key(&self) -> (String, String) {
        canonical_pair(&self.source_id, &self.target_id)
    }
}

/// Direction-independent key of a fragment pair: the smaller id first.
pub fn canonical_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

pub(crate) fn validate_weight(weight: f64) -> Result<(), ArborError> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(ArborError::InvalidInput(format!(
            "Weight must be between 0.0 and 1.0, got {}",
            weight
        )));
    }
    Ok(())
}

/// A branch ready to be inserted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub weight: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewBranch {
    pub fn validate(&self) -> Result<(), ArborError> {
        if self.source_id == self.target_id {
            return Err(ArborError::InvalidInput(
                "Cannot create connection to the same fragment".into(),
            ));
        }
        validate_weight(self.weight)
    }
}

/// User-facing create request; weight and metadata are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranch {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub weight: Option<f64>,
    pub metadata: Option<Metadata>,
}

impl From<CreateBranch> for NewBranch {
    fn from(req: CreateBranch) -> Self {
        Self {
            source_id: req.source_id,
            target_id: req.target_id,
            branch_type: req.branch_type,
            weight: req.weight.unwrap_or(DEFAULT_MANUAL_WEIGHT),
            metadata: req.metadata.unwrap_or_default(),
        }
    }
}

/// Partial update of a branch. Endpoints never change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchPatch {
    #[serde(rename = "type")]
    pub branch_type: Option<BranchType>,
    pub weight: Option<f64>,
    pub metadata: Option<Metadata>,
}

impl BranchPatch {
    pub fn validate(&self) -> Result<(), ArborError> {
        match self.weight {
            Some(w) => validate_weight(w),
            None => Ok(()),
        }
    }

    /// Shallow-merge metadata (new keys win) and replace type/weight when given.
    pub fn apply(&self, branch: &mut Branch, now: DateTime<Utc>) {
        if let Some(branch_type) = self.branch_type {
            branch.branch_type = branch_type;
        }
        if let Some(weight) = self.weight {
            branch.weight = weight;
        }
        if let Some(metadata) = &self.metadata {
            for (k, v) in metadata {
                branch.metadata.insert(k.clone(), v.clone());
            }
        }
        branch.updated_at = now;
    }
}

/// Outcome of a store insert. A lost uniqueness race is `Conflict`, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchWrite {
    Created(Branch),
    Conflict,
}

/// Query filter for branches. `involving_owner` scopes to branches with at least one
/// endpoint owned by that user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchFilter {
    #[serde(default)]
    pub involving_owner: String,
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    /// Either endpoint
    pub fragment_id: Option<String>,
    #[serde(default)]
    pub types: Vec<BranchType>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl BranchFilter {
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            involving_owner: owner.into(),
            ..Default::default()
        }
    }

    /// Every filter except owner scoping and `limit`.
    pub fn matches(&self, branch: &Branch) -> bool {
        if let Some(source) = &self.source_id {
            if &branch.source_id != source {
                return false;
            }
        }
        if let Some(target) = &self.target_id {
            if &branch.target_id != target {
                return false;
            }
        }
        if let Some(fragment) = &self.fragment_id {
            if !branch.touches(fragment) {
                return false;
            }
        }
        if !self.types.is_empty() && !self.types.contains(&branch.branch_type) {
            return false;
        }
        if let Some(min) = self.min_weight {
            if branch.weight < min {
                return false;
            }
        }
        if let Some(max) = self.max_weight {
            if branch.weight > max {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if branch.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if branch.created_at > before {
                return false;
            }
        }
        true
    }
}

/// A branch joined with summaries of both endpoints, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub weight: f64,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: FragmentSummary,
    pub target: FragmentSummary,
}

impl BranchRecord {
    pub fn new(branch: Branch, source: &Fragment, target: &Fragment) -> Self {
        Self {
            id: branch.id,
            branch_type: branch.branch_type,
            weight: branch.weight,
            metadata: branch.metadata,
            created_at: branch.created_at,
            updated_at: branch.updated_at,
            source: FragmentSummary::from(source),
            target: FragmentSummary::from(target),
        }
    }
}
