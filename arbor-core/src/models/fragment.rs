use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArborError;

/// Free-form key/value map carried by fragments and branches.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Maximum fragment content length, in characters
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Maximum number of tags on a fragment
pub const MAX_TAGS: usize = 10;

/// Maximum mood length, in characters
pub const MAX_MOOD_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FragmentType {
    #[default]
    Text,
    Audio,
    Dream,
    Quote,
    Feeling,
    Reflection,
}

impl FragmentType {
    pub const ALL: [FragmentType; 6] = [
        FragmentType::Text,
        FragmentType::Audio,
        FragmentType::Dream,
        FragmentType::Quote,
        FragmentType::Feeling,
        FragmentType::Reflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentType::Text => "TEXT",
            FragmentType::Audio => "AUDIO",
            FragmentType::Dream => "DREAM",
            FragmentType::Quote => "QUOTE",
            FragmentType::Feeling => "FEELING",
            FragmentType::Reflection => "REFLECTION",
        }
    }
}

impl fmt::Display for FragmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentType {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FragmentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ArborError::InvalidInput(format!("Invalid fragment type: {}", s)))
    }
}

/// A single user-authored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub fragment_type: FragmentType,
    #[serde(default)]
    pub tags: Vec<String>,
    pub mood: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFragment {
    pub content: String,
    #[serde(rename = "type", default)]
    pub fragment_type: FragmentType,
    #[serde(default)]
    pub tags: Vec<String>,
    pub mood: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Backdated creation time for imports; defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewFragment {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ArborError> {
        validate_content(&self.content)?;
        validate_tags(&self.tags)?;
        if let Some(mood) = &self.mood {
            validate_mood(mood)?;
        }
        Ok(())
    }
}

/// Partial update of a fragment. `metadata` is merged shallowly, everything else replaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentPatch {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub fragment_type: Option<FragmentType>,
    pub tags: Option<Vec<String>>,
    pub mood: Option<String>,
    pub metadata: Option<Metadata>,
}

impl FragmentPatch {
    pub fn validate(&self) -> Result<(), ArborError> {
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        if let Some(mood) = &self.mood {
            validate_mood(mood)?;
        }
        Ok(())
    }

    pub fn apply(&self, fragment: &mut Fragment, now: DateTime<Utc>) {
        if let Some(content) = &self.content {
            fragment.content = content.clone();
        }
        if let Some(fragment_type) = self.fragment_type {
            fragment.fragment_type = fragment_type;
        }
        if let Some(tags) = &self.tags {
            fragment.tags = tags.clone();
        }
        if let Some(mood) = &self.mood {
            fragment.mood = Some(mood.clone());
        }
        if let Some(metadata) = &self.metadata {
            for (k, v) in metadata {
                fragment.metadata.insert(k.clone(), v.clone());
            }
        }
        fragment.updated_at = now;
    }
}

fn validate_content(content: &str) -> Result<(), ArborError> {
    let len = content.chars().count();
    if len == 0 {
        return Err(ArborError::InvalidInput("Content cannot be empty".into()));
    }
    if len > MAX_CONTENT_CHARS {
        return Err(ArborError::InvalidInput(format!(
            "Content too long (max {} characters)",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), ArborError> {
    if tags.len() > MAX_TAGS {
        return Err(ArborError::InvalidInput(format!(
            "Maximum {} tags allowed",
            MAX_TAGS
        )));
    }
    Ok(())
}

fn validate_mood(mood: &str) -> Result<(), ArborError> {
    if mood.chars().count() > MAX_MOOD_CHARS {
        return Err(ArborError::InvalidInput(format!(
            "Mood too long (max {} characters)",
            MAX_MOOD_CHARS
        )));
    }
    Ok(())
}

/// Query filters for listing an owner's fragments. Results are always newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentFilters {
    #[serde(default)]
    pub fragment_types: Vec<FragmentType>,
    /// Case-insensitive substring match on content
    pub search: Option<String>,
    /// Fragment must carry every listed tag
    #[serde(default)]
    pub tags: Vec<String>,
    pub mood: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl FragmentFilters {
    /// The `limit` most recent fragments, unfiltered.
    pub fn newest(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Every filter except `limit`, which the store applies after ordering.
    pub fn matches(&self, fragment: &Fragment) -> bool {
        if !self.fragment_types.is_empty() && !self.fragment_types.contains(&fragment.fragment_type) {
            return false;
        }
        if let Some(search) = &self.search {
            if !fragment
                .content
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        if !self.tags.iter().all(|t| fragment.tags.contains(t)) {
            return false;
        }
        if let Some(mood) = &self.mood {
            if fragment.mood.as_deref() != Some(mood.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if fragment.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if fragment.created_at > before {
                return false;
            }
        }
        true
    }
}

/// Compact view of a fragment embedded in branch records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentSummary {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub fragment_type: FragmentType,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub mood: Option<String>,
}

impl From<&Fragment> for FragmentSummary {
    fn from(f: &Fragment) -> Self {
        Self {
            id: f.id.clone(),
            content: f.content.clone(),
            fragment_type: f.fragment_type,
            created_at: f.created_at,
            tags: f.tags.clone(),
            mood: f.mood.clone(),
        }
    }
}
