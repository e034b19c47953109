//! Connection scoring between two fragments
//!
//! Each enabled dimension proposes at most one candidate connection:
//! - TIME: closeness of creation timestamps, banded
//! - THEME: tag overlap ratio
//! - EMOTION: identical mood, or moods sharing an emotion group
//! - SEMANTIC: keyword overlap of the content (tokens longer than 3 chars)
//!
//! The strongest candidate wins; ties keep the first dimension in that order.
//! When nothing qualifies the result is `MANUAL` with weight 0.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{BranchType, Fragment, Metadata};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// (upper bound in days, weight): first band that contains the gap wins
const TIME_BANDS: [(f64, f64); 4] = [(1.0, 0.9), (7.0, 0.7), (30.0, 0.5), (90.0, 0.3)];

/// Tag overlap must exceed this to propose a THEME link
const THEME_THRESHOLD: f64 = 0.2;
const THEME_BOOST: f64 = 1.2;

const SAME_MOOD_WEIGHT: f64 = 0.8;
const SHARED_GROUP_WEIGHT: f64 = 0.6;

/// Keyword overlap must exceed this to propose a SEMANTIC link
const SEMANTIC_THRESHOLD: f64 = 0.3;
const SEMANTIC_BOOST: f64 = 1.5;
const MIN_TOKEN_CHARS: usize = 4;

/// Emotion groups; a mood may sit in several.
const EMOTION_GROUPS: [(&str, &[&str]); 5] = [
    (
        "positive",
        &["happy", "joy", "excited", "grateful", "content", "peaceful", "optimistic"],
    ),
    (
        "negative",
        &["sad", "angry", "frustrated", "anxious", "worried", "stressed", "overwhelmed"],
    ),
    ("neutral", &["calm", "thoughtful", "reflective", "curious", "focused"]),
    (
        "energetic",
        &["excited", "motivated", "energetic", "passionate", "enthusiastic"],
    ),
    ("low", &["tired", "drained", "melancholy", "quiet", "subdued"]),
];

type Scorer = fn(&Fragment, &Fragment) -> Option<ConnectionScore>;

/// The strongest proposed connection between two fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionScore {
    pub branch_type: BranchType,
    pub weight: f64,
    pub metadata: Metadata,
}

impl ConnectionScore {
    fn none() -> Self {
        Self {
            branch_type: BranchType::Manual,
            weight: 0.0,
            metadata: Metadata::new(),
        }
    }

    fn new(branch_type: BranchType, weight: f64, metadata: serde_json::Value) -> Self {
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        };
        Self {
            branch_type,
            weight: weight.clamp(0.0, 1.0),
            metadata,
        }
    }
}

/// Score `a` against `b` across the dimensions in `allowed`.
pub fn score(a: &Fragment, b: &Fragment, allowed: &[BranchType]) -> ConnectionScore {
    let candidates: [(BranchType, Scorer); 4] = [
        (BranchType::Time, time_score),
        (BranchType::Theme, theme_score),
        (BranchType::Emotion, emotion_score),
        (BranchType::Semantic, semantic_score),
    ];

    let mut best: Option<ConnectionScore> = None;
    for (branch_type, scorer) in candidates {
        if !allowed.contains(&branch_type) {
            continue;
        }
        if let Some(candidate) = scorer(a, b) {
            let stronger = best
                .as_ref()
                .map(|current| candidate.weight > current.weight)
                .unwrap_or(true);
            if stronger {
                best = Some(candidate);
            }
        }
    }

    best.unwrap_or_else(ConnectionScore::none)
}

fn time_score(a: &Fragment, b: &Fragment) -> Option<ConnectionScore> {
    let gap = (a.created_at - b.created_at).num_milliseconds().abs() as f64 / 1000.0;
    let days = gap / SECONDS_PER_DAY;

    let weight = TIME_BANDS
        .iter()
        .find(|(max_days, _)| days <= *max_days)
        .map(|(_, w)| *w)?;

    Some(ConnectionScore::new(
        BranchType::Time,
        weight,
        json!({ "daysDifference": days.round() as i64 }),
    ))
}

fn theme_score(a: &Fragment, b: &Fragment) -> Option<ConnectionScore> {
    if a.tags.is_empty() || b.tags.is_empty() {
        return None;
    }

    let common: Vec<&String> = a.tags.iter().filter(|t| b.tags.contains(t)).collect();
    let overlap = common.len() as f64 / a.tags.len().max(b.tags.len()) as f64;
    if overlap <= THEME_THRESHOLD {
        return None;
    }

    Some(ConnectionScore::new(
        BranchType::Theme,
        (overlap * THEME_BOOST).min(1.0),
        json!({ "commonTags": common, "similarity": overlap }),
    ))
}

fn emotion_groups(mood: &str) -> HashSet<&'static str> {
    EMOTION_GROUPS
        .iter()
        .filter(|(_, moods)| moods.contains(&mood))
        .map(|(group, _)| *group)
        .collect()
}

fn emotion_score(a: &Fragment, b: &Fragment) -> Option<ConnectionScore> {
    let mood_a = a.mood.as_deref().filter(|m| !m.is_empty())?;
    let mood_b = b.mood.as_deref().filter(|m| !m.is_empty())?;
    let (lower_a, lower_b) = (mood_a.to_lowercase(), mood_b.to_lowercase());

    if lower_a == lower_b {
        return Some(ConnectionScore::new(
            BranchType::Emotion,
            SAME_MOOD_WEIGHT,
            json!({ "sharedMood": mood_a }),
        ));
    }

    let groups_b = emotion_groups(&lower_b);
    let shares_group = emotion_groups(&lower_a)
        .iter()
        .any(|g| groups_b.contains(g));
    if !shares_group {
        return None;
    }

    Some(ConnectionScore::new(
        BranchType::Emotion,
        SHARED_GROUP_WEIGHT,
        json!({ "mood1": mood_a, "mood2": mood_b, "similarity": SHARED_GROUP_WEIGHT }),
    ))
}

fn keywords(content: &str) -> Vec<String> {
    content
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Share of `a`'s keywords that also occur in `b`, over the longer keyword list.
pub fn content_similarity(a: &str, b: &str) -> f64 {
    let words_a = keywords(a);
    let words_b = keywords(b);
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let lookup: HashSet<&str> = words_b.iter().map(String::as_str).collect();
    let common = words_a.iter().filter(|w| lookup.contains(w.as_str())).count();
    common as f64 / words_a.len().max(words_b.len()) as f64
}

fn semantic_score(a: &Fragment, b: &Fragment) -> Option<ConnectionScore> {
    let sim = content_similarity(&a.content, &b.content);
    if sim <= SEMANTIC_THRESHOLD {
        return None;
    }

    Some(ConnectionScore::new(
        BranchType::Semantic,
        (sim * SEMANTIC_BOOST).min(1.0),
        json!({ "contentSimilarity": sim }),
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FragmentType;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const ALL_SCORED: [BranchType; 4] = [
        BranchType::Time,
        BranchType::Theme,
        BranchType::Emotion,
        BranchType::Semantic,
    ];

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn fragment(id: &str, content: &str, created_at: DateTime<Utc>) -> Fragment {
        Fragment {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            content: content.to_string(),
            fragment_type: FragmentType::Text,
            tags: vec![],
            mood: None,
            metadata: Metadata::new(),
            created_at,
            updated_at: created_at,
        }
    }

    fn tagged(id: &str, tags: &[&str], created_at: DateTime<Utc>) -> Fragment {
        let mut f = fragment(id, "note", created_at);
        f.tags = tags.iter().map(|t| t.to_string()).collect();
        f
    }

    // ========================================================================
    // TEST 1: 12 hours apart, no tags or mood → TIME 0.9
    // ========================================================================
    #[test]
    fn test_twelve_hours_apart_is_time_link() {
        let a = fragment("a", "x", base_time());
        let b = fragment("b", "y", base_time() + Duration::hours(12));

        let result = score(&a, &b, &ALL_SCORED);
        assert_eq!(result.branch_type, BranchType::Time);
        assert!((result.weight - 0.9).abs() < 1e-9);
        assert_eq!(result.metadata["daysDifference"], 1);
    }

    // ========================================================================
    // TEST 2: time bands
    // ========================================================================
    #[test]
    fn test_time_bands() {
        let a = fragment("a", "x", base_time());
        let cases = [(3, 0.7), (20, 0.5), (60, 0.3)];
        for (days, expected) in cases {
            let b = fragment("b", "y", base_time() - Duration::days(days));
            let result = score(&a, &b, &[BranchType::Time]);
            assert!(
                (result.weight - expected).abs() < 1e-9,
                "{} days should weigh {}",
                days,
                expected
            );
        }

        let far = fragment("b", "y", base_time() - Duration::days(91));
        let result = score(&a, &far, &[BranchType::Time]);
        assert_eq!(result.branch_type, BranchType::Manual);
        assert_eq!(result.weight, 0.0);
    }

    // ========================================================================
    // TEST 3: ["growth","focus"] vs ["growth","calm"] → THEME 0.6
    // ========================================================================
    #[test]
    fn test_half_tag_overlap_is_theme_link() {
        let a = tagged("a", &["growth", "focus"], base_time());
        let b = tagged("b", &["growth", "calm"], base_time() - Duration::days(200));

        let result = score(&a, &b, &ALL_SCORED);
        assert_eq!(result.branch_type, BranchType::Theme);
        assert!((result.weight - 0.6).abs() < 1e-9);
        assert_eq!(result.metadata["commonTags"], json!(["growth"]));
        assert!((result.metadata["similarity"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    }

    // ========================================================================
    // TEST 4: low tag overlap is not a theme
    // ========================================================================
    #[test]
    fn test_low_tag_overlap_ignored() {
        let a = tagged("a", &["a", "b", "c", "d", "e"], base_time());
        let b = tagged("b", &["a", "x", "y", "z", "w"], base_time());
        // 1/5 = 0.2 is not > 0.2
        let result = score(&a, &b, &[BranchType::Theme]);
        assert_eq!(result.branch_type, BranchType::Manual);
    }

    // ========================================================================
    // TEST 5: same mood regardless of case → EMOTION 0.8
    // ========================================================================
    #[test]
    fn test_same_mood_is_emotion_link() {
        let mut a = fragment("a", "x", base_time());
        let mut b = fragment("b", "y", base_time());
        a.mood = Some("Calm".into());
        b.mood = Some("calm".into());

        let result = score(&a, &b, &[BranchType::Emotion]);
        assert_eq!(result.branch_type, BranchType::Emotion);
        assert!((result.weight - 0.8).abs() < 1e-9);
    }

    // ========================================================================
    // TEST 6: moods in a shared group → 0.6; disjoint groups → nothing
    // ========================================================================
    #[test]
    fn test_emotion_groups() {
        let mut a = fragment("a", "x", base_time());
        let mut b = fragment("b", "y", base_time());
        a.mood = Some("excited".into());
        b.mood = Some("motivated".into());
        let result = score(&a, &b, &[BranchType::Emotion]);
        assert!((result.weight - 0.6).abs() < 1e-9);
        assert_eq!(result.metadata["mood1"], "excited");

        b.mood = Some("tired".into());
        let result = score(&a, &b, &[BranchType::Emotion]);
        assert_eq!(result.branch_type, BranchType::Manual);

        b.mood = None;
        assert_eq!(score(&a, &b, &[BranchType::Emotion]).weight, 0.0);
    }

    // ========================================================================
    // TEST 7: keyword overlap
    // ========================================================================
    #[test]
    fn test_semantic_keyword_overlap() {
        let a = fragment("a", "Walking through the quiet forest today", base_time());
        let b = fragment("b", "the forest was quiet while walking", base_time());
        // keywords a: walking through quiet forest today (5)
        // keywords b: forest quiet while walking (4)
        // common: walking quiet forest = 3 / 5 = 0.6 → weight min(0.9, 1)
        let sim = content_similarity(&a.content, &b.content);
        assert!((sim - 0.6).abs() < 1e-9);

        let result = score(&a, &b, &[BranchType::Semantic]);
        assert_eq!(result.branch_type, BranchType::Semantic);
        assert!((result.weight - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_semantic_empty_tokens_is_zero() {
        assert_eq!(content_similarity("a an the", "words here matter"), 0.0);
    }

    // ========================================================================
    // TEST 8: ties keep the earlier dimension
    // ========================================================================
    #[test]
    fn test_tie_keeps_first_dimension() {
        // THEME 0.5 * 1.2 = 0.6 ties EMOTION shared-group 0.6; THEME is scored first
        let mut a = tagged("a", &["growth", "focus"], base_time());
        let mut b = tagged("b", &["growth", "calm"], base_time() - Duration::days(200));
        a.mood = Some("sad".into());
        b.mood = Some("angry".into());

        let result = score(&a, &b, &ALL_SCORED);
        assert_eq!(result.branch_type, BranchType::Theme);

        // a strictly stronger later dimension still wins
        b.mood = Some("Sad".into());
        let result = score(&a, &b, &ALL_SCORED);
        assert_eq!(result.branch_type, BranchType::Emotion);
        assert!((result.weight - 0.8).abs() < 1e-9);
    }

    // ========================================================================
    // TEST 9: disabled dimensions are skipped
    // ========================================================================
    #[test]
    fn test_disallowed_dimension_skipped() {
        let a = fragment("a", "x", base_time());
        let b = fragment("b", "y", base_time());
        let result = score(&a, &b, &[BranchType::Theme, BranchType::Memory]);
        assert_eq!(result, ConnectionScore::none());
    }

    // ========================================================================
    // TEST 10: weights stay in [0, 1] for a spread of inputs
    // ========================================================================
    #[test]
    fn test_weights_always_in_unit_range() {
        let contents = [
            "same same same same",
            "same same same same",
            "different words entirely here",
            "",
        ];
        let tag_sets: [&[&str]; 3] = [&["a"], &["a", "b"], &[]];
        let moods = [Some("happy"), Some("HAPPY"), Some("sad"), None];

        let mut fragments = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            for (j, tags) in tag_sets.iter().enumerate() {
                for (k, mood) in moods.iter().enumerate() {
                    let mut f = tagged(
                        &format!("{}{}{}", i, j, k),
                        tags,
                        base_time() - Duration::days((i * 17 + j * 5 + k) as i64),
                    );
                    f.content = content.to_string();
                    f.mood = mood.map(str::to_string);
                    fragments.push(f);
                }
            }
        }

        for a in &fragments {
            for b in &fragments {
                let w = score(a, b, &ALL_SCORED).weight;
                assert!((0.0..=1.0).contains(&w), "weight {} out of range", w);
            }
        }
    }
}
