// SPDX-License-Identifier: MIT
//! Core data model: catalog entries, criteria variants, unlock records.
//!
//! `Criteria` is a closed tagged union ("type" field in the stored JSON).
//! The compiler forces every variant to be handled in the evaluator; a
//! catalog row whose tag is unknown fails to parse and is skipped at load
//! time, it never reaches evaluation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ─── Rarity ───────────────────────────────────────────────────────────────────

/// Rarity tier of a badge. Copied onto the unlock record at unlock time so
/// later catalog edits do not rewrite history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    /// Parse a stored tier string. Unknown tiers are a catalog defect and
    /// surface as `None` so the row can be skipped, not guessed at.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "common" => Some(Rarity::Common),
            "uncommon" => Some(Rarity::Uncommon),
            "rare" => Some(Rarity::Rare),
            "epic" => Some(Rarity::Epic),
            "legendary" => Some(Rarity::Legendary),
            _ => None,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Criteria ─────────────────────────────────────────────────────────────────

/// Hour-of-day bounds for the `Custom` early/late task rules.
///
/// These are deliberately *not* part of the generic equality conditions:
/// hour filtering extracts the hour component from a timestamp, a different
/// query shape than `column = value`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBound {
    /// Counts activity whose local hour is strictly less than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_hour: Option<u8>,
    /// Counts activity whose local hour is strictly greater than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_hour: Option<u8>,
}

/// One sub-threshold of a compound `Custom` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub metric: String,
    pub threshold: i64,
}

/// The declarative rule attached to an achievement definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Criteria {
    /// Qualifies when the resolved metric count is >= threshold.
    Count {
        metric: String,
        threshold: i64,
        /// Restrict to activity within this many days of "now".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeframe: Option<u32>,
        /// Extra equality filters (e.g. `priority = "high"`), validated
        /// against a per-source column allowlist at resolution time.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conditions: Option<BTreeMap<String, String>>,
    },

    /// Qualifies when the current consecutive-day streak is >= threshold.
    Streak { metric: String, threshold: i64 },

    /// Qualifies when days elapsed since a reference event is >= threshold.
    /// The only supported reference event is account creation.
    TimeBased { metric: String, threshold: i64 },

    /// Reserved criteria kind. Always evaluates to not-qualifying; kept as
    /// an explicit variant so the stub is visible, not an `_` fallthrough.
    Percentage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metric: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<i64>,
    },

    /// Named special-case predicates (early/late tasks, points balance), or
    /// a conjunction of per-metric sub-thresholds when `requirements` is set.
    Custom {
        metric: String,
        threshold: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeframe: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conditions: Option<HourBound>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        requirements: Option<Vec<Requirement>>,
    },
}

impl Criteria {
    /// The metric name progress reporting resolves, if any.
    pub fn metric(&self) -> Option<&str> {
        match self {
            Criteria::Count { metric, .. }
            | Criteria::Streak { metric, .. }
            | Criteria::TimeBased { metric, .. }
            | Criteria::Custom { metric, .. } => Some(metric),
            Criteria::Percentage { metric, .. } => metric.as_deref(),
        }
    }

    /// The qualification threshold, used as the progress target.
    pub fn threshold(&self) -> i64 {
        match self {
            Criteria::Count { threshold, .. }
            | Criteria::Streak { threshold, .. }
            | Criteria::TimeBased { threshold, .. }
            | Criteria::Custom { threshold, .. } => *threshold,
            Criteria::Percentage { threshold, .. } => threshold.unwrap_or(0),
        }
    }

    /// Timeframe restriction for count-style resolution, if any.
    pub fn timeframe(&self) -> Option<u32> {
        match self {
            Criteria::Count { timeframe, .. } | Criteria::Custom { timeframe, .. } => *timeframe,
            _ => None,
        }
    }

    /// Equality conditions for count-style resolution, if any.
    pub fn conditions(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Criteria::Count { conditions, .. } => conditions.as_ref(),
            _ => None,
        }
    }
}

// ─── Catalog entry ────────────────────────────────────────────────────────────

/// Immutable catalog entry. Loaded read-only per evaluation pass; lifecycle
/// owned by an external content-management process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDefinition {
    /// Stable machine key, snake_case, e.g. `"first_task"`.
    pub badge_id: String,
    /// Grouping for display, e.g. `"tasks"`, `"health"`, `"loyalty"`.
    pub category: String,
    pub title: String,
    pub description: String,
    pub criteria: Criteria,
    /// Points credited to the user on unlock.
    pub points: i64,
    pub rarity: Rarity,
    /// Display styling: icon name and hex color (locale/render concerns
    /// live outside this crate).
    pub icon: String,
    pub color: String,
    pub active: bool,
}

// ─── Unlock record ────────────────────────────────────────────────────────────

/// The unlock record. Created exactly once per `(user_id, badge_id)` pair;
/// never mutated except for the share-count increment; never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBadge {
    pub id: String,
    pub user_id: String,
    pub badge_id: String,
    /// RFC 3339 unlock timestamp.
    pub unlocked_at: String,
    /// Rarity tier copied from the definition at unlock time.
    pub tier: Rarity,
    /// Always 100 at creation; the badge is complete by definition.
    pub progress_percentage: i64,
    /// Optional JSON blob attached by the caller.
    pub metadata: Option<String>,
    pub share_count: i64,
}

// ─── Derived progress ─────────────────────────────────────────────────────────

/// Fractional progress toward one badge. Recomputed on every request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeProgress {
    pub badge_id: String,
    pub current_value: i64,
    pub target_value: i64,
    /// Clamped to 0–100 and rounded to the nearest integer.
    pub percentage: i64,
    pub is_complete: bool,
}

// ─── Catalog + unlock view ────────────────────────────────────────────────────

/// One catalog entry joined with the user's unlock state, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeStatus {
    pub badge_id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub points: i64,
    pub rarity: Rarity,
    pub icon: String,
    pub color: String,
    pub unlocked: bool,
    /// RFC 3339 timestamp. `None` if not yet unlocked.
    pub unlocked_at: Option<String>,
    pub share_count: i64,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_count_roundtrip_json() {
        let c = Criteria::Count {
            metric: "tasks_completed".to_string(),
            threshold: 10,
            timeframe: Some(7),
            conditions: None,
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"count\""));
        let back: Criteria = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn criteria_tag_dispatch_from_stored_json() {
        let c: Criteria = serde_json::from_str(
            r#"{"type":"streak","metric":"task_days","threshold":7}"#,
        )
        .unwrap();
        assert_eq!(c.threshold(), 7);
        assert_eq!(c.metric(), Some("task_days"));
    }

    #[test]
    fn unknown_criteria_tag_fails_parse() {
        let result: Result<Criteria, _> =
            serde_json::from_str(r#"{"type":"wishes","metric":"stars","threshold":3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_fields_in_known_variant_are_ignored() {
        let c: Criteria = serde_json::from_str(
            r#"{"type":"count","metric":"tasks_completed","threshold":1,"legacy_flag":true}"#,
        )
        .unwrap();
        assert_eq!(c.threshold(), 1);
    }

    #[test]
    fn custom_hour_bound_parses() {
        let c: Criteria = serde_json::from_str(
            r#"{"type":"custom","metric":"early_tasks","threshold":5,
                "conditions":{"before_hour":8}}"#,
        )
        .unwrap();
        match c {
            Criteria::Custom { conditions, .. } => {
                assert_eq!(conditions.unwrap().before_hour, Some(8));
            }
            other => panic!("expected custom, got {other:?}"),
        }
    }

    #[test]
    fn custom_requirements_parse() {
        let c: Criteria = serde_json::from_str(
            r#"{"type":"custom","metric":"balanced_week","threshold":1,"timeframe":7,
                "requirements":[{"metric":"tasks_completed","threshold":5},
                                {"metric":"health_logs","threshold":3}]}"#,
        )
        .unwrap();
        match c {
            Criteria::Custom { requirements, timeframe, .. } => {
                assert_eq!(requirements.unwrap().len(), 2);
                assert_eq!(timeframe, Some(7));
            }
            other => panic!("expected custom, got {other:?}"),
        }
    }

    #[test]
    fn percentage_is_parseable_with_or_without_fields() {
        let bare: Criteria = serde_json::from_str(r#"{"type":"percentage"}"#).unwrap();
        assert_eq!(bare.threshold(), 0);
        let full: Criteria = serde_json::from_str(
            r#"{"type":"percentage","metric":"completion_rate","threshold":80}"#,
        )
        .unwrap();
        assert_eq!(full.threshold(), 80);
    }

    #[test]
    fn rarity_parse_rejects_unknown_tier() {
        assert_eq!(Rarity::parse("epic"), Some(Rarity::Epic));
        assert_eq!(Rarity::parse("mythic"), None);
        assert_eq!(Rarity::Legendary.as_str(), "legendary");
    }
}
