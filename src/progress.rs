// SPDX-License-Identifier: MIT
//! Progress calculator: 0-100 progress toward unearned badges.
//!
//! Progress intentionally uses count-style metric resolution for every
//! criteria kind, including streak and custom rules: it is a cheap
//! approximation for display, not a qualification check. Metrics the
//! resolver does not count (streak day metrics, custom predicates) read as
//! 0 until earned.

use std::collections::HashSet;
use tracing::warn;

use crate::metrics::MetricResolver;
use crate::model::{AchievementDefinition, BadgeProgress};

/// Computes [`BadgeProgress`] rows from the catalog and the unlocked set.
#[derive(Clone)]
pub struct ProgressCalculator {
    resolver: MetricResolver,
}

impl ProgressCalculator {
    pub fn new(resolver: MetricResolver) -> Self {
        Self { resolver }
    }

    /// Progress for every definition. Unlocked badges report complete
    /// without re-querying; a resolver failure for one badge degrades that
    /// badge to 0 progress and never aborts the rest.
    pub async fn progress(
        &self,
        user_id: &str,
        definitions: &[AchievementDefinition],
        unlocked: &HashSet<String>,
    ) -> Vec<BadgeProgress> {
        let mut rows = Vec::with_capacity(definitions.len());
        for def in definitions {
            let target = def.criteria.threshold();
            if unlocked.contains(&def.badge_id) {
                rows.push(BadgeProgress {
                    badge_id: def.badge_id.clone(),
                    current_value: target,
                    target_value: target,
                    percentage: 100,
                    is_complete: true,
                });
                continue;
            }

            let current = match def.criteria.metric() {
                Some(metric) => {
                    match self
                        .resolver
                        .resolve(
                            user_id,
                            metric,
                            def.criteria.timeframe(),
                            def.criteria.conditions(),
                        )
                        .await
                    {
                        Ok(value) => value,
                        Err(e) => {
                            warn!(badge_id = %def.badge_id, error = %e,
                                  "progress resolution failed; reporting 0");
                            0
                        }
                    }
                }
                None => 0,
            };

            rows.push(BadgeProgress {
                badge_id: def.badge_id.clone(),
                current_value: current,
                target_value: target,
                percentage: percentage(current, target),
                is_complete: false,
            });
        }
        rows
    }
}

/// `round(current / target * 100)` clamped to `[0, 100]`.
/// A non-positive target reads as 0 progress rather than dividing by zero.
fn percentage(current: i64, target: i64) -> i64 {
    if target <= 0 {
        return 0;
    }
    let pct = (current as f64 / target as f64 * 100.0).round();
    (pct as i64).clamp(0, 100)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{Criteria, Rarity};
    use crate::storage::ActivityStore;
    use chrono::{TimeZone, Utc};
    use sqlx::SqlitePool;
    use std::sync::Arc;

    #[test]
    fn percentage_rounds_and_clamps() {
        assert_eq!(percentage(5, 10), 50);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(0, 10), 0);
        assert_eq!(percentage(25, 10), 100); // over target clamps, never exceeds
        assert_eq!(percentage(10, 10), 100);
        assert_eq!(percentage(3, 0), 0);
        assert_eq!(percentage(-2, 10), 0);
    }

    fn def(badge_id: &str, criteria: Criteria) -> AchievementDefinition {
        AchievementDefinition {
            badge_id: badge_id.to_string(),
            category: "tasks".to_string(),
            title: badge_id.to_string(),
            description: String::new(),
            criteria,
            points: 10,
            rarity: Rarity::Common,
            icon: String::new(),
            color: String::new(),
            active: true,
        }
    }

    async fn make_calc() -> (ProgressCalculator, ActivityStore) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let store = ActivityStore::new(pool);
        store.migrate().await.unwrap();
        let clock = Arc::new(FixedClock(Utc.timestamp_millis_opt(86_400_000 * 100).unwrap()));
        let resolver = MetricResolver::new(store.clone(), clock);
        (ProgressCalculator::new(resolver), store)
    }

    #[tokio::test]
    async fn halfway_progress() {
        let (calc, store) = make_calc().await;
        for i in 0..5 {
            store.record_task("u1", "normal", "", Some(1_000 + i)).await.unwrap();
        }
        let defs = vec![def(
            "task_master",
            Criteria::Count {
                metric: "tasks_completed".to_string(),
                threshold: 10,
                timeframe: None,
                conditions: None,
            },
        )];

        let rows = calc.progress("u1", &defs, &HashSet::new()).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current_value, 5);
        assert_eq!(rows[0].target_value, 10);
        assert_eq!(rows[0].percentage, 50);
        assert!(!rows[0].is_complete);
    }

    #[tokio::test]
    async fn unlocked_badge_reports_complete_without_querying() {
        let (calc, _store) = make_calc().await;
        let defs = vec![def(
            "first_task",
            Criteria::Count {
                metric: "tasks_completed".to_string(),
                threshold: 1,
                timeframe: None,
                conditions: None,
            },
        )];
        let unlocked: HashSet<String> = ["first_task".to_string()].into();

        let rows = calc.progress("u1", &defs, &unlocked).await;
        assert_eq!(rows[0].current_value, 1);
        assert_eq!(rows[0].target_value, 1);
        assert_eq!(rows[0].percentage, 100);
        assert!(rows[0].is_complete);
    }

    #[tokio::test]
    async fn streak_and_custom_rules_approximate_via_count_resolution() {
        let (calc, _store) = make_calc().await;
        let defs = vec![
            def(
                "on_fire",
                Criteria::Streak { metric: "task_days".to_string(), threshold: 7 },
            ),
            def(
                "points_collector",
                Criteria::Custom {
                    metric: "badge_points".to_string(),
                    threshold: 100,
                    timeframe: None,
                    conditions: None,
                    requirements: None,
                },
            ),
        ];

        let rows = calc.progress("u1", &defs, &HashSet::new()).await;
        // Streak/custom metrics are not count-resolvable: reported as 0/target.
        assert_eq!(rows[0].current_value, 0);
        assert_eq!(rows[0].target_value, 7);
        assert_eq!(rows[1].percentage, 0);
    }

    #[tokio::test]
    async fn over_target_clamps_to_100() {
        let (calc, store) = make_calc().await;
        for i in 0..4 {
            store.record_task("u1", "normal", "", Some(1_000 + i)).await.unwrap();
        }
        let defs = vec![def(
            "first_task",
            Criteria::Count {
                metric: "tasks_completed".to_string(),
                threshold: 1,
                timeframe: None,
                conditions: None,
            },
        )];

        let rows = calc.progress("u1", &defs, &HashSet::new()).await;
        assert_eq!(rows[0].current_value, 4);
        assert_eq!(rows[0].percentage, 100);
        // Still not complete: completion is an unlock fact, not a ratio.
        assert!(!rows[0].is_complete);
    }
}
