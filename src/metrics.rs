// SPDX-License-Identifier: MIT
//! Metric resolver. Turns a `(metric, timeframe, conditions)` descriptor
//! into one non-negative count.
//!
//! Unknown metric names resolve to 0 rather than erroring, so a catalog row
//! can reference a metric this build does not know yet (rollout ordering)
//! and simply never qualify until the engine catches up.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::clock::Clock;
use crate::storage::{ActivitySource, ActivityStore};

pub(crate) const DAY_MS: i64 = 86_400_000;

/// A metric name mapped onto a concrete count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    Tasks,
    HealthLogs,
}

impl MetricSource {
    /// Map a catalog metric name to its activity source. `None` for names
    /// this resolver does not count (streak metrics, custom predicates,
    /// or metrics from a newer catalog than this build).
    pub fn parse(metric: &str) -> Option<Self> {
        match metric {
            "tasks_completed" => Some(MetricSource::Tasks),
            "health_logs" => Some(MetricSource::HealthLogs),
            _ => None,
        }
    }

    fn source(self) -> ActivitySource {
        match self {
            MetricSource::Tasks => ActivitySource::Tasks,
            MetricSource::HealthLogs => ActivitySource::HealthLogs,
        }
    }
}

/// The activity-day query behind a streak metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakMetric {
    TaskDays,
    HealthDays,
    /// Union of task and health activity days.
    ActivityDays,
}

impl StreakMetric {
    pub fn parse(metric: &str) -> Option<Self> {
        match metric {
            "task_days" => Some(StreakMetric::TaskDays),
            "health_days" => Some(StreakMetric::HealthDays),
            "activity_days" => Some(StreakMetric::ActivityDays),
            _ => None,
        }
    }

    pub fn sources(self) -> &'static [ActivitySource] {
        match self {
            StreakMetric::TaskDays => &[ActivitySource::Tasks],
            StreakMetric::HealthDays => &[ActivitySource::HealthLogs],
            StreakMetric::ActivityDays => &[ActivitySource::Tasks, ActivitySource::HealthLogs],
        }
    }
}

/// Resolves count-style metrics against the activity store.
#[derive(Clone)]
pub struct MetricResolver {
    store: ActivityStore,
    clock: Arc<dyn Clock>,
}

impl MetricResolver {
    pub fn new(store: ActivityStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Resolve a metric to a count. `timeframe` restricts to activity within
    /// that many days of now; `conditions` adds equality filters.
    ///
    /// Degrades to 0 (with a warning) for unknown metric names and for
    /// condition keys outside the source's filter allowlist. Store failures
    /// propagate; the caller decides how to degrade.
    pub async fn resolve(
        &self,
        user_id: &str,
        metric: &str,
        timeframe: Option<u32>,
        conditions: Option<&BTreeMap<String, String>>,
    ) -> Result<i64> {
        let Some(source) = MetricSource::parse(metric) else {
            warn!(metric, "unknown metric name; resolving to 0");
            return Ok(0);
        };
        let source = source.source();

        if let Some(conditions) = conditions {
            if let Some(bad) = conditions
                .keys()
                .find(|key| !source.allowed_filters().contains(&key.as_str()))
            {
                warn!(metric, key = %bad, "condition key not filterable; resolving to 0");
                return Ok(0);
            }
        }

        let since_ms = timeframe.map(|days| self.clock.now_ms() - i64::from(days) * DAY_MS);
        self.store
            .count_activity(user_id, source, conditions, since_ms)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use sqlx::SqlitePool;

    async fn make_resolver(now_ms: i64) -> (MetricResolver, ActivityStore) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let store = ActivityStore::new(pool);
        store.migrate().await.unwrap();
        let clock = Arc::new(FixedClock(Utc.timestamp_millis_opt(now_ms).unwrap()));
        (MetricResolver::new(store.clone(), clock), store)
    }

    #[tokio::test]
    async fn unknown_metric_resolves_to_zero() {
        let (resolver, _store) = make_resolver(0).await;
        let value = resolver.resolve("u1", "quantum_flux", None, None).await.unwrap();
        assert_eq!(value, 0);
    }

    #[tokio::test]
    async fn timeframe_cutoff_is_days_before_now() {
        let now = 10 * DAY_MS;
        let (resolver, store) = make_resolver(now).await;
        store.record_task("u1", "normal", "", Some(2 * DAY_MS)).await.unwrap();
        store.record_task("u1", "normal", "", Some(9 * DAY_MS)).await.unwrap();

        let all = resolver.resolve("u1", "tasks_completed", None, None).await.unwrap();
        assert_eq!(all, 2);
        let last_week = resolver
            .resolve("u1", "tasks_completed", Some(7), None)
            .await
            .unwrap();
        assert_eq!(last_week, 1);
    }

    #[tokio::test]
    async fn disallowed_condition_key_degrades_to_zero() {
        let (resolver, store) = make_resolver(0).await;
        store.record_task("u1", "high", "", Some(1)).await.unwrap();

        let mut conditions = BTreeMap::new();
        conditions.insert("before_hour".to_string(), "8".to_string());
        let value = resolver
            .resolve("u1", "tasks_completed", None, Some(&conditions))
            .await
            .unwrap();
        assert_eq!(value, 0);
    }

    #[tokio::test]
    async fn health_log_metric_counts_entries() {
        let (resolver, store) = make_resolver(DAY_MS).await;
        store.record_health_log("u1", "water", 100).await.unwrap();
        store.record_health_log("u1", "sleep", 200).await.unwrap();
        store.record_health_log("u2", "water", 300).await.unwrap();

        let value = resolver.resolve("u1", "health_logs", None, None).await.unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn streak_metric_parsing() {
        assert_eq!(StreakMetric::parse("task_days"), Some(StreakMetric::TaskDays));
        assert_eq!(StreakMetric::parse("activity_days"), Some(StreakMetric::ActivityDays));
        assert_eq!(StreakMetric::parse("login_days"), None);
        assert_eq!(StreakMetric::ActivityDays.sources().len(), 2);
    }
}
