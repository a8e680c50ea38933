// SPDX-License-Identifier: MIT
//! Criteria evaluator: one boolean "qualifies" decision per rule.
//!
//! Every criteria variant dispatches through the exhaustive match below.
//! This function itself does not swallow failures: it returns a typed
//! [`EvalError`] and the orchestrator makes the single, explicit decision
//! to treat a failed rule as not-qualifying and move on.

use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::metrics::{MetricResolver, StreakMetric, DAY_MS};
use crate::model::{Criteria, HourBound, Requirement};
use crate::storage::ActivityStore;
use crate::streak::streak_length;

/// Why a single rule could not be evaluated.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("store query failed: {0}")]
    Store(#[from] anyhow::Error),

    #[error("user {0} not found")]
    UnknownUser(String),
}

/// Dispatches one [`Criteria`] to the resolver or streak calculator.
#[derive(Clone)]
pub struct CriteriaEvaluator {
    store: ActivityStore,
    resolver: MetricResolver,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl CriteriaEvaluator {
    pub fn new(
        store: ActivityStore,
        resolver: MetricResolver,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self { store, resolver, clock, config }
    }

    /// Does `user_id` currently satisfy `criteria`?
    pub async fn qualifies(&self, user_id: &str, criteria: &Criteria) -> Result<bool, EvalError> {
        match criteria {
            Criteria::Count { metric, threshold, timeframe, conditions } => {
                let value = self
                    .resolver
                    .resolve(user_id, metric, *timeframe, conditions.as_ref())
                    .await?;
                Ok(value >= *threshold)
            }

            Criteria::Streak { metric, threshold } => {
                let Some(streak_metric) = StreakMetric::parse(metric) else {
                    debug!(metric, "unsupported streak metric; not qualifying");
                    return Ok(false);
                };
                Ok(i64::from(self.current_streak(user_id, streak_metric).await?) >= *threshold)
            }

            Criteria::TimeBased { metric, threshold } => {
                if metric != "days_since_registration" {
                    debug!(metric, "unsupported time-based metric; not qualifying");
                    return Ok(false);
                }
                let profile = self
                    .store
                    .user_profile(user_id)
                    .await?
                    .ok_or_else(|| EvalError::UnknownUser(user_id.to_string()))?;
                let elapsed_days = (self.clock.now_ms() - profile.created_at_ms) / DAY_MS;
                Ok(elapsed_days >= *threshold)
            }

            // Reserved upstream; an explicit stub, not a silent fallthrough.
            Criteria::Percentage { .. } => {
                debug!("percentage criteria is reserved; not qualifying");
                Ok(false)
            }

            Criteria::Custom { metric, threshold, timeframe, conditions, requirements } => {
                self.qualifies_custom(
                    user_id,
                    metric,
                    *threshold,
                    *timeframe,
                    *conditions,
                    requirements.as_deref(),
                )
                .await
            }
        }
    }

    /// Current consecutive-day streak for a streak metric, computed over the
    /// configured window with "today" taken in the reference zone.
    pub async fn current_streak(
        &self,
        user_id: &str,
        metric: StreakMetric,
    ) -> Result<u32, EvalError> {
        let since_ms =
            self.clock.now_ms() - i64::from(self.config.streak_window_days) * DAY_MS;
        let days = self
            .store
            .activity_days(
                user_id,
                metric.sources(),
                since_ms,
                self.config.reference_offset_secs(),
            )
            .await?;
        let today = self
            .clock
            .now()
            .with_timezone(&self.config.reference_offset())
            .date_naive();
        Ok(streak_length(&days, today))
    }

    async fn qualifies_custom(
        &self,
        user_id: &str,
        metric: &str,
        threshold: i64,
        timeframe: Option<u32>,
        conditions: Option<HourBound>,
        requirements: Option<&[Requirement]>,
    ) -> Result<bool, EvalError> {
        let offset = self.config.reference_offset_secs();
        match metric {
            "early_tasks" if conditions.and_then(|c| c.before_hour).is_some() => {
                let before = conditions.and_then(|c| c.before_hour);
                let count = self
                    .store
                    .count_tasks_by_hour(user_id, before, None, offset)
                    .await?;
                Ok(count >= threshold)
            }
            "late_tasks" if conditions.and_then(|c| c.after_hour).is_some() => {
                let after = conditions.and_then(|c| c.after_hour);
                let count = self
                    .store
                    .count_tasks_by_hour(user_id, None, after, offset)
                    .await?;
                Ok(count >= threshold)
            }
            "badge_points" => {
                let profile = self
                    .store
                    .user_profile(user_id)
                    .await?
                    .ok_or_else(|| EvalError::UnknownUser(user_id.to_string()))?;
                Ok(profile.points >= threshold)
            }
            _ => {
                if let Some(requirements) = requirements {
                    // Conjunction: every sub-metric must meet its own
                    // threshold; stop at the first miss.
                    for requirement in requirements {
                        let value = self
                            .resolver
                            .resolve(user_id, &requirement.metric, timeframe, None)
                            .await?;
                        if value < requirement.threshold {
                            return Ok(false);
                        }
                    }
                    Ok(!requirements.is_empty())
                } else {
                    debug!(metric, "unrecognized custom criteria; not qualifying");
                    Ok(false)
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
