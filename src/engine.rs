// SPDX-License-Identifier: MIT
//! Achievement engine: the orchestrator and the crate's invocation surface.
//!
//! `check_and_unlock` runs as a synchronous side effect of a user action
//! (completing a task, logging health) and must never break that action:
//! a failed rule is skipped, a failed pass yields an empty list, and the
//! next triggering action retries organically. The degrade decisions all
//! live here, in one place, on purpose.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::evaluator::CriteriaEvaluator;
use crate::metrics::MetricResolver;
use crate::model::{BadgeProgress, BadgeStatus, UserBadge};
use crate::notify::{self, Notifier, NullNotifier};
use crate::progress::ProgressCalculator;
use crate::storage::ActivityStore;
use crate::unlock::UnlockCoordinator;

/// Shared engine state handed to the host application.
#[derive(Clone)]
pub struct AchievementEngine {
    store: ActivityStore,
    evaluator: CriteriaEvaluator,
    progress: ProgressCalculator,
    unlock: UnlockCoordinator,
}

impl AchievementEngine {
    /// Wire the engine from its parts. Most hosts want [`Self::with_defaults`].
    pub fn new(
        store: ActivityStore,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let resolver = MetricResolver::new(store.clone(), Arc::clone(&clock));
        let evaluator =
            CriteriaEvaluator::new(store.clone(), resolver.clone(), Arc::clone(&clock), config);
        let progress = ProgressCalculator::new(resolver);
        let unlock = UnlockCoordinator::new(store.clone(), notifier, clock);
        Self { store, evaluator, progress, unlock }
    }

    /// Wire with the system clock and the webhook notifier from `config`
    /// (or a no-op notifier when no webhook is configured), then seed the
    /// built-in catalog if the table is empty.
    pub async fn with_defaults(store: ActivityStore, config: EngineConfig) -> anyhow::Result<Self> {
        let notifier: Arc<dyn Notifier> = match &config.notify_url {
            Some(url) => Arc::new(notify::spawn(url.clone(), &config)),
            None => Arc::new(NullNotifier),
        };
        store.seed_catalog(&catalog::default_definitions()).await?;
        Ok(Self::new(store, notifier, Arc::new(SystemClock), config))
    }

    // ─── Invocation surface ───────────────────────────────────────────────────

    /// Evaluate every active, not-yet-unlocked rule for `user_id` and unlock
    /// the ones that qualify. Returns only the newly unlocked badges.
    ///
    /// Never fails the caller: any pass-level failure is logged and yields
    /// an empty list; any single-rule failure skips that rule only.
    pub async fn check_and_unlock(&self, user_id: &str) -> Vec<UserBadge> {
        match self.run_pass(user_id).await {
            Ok(newly_unlocked) => newly_unlocked,
            Err(e) => {
                warn!(user_id, error = %e, "achievement pass failed; no new badges this time");
                Vec::new()
            }
        }
    }

    async fn run_pass(&self, user_id: &str) -> anyhow::Result<Vec<UserBadge>> {
        let unlocked = self.store.unlocked_badge_ids(user_id).await?;
        let definitions = self.store.active_definitions().await?;

        let mut newly_unlocked = Vec::new();
        for definition in definitions {
            if unlocked.contains(&definition.badge_id) {
                continue;
            }
            // Degrade per rule: a broken rule or failed query must not
            // block evaluation of the rest of the catalog.
            match self.evaluator.qualifies(user_id, &definition.criteria).await {
                Ok(true) => match self.unlock.try_unlock(user_id, &definition).await {
                    Ok(Some(badge)) => newly_unlocked.push(badge),
                    Ok(None) => {} // lost the race; already unlocked
                    Err(e) => {
                        warn!(user_id, badge_id = %definition.badge_id, error = %e,
                              "unlock failed; skipping rule");
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    warn!(user_id, badge_id = %definition.badge_id, error = %e,
                          "criteria evaluation failed; treating rule as not qualifying");
                }
            }
        }
        Ok(newly_unlocked)
    }

    /// Fractional progress toward every active badge. Read-only; safe to
    /// call at any time. Pass-level failures yield an empty list.
    pub async fn get_progress(&self, user_id: &str) -> Vec<BadgeProgress> {
        let (definitions, unlocked) = match tokio::try_join!(
            self.store.active_definitions(),
            self.store.unlocked_badge_ids(user_id),
        ) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(user_id, error = %e, "progress load failed; reporting nothing");
                return Vec::new();
            }
        };
        self.progress.progress(user_id, &definitions, &unlocked).await
    }

    /// The active catalog joined with the user's unlock state, for display.
    pub async fn list_badges(&self, user_id: &str) -> anyhow::Result<Vec<BadgeStatus>> {
        let definitions = self.store.active_definitions().await?;
        let mut unlocks: HashMap<String, UserBadge> = self
            .store
            .user_badges(user_id)
            .await?
            .into_iter()
            .map(|badge| (badge.badge_id.clone(), badge))
            .collect();

        Ok(definitions
            .into_iter()
            .map(|def| {
                let unlock = unlocks.remove(&def.badge_id);
                BadgeStatus {
                    badge_id: def.badge_id,
                    category: def.category,
                    title: def.title,
                    description: def.description,
                    points: def.points,
                    rarity: def.rarity,
                    icon: def.icon,
                    color: def.color,
                    unlocked: unlock.is_some(),
                    unlocked_at: unlock.as_ref().map(|b| b.unlocked_at.clone()),
                    share_count: unlock.map(|b| b.share_count).unwrap_or(0),
                }
            })
            .collect())
    }

    /// Record that the user shared an unlocked badge. Returns `false` if
    /// the badge is not unlocked for this user.
    pub async fn record_share(&self, user_id: &str, badge_id: &str) -> anyhow::Result<bool> {
        self.store.increment_share_count(user_id, badge_id).await
    }

    /// The underlying store, for hosts that share the pool.
    pub fn store(&self) -> &ActivityStore {
        &self.store
    }
}
