// SPDX-License-Identifier: MIT
//! Unlock coordinator: the one place a locked-to-unlocked transition happens.
//!
//! The transition is one-way and terminal: the insert is conditional on the
//! `(user_id, badge_id)` unique key, so repeated or racing triggers cannot
//! create a second record, re-credit points, or re-notify.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::model::{AchievementDefinition, UserBadge};
use crate::notify::{Notifier, UnlockNotification};
use crate::storage::ActivityStore;

#[derive(Clone)]
pub struct UnlockCoordinator {
    store: ActivityStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl UnlockCoordinator {
    pub fn new(store: ActivityStore, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self { store, notifier, clock }
    }

    /// Unlock `definition` for `user_id` if not already unlocked.
    ///
    /// Returns the new record, or `None` when another trigger got there
    /// first; callers treat that as "already unlocked", not an error.
    /// Points are credited and the notification dispatched only for the
    /// call that actually created the row; a points-credit failure is
    /// logged but does not undo the unlock, since the persisted record is
    /// the source of truth.
    pub async fn try_unlock(
        &self,
        user_id: &str,
        definition: &AchievementDefinition,
    ) -> Result<Option<UserBadge>> {
        let badge = UserBadge {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            badge_id: definition.badge_id.clone(),
            unlocked_at: self.clock.now().to_rfc3339(),
            tier: definition.rarity,
            progress_percentage: 100,
            metadata: None,
            share_count: 0,
        };

        let inserted = self.store.insert_badge_if_absent(&badge).await?;
        if !inserted {
            debug!(user_id, badge_id = %definition.badge_id, "badge already unlocked");
            return Ok(None);
        }

        info!(user_id, badge_id = %definition.badge_id, points = definition.points,
              "badge unlocked");

        if let Err(e) = self.store.credit_points(user_id, definition.points).await {
            warn!(user_id, badge_id = %definition.badge_id, error = %e,
                  "failed to credit badge points; unlock stands");
        }

        self.notifier
            .notify(UnlockNotification::badge_unlocked(
                user_id,
                &definition.badge_id,
                &definition.title,
                definition.points,
                badge.unlocked_at.clone(),
            ))
            .await;

        Ok(Some(badge))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
