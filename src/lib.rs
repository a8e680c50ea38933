// SPDX-License-Identifier: MIT
//! laurel: an achievement evaluation engine.
//!
//! Given a catalog of declarative badge rules and a user's historical
//! activity (completed tasks, health logs, account age), the engine decides
//! which badges the user newly qualifies for, unlocks each exactly once,
//! and reports fractional progress toward the rest.
//!
//! The engine is a library: the host application triggers
//! [`AchievementEngine::check_and_unlock`] as a side effect of user actions
//! and renders [`AchievementEngine::get_progress`] wherever it likes.
//! Routing, templated email, UI, and schema migrations all live outside
//! this crate; it consumes activity data and requests notifications, and
//! nothing in it may break the user action that triggered it.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod progress;
pub mod storage;
pub mod streak;
pub mod unlock;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::AchievementEngine;
pub use evaluator::{CriteriaEvaluator, EvalError};
pub use model::{
    AchievementDefinition, BadgeProgress, BadgeStatus, Criteria, HourBound, Rarity, Requirement,
    UserBadge,
};
pub use notify::{Notifier, NullNotifier, UnlockNotification, WebhookNotifier};
pub use storage::{ActivitySource, ActivityStore, UserProfile};
