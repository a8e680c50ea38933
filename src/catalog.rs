// SPDX-License-Identifier: MIT
//! Built-in badge catalog: the canonical default rule set.
//!
//! Badge keys are snake_case strings and stable across versions. The
//! catalog table is seeded from this list on first run; after that the
//! rows belong to the external content-management process and re-seeding
//! never overwrites them.

use crate::model::{AchievementDefinition, Criteria, HourBound, Rarity, Requirement};
use std::collections::BTreeMap;

// ─── Badge key constants ──────────────────────────────────────────────────────

pub const FIRST_TASK: &str = "first_task";
pub const TASK_APPRENTICE: &str = "task_apprentice";
pub const TASK_CENTURION: &str = "task_centurion";
pub const WEEKLY_WARRIOR: &str = "weekly_warrior";
pub const PRIORITY_HERO: &str = "priority_hero";
pub const MOMENTUM: &str = "momentum";
pub const ON_FIRE: &str = "on_fire";
pub const WELLNESS_WEEK: &str = "wellness_week";
pub const FORTNIGHT_FLOW: &str = "fortnight_flow";
pub const SETTLING_IN: &str = "settling_in";
pub const VETERAN: &str = "veteran";
pub const EARLY_BIRD: &str = "early_bird";
pub const NIGHT_OWL: &str = "night_owl";
pub const POINTS_COLLECTOR: &str = "points_collector";
pub const BALANCED_WEEK: &str = "balanced_week";
pub const COMPLETIONIST: &str = "completionist";

// ─── Definitions ──────────────────────────────────────────────────────────────

fn def(
    badge_id: &str,
    category: &str,
    title: &str,
    description: &str,
    criteria: Criteria,
    points: i64,
    rarity: Rarity,
    icon: &str,
    color: &str,
) -> AchievementDefinition {
    AchievementDefinition {
        badge_id: badge_id.to_string(),
        category: category.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        criteria,
        points,
        rarity,
        icon: icon.to_string(),
        color: color.to_string(),
        active: true,
    }
}

fn count(metric: &str, threshold: i64) -> Criteria {
    Criteria::Count {
        metric: metric.to_string(),
        threshold,
        timeframe: None,
        conditions: None,
    }
}

/// The canonical default catalog. Source of truth for first-run seeding.
pub fn default_definitions() -> Vec<AchievementDefinition> {
    let mut high_priority = BTreeMap::new();
    high_priority.insert("priority".to_string(), "high".to_string());

    vec![
        def(
            FIRST_TASK,
            "tasks",
            "First Task",
            "Completed your very first task. The journey begins.",
            count("tasks_completed", 1),
            10,
            Rarity::Common,
            "check",
            "#4caf50",
        ),
        def(
            TASK_APPRENTICE,
            "tasks",
            "Task Apprentice",
            "Completed 10 tasks.",
            count("tasks_completed", 10),
            25,
            Rarity::Uncommon,
            "checklist",
            "#8bc34a",
        ),
        def(
            TASK_CENTURION,
            "tasks",
            "Centurion",
            "Completed 100 tasks. Relentless.",
            count("tasks_completed", 100),
            100,
            Rarity::Rare,
            "laurel",
            "#ffc107",
        ),
        def(
            WEEKLY_WARRIOR,
            "tasks",
            "Weekly Warrior",
            "Completed 20 tasks within a single week.",
            Criteria::Count {
                metric: "tasks_completed".to_string(),
                threshold: 20,
                timeframe: Some(7),
                conditions: None,
            },
            40,
            Rarity::Uncommon,
            "calendar",
            "#03a9f4",
        ),
        def(
            PRIORITY_HERO,
            "tasks",
            "Priority Hero",
            "Completed 10 high-priority tasks.",
            Criteria::Count {
                metric: "tasks_completed".to_string(),
                threshold: 10,
                timeframe: None,
                conditions: Some(high_priority),
            },
            50,
            Rarity::Rare,
            "flame",
            "#f44336",
        ),
        def(
            MOMENTUM,
            "streaks",
            "Momentum",
            "Completed tasks three days in a row.",
            Criteria::Streak { metric: "task_days".to_string(), threshold: 3 },
            20,
            Rarity::Common,
            "arrow-up",
            "#00bcd4",
        ),
        def(
            ON_FIRE,
            "streaks",
            "On Fire",
            "A seven-day task streak.",
            Criteria::Streak { metric: "task_days".to_string(), threshold: 7 },
            60,
            Rarity::Rare,
            "fire",
            "#ff5722",
        ),
        def(
            WELLNESS_WEEK,
            "health",
            "Wellness Week",
            "Logged your health seven days in a row.",
            Criteria::Streak { metric: "health_days".to_string(), threshold: 7 },
            60,
            Rarity::Rare,
            "heart",
            "#e91e63",
        ),
        def(
            FORTNIGHT_FLOW,
            "streaks",
            "Fortnight Flow",
            "Fourteen consecutive days with any activity.",
            Criteria::Streak { metric: "activity_days".to_string(), threshold: 14 },
            120,
            Rarity::Epic,
            "wave",
            "#9c27b0",
        ),
        def(
            SETTLING_IN,
            "loyalty",
            "Settling In",
            "One week since you joined.",
            Criteria::TimeBased {
                metric: "days_since_registration".to_string(),
                threshold: 7,
            },
            15,
            Rarity::Common,
            "door",
            "#607d8b",
        ),
        def(
            VETERAN,
            "loyalty",
            "Veteran",
            "A full year since you joined.",
            Criteria::TimeBased {
                metric: "days_since_registration".to_string(),
                threshold: 365,
            },
            150,
            Rarity::Epic,
            "shield",
            "#795548",
        ),
        def(
            EARLY_BIRD,
            "habits",
            "Early Bird",
            "Completed five tasks before 8 AM.",
            Criteria::Custom {
                metric: "early_tasks".to_string(),
                threshold: 5,
                timeframe: None,
                conditions: Some(HourBound { before_hour: Some(8), after_hour: None }),
                requirements: None,
            },
            45,
            Rarity::Uncommon,
            "sunrise",
            "#ffeb3b",
        ),
        def(
            NIGHT_OWL,
            "habits",
            "Night Owl",
            "Completed five tasks after 10 PM.",
            Criteria::Custom {
                metric: "late_tasks".to_string(),
                threshold: 5,
                timeframe: None,
                conditions: Some(HourBound { before_hour: None, after_hour: Some(22) }),
                requirements: None,
            },
            45,
            Rarity::Uncommon,
            "moon",
            "#3f51b5",
        ),
        def(
            POINTS_COLLECTOR,
            "meta",
            "Points Collector",
            "Accumulated 100 badge points.",
            Criteria::Custom {
                metric: "badge_points".to_string(),
                threshold: 100,
                timeframe: None,
                conditions: None,
                requirements: None,
            },
            50,
            Rarity::Rare,
            "coins",
            "#ff9800",
        ),
        def(
            BALANCED_WEEK,
            "habits",
            "Balanced Week",
            "Five tasks and three health logs inside one week.",
            Criteria::Custom {
                metric: "balanced_week".to_string(),
                threshold: 1,
                timeframe: Some(7),
                conditions: None,
                requirements: Some(vec![
                    Requirement { metric: "tasks_completed".to_string(), threshold: 5 },
                    Requirement { metric: "health_logs".to_string(), threshold: 3 },
                ]),
            },
            75,
            Rarity::Rare,
            "scales",
            "#009688",
        ),
        def(
            COMPLETIONIST,
            "meta",
            "Completionist",
            "Reserved for a future completion-rate rule.",
            Criteria::Percentage { metric: Some("completion_rate".to_string()), threshold: Some(100) },
            200,
            Rarity::Legendary,
            "trophy",
            "#ffd700",
        ),
    ]
}
