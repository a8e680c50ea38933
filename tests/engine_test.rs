//! End-to-end tests for the achievement engine: unlock exactly once,
//! time-based badges, progress reporting, fail-soft isolation of broken
//! rules, and race safety of concurrent triggers.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use laurel::{
    catalog, AchievementEngine, ActivityStore, Clock, EngineConfig, FixedClock, Notifier,
    UnlockNotification,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;

const DAY_MS: i64 = 86_400_000;

/// Route engine warns through the usual subscriber so a failing test shows
/// which degrade path fired. `RUST_LOG=laurel=debug cargo test` to see all.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Captures dispatched notifications for assertions.
#[derive(Default)]
struct CaptureNotifier {
    events: Mutex<Vec<UnlockNotification>>,
}

#[async_trait]
impl Notifier for CaptureNotifier {
    async fn notify(&self, event: UnlockNotification) {
        self.events.lock().await.push(event);
    }
}

/// Noon UTC, 2026-03-14, the pinned "now" for every test.
fn now_ms() -> i64 {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
        .unwrap()
        .timestamp_millis()
}

async fn make_engine(dir: &TempDir) -> (AchievementEngine, ActivityStore, Arc<CaptureNotifier>) {
    init_tracing();
    let store = ActivityStore::open(dir.path()).await.unwrap();
    store.seed_catalog(&catalog::default_definitions()).await.unwrap();
    let notifier = Arc::new(CaptureNotifier::default());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(
        Utc.timestamp_millis_opt(now_ms()).unwrap(),
    ));
    let engine = AchievementEngine::new(
        store.clone(),
        notifier.clone() as Arc<dyn Notifier>,
        clock,
        EngineConfig::default(),
    );
    (engine, store, notifier)
}

#[tokio::test]
async fn scenario_a_first_completed_task_unlocks_first_task() {
    let dir = TempDir::new().unwrap();
    let (engine, store, notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    store
        .record_task("u1", "normal", "", Some(now_ms() - 3_600_000))
        .await
        .unwrap();

    let unlocked = engine.check_and_unlock("u1").await;
    let ids: Vec<&str> = unlocked.iter().map(|b| b.badge_id.as_str()).collect();
    assert_eq!(ids, vec!["first_task"]);
    assert_eq!(unlocked[0].progress_percentage, 100);

    let events = notifier.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].badge_id, "first_task");
    assert_eq!(events[0].kind, "badge_unlocked");
}

#[tokio::test]
async fn scenario_b_already_unlocked_returns_empty() {
    let dir = TempDir::new().unwrap();
    let (engine, store, notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    store
        .record_task("u1", "normal", "", Some(now_ms() - 3_600_000))
        .await
        .unwrap();

    let first_pass = engine.check_and_unlock("u1").await;
    assert_eq!(first_pass.len(), 1);
    let second_pass = engine.check_and_unlock("u1").await;
    assert!(second_pass.is_empty());

    // One unlock row, one points credit, one notification.
    let badges = store.user_badges("u1").await.unwrap();
    assert_eq!(badges.len(), 1);
    let profile = store.user_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.points, 10);
    assert_eq!(notifier.events.lock().await.len(), 1);
}

#[tokio::test]
async fn scenario_c_account_age_unlocks_time_based_badge() {
    let dir = TempDir::new().unwrap();
    let (engine, store, _notifier) = make_engine(&dir).await;
    // Registered 8 days ago, no activity at all.
    store.create_user("u1", now_ms() - 8 * DAY_MS).await.unwrap();

    let unlocked = engine.check_and_unlock("u1").await;
    let ids: Vec<&str> = unlocked.iter().map(|b| b.badge_id.as_str()).collect();
    assert_eq!(ids, vec!["settling_in"]);
}

#[tokio::test]
async fn scenario_d_progress_reports_halfway() {
    let dir = TempDir::new().unwrap();
    let (engine, store, _notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    for i in 0..5 {
        store
            .record_task("u1", "normal", "", Some(now_ms() - DAY_MS - i))
            .await
            .unwrap();
    }

    let progress = engine.get_progress("u1").await;
    let apprentice = progress
        .iter()
        .find(|p| p.badge_id == "task_apprentice")
        .expect("task_apprentice in progress report");
    assert_eq!(apprentice.current_value, 5);
    assert_eq!(apprentice.target_value, 10);
    assert_eq!(apprentice.percentage, 50);
    assert!(!apprentice.is_complete);
}

#[tokio::test]
async fn progress_marks_unlocked_badges_complete() {
    let dir = TempDir::new().unwrap();
    let (engine, store, _notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    store
        .record_task("u1", "normal", "", Some(now_ms() - 3_600_000))
        .await
        .unwrap();
    engine.check_and_unlock("u1").await;

    let progress = engine.get_progress("u1").await;
    let first = progress.iter().find(|p| p.badge_id == "first_task").unwrap();
    assert!(first.is_complete);
    assert_eq!(first.percentage, 100);
    // Never re-queried: current equals target by construction.
    assert_eq!(first.current_value, first.target_value);
}

#[tokio::test]
async fn streak_badge_unlocks_after_three_consecutive_days() {
    let dir = TempDir::new().unwrap();
    let (engine, store, _notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    for days_ago in 0..3 {
        store
            .record_task("u1", "normal", "", Some(now_ms() - days_ago * DAY_MS))
            .await
            .unwrap();
    }

    let unlocked = engine.check_and_unlock("u1").await;
    let ids: Vec<&str> = unlocked.iter().map(|b| b.badge_id.as_str()).collect();
    assert!(ids.contains(&"momentum"), "streak badge missing from {ids:?}");
    assert!(ids.contains(&"first_task"));
    assert!(!ids.contains(&"on_fire")); // needs 7 days
}

#[tokio::test]
async fn concurrent_triggers_unlock_exactly_once() {
    let dir = TempDir::new().unwrap();
    let (engine, store, notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    store
        .record_task("u1", "normal", "", Some(now_ms() - 3_600_000))
        .await
        .unwrap();

    // Two rapid triggers for the same user, racing on the same database.
    let (a, b) = tokio::join!(engine.check_and_unlock("u1"), engine.check_and_unlock("u1"));

    let first_task_unlocks = a
        .iter()
        .chain(b.iter())
        .filter(|badge| badge.badge_id == "first_task")
        .count();
    assert_eq!(first_task_unlocks, 1, "exactly one trigger wins the unlock");

    let badges = store.user_badges("u1").await.unwrap();
    assert_eq!(badges.len(), 1);
    let profile = store.user_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.points, 10, "points credited exactly once");
    assert_eq!(notifier.events.lock().await.len(), 1);
}

#[tokio::test]
async fn broken_catalog_rule_does_not_block_the_rest() {
    let dir = TempDir::new().unwrap();
    let (engine, store, _notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    store
        .record_task("u1", "normal", "", Some(now_ms() - 3_600_000))
        .await
        .unwrap();

    // A malformed rule with the lowest point cost, evaluated first.
    sqlx::query(
        "INSERT INTO achievement_definitions (badge_id, title, criteria, points, rarity)
         VALUES ('corrupt', 'Corrupt', 'not json at all', 1, 'common')",
    )
    .execute(&store.pool())
    .await
    .unwrap();

    let unlocked = engine.check_and_unlock("u1").await;
    let ids: Vec<&str> = unlocked.iter().map(|b| b.badge_id.as_str()).collect();
    assert_eq!(ids, vec!["first_task"]);
}

#[tokio::test]
async fn unknown_user_yields_no_badges_not_an_error() {
    let dir = TempDir::new().unwrap();
    let (engine, _store, _notifier) = make_engine(&dir).await;
    // No user row: time-based and points rules fail per-rule, counts are 0.
    let unlocked = engine.check_and_unlock("ghost").await;
    assert!(unlocked.is_empty());
    // Progress is still served from count metrics alone.
    let progress = engine.get_progress("ghost").await;
    assert!(!progress.is_empty());
    assert!(progress.iter().all(|p| !p.is_complete));
}

#[tokio::test]
async fn list_badges_and_share_counter() {
    let dir = TempDir::new().unwrap();
    let (engine, store, _notifier) = make_engine(&dir).await;
    store.create_user("u1", now_ms()).await.unwrap();
    store
        .record_task("u1", "normal", "", Some(now_ms() - 3_600_000))
        .await
        .unwrap();
    engine.check_and_unlock("u1").await;

    assert!(engine.record_share("u1", "first_task").await.unwrap());
    assert!(!engine.record_share("u1", "veteran").await.unwrap());

    let listing = engine.list_badges("u1").await.unwrap();
    assert_eq!(listing.len(), catalog::default_definitions().len());
    let first = listing.iter().find(|b| b.badge_id == "first_task").unwrap();
    assert!(first.unlocked);
    assert!(first.unlocked_at.is_some());
    assert_eq!(first.share_count, 1);
    let veteran = listing.iter().find(|b| b.badge_id == "veteran").unwrap();
    assert!(!veteran.unlocked);
    assert_eq!(veteran.share_count, 0);
}

#[tokio::test]
async fn points_accumulate_across_unlocks() {
    let dir = TempDir::new().unwrap();
    let (engine, store, _notifier) = make_engine(&dir).await;
    // 8-day-old account with one completed task: first_task (10) + settling_in (15).
    store.create_user("u1", now_ms() - 8 * DAY_MS).await.unwrap();
    store
        .record_task("u1", "normal", "", Some(now_ms() - 3_600_000))
        .await
        .unwrap();

    let unlocked = engine.check_and_unlock("u1").await;
    assert_eq!(unlocked.len(), 2);
    let profile = store.user_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.points, 25);
}
