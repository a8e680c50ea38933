// SPDX-License-Identifier: MIT
//! Activity store: the SQLite realization of the persistence contract.
//!
//! Owns the schema bootstrap (`CREATE TABLE IF NOT EXISTS`, no migration
//! files) and every read/write the engine issues: activity counts, distinct
//! activity days, user profile, the active catalog, and the unlock records.
//! The `UNIQUE(user_id, badge_id)` constraint on `user_badges` is the
//! database-side half of the exactly-once unlock invariant.

use anyhow::{bail, Context as _, Result};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::model::{AchievementDefinition, Rarity, UserBadge};

// ─── Activity sources ─────────────────────────────────────────────────────────

/// An activity table the resolver can count over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySource {
    /// Completed tasks (`completed_at IS NOT NULL`).
    Tasks,
    /// Health log entries.
    HealthLogs,
}

impl ActivitySource {
    fn table(self) -> &'static str {
        match self {
            ActivitySource::Tasks => "tasks",
            ActivitySource::HealthLogs => "health_logs",
        }
    }

    fn timestamp_column(self) -> &'static str {
        match self {
            ActivitySource::Tasks => "completed_at",
            ActivitySource::HealthLogs => "logged_at",
        }
    }

    /// Columns a criteria's equality conditions may filter on. Everything
    /// else is rejected before any SQL is built.
    pub fn allowed_filters(self) -> &'static [&'static str] {
        match self {
            ActivitySource::Tasks => &["status", "priority", "category"],
            ActivitySource::HealthLogs => &["kind"],
        }
    }
}

/// The slice of a user row the evaluator needs.
#[derive(Debug, Clone, Copy)]
pub struct UserProfile {
    /// Account creation, epoch milliseconds.
    pub created_at_ms: i64,
    /// Cumulative badge points balance.
    pub points: i64,
}

// ─── Store ────────────────────────────────────────────────────────────────────

/// Query + write layer over the shared SQLite pool.
#[derive(Clone)]
pub struct ActivityStore {
    pool: SqlitePool,
}

impl ActivityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the on-disk database under `data_dir` and bootstrap
    /// the schema. WAL mode, as the host application runs concurrent readers.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .context("creating data dir")?;
        let db_path = data_dir.join("laurel.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Return a clone of the connection pool (cheap, Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Bootstrap the schema. Idempotent; safe to call on every startup.
    pub async fn migrate(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id         TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                points     INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS tasks (
                id           TEXT PRIMARY KEY,
                user_id      TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'open',
                priority     TEXT NOT NULL DEFAULT 'normal',
                category     TEXT NOT NULL DEFAULT '',
                completed_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_tasks_user_completed
                ON tasks(user_id, completed_at)",
            "CREATE TABLE IF NOT EXISTS health_logs (
                id        TEXT PRIMARY KEY,
                user_id   TEXT NOT NULL,
                kind      TEXT NOT NULL DEFAULT '',
                logged_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_health_logs_user_logged
                ON health_logs(user_id, logged_at)",
            "CREATE TABLE IF NOT EXISTS achievement_definitions (
                badge_id    TEXT PRIMARY KEY,
                category    TEXT NOT NULL DEFAULT '',
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                criteria    TEXT NOT NULL,
                points      INTEGER NOT NULL DEFAULT 0,
                rarity      TEXT NOT NULL DEFAULT 'common',
                icon        TEXT NOT NULL DEFAULT '',
                color       TEXT NOT NULL DEFAULT '',
                active      INTEGER NOT NULL DEFAULT 1
            )",
            "CREATE TABLE IF NOT EXISTS user_badges (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL,
                badge_id            TEXT NOT NULL,
                unlocked_at         TEXT NOT NULL,
                tier                TEXT NOT NULL,
                progress_percentage INTEGER NOT NULL DEFAULT 100,
                metadata            TEXT,
                share_count         INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, badge_id)
            )",
        ];
        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .context("bootstrapping schema")?;
        }
        Ok(())
    }

    // ─── Activity reads ───────────────────────────────────────────────────────

    /// Count qualifying activity rows for a user.
    ///
    /// `filters` must only use keys from [`ActivitySource::allowed_filters`];
    /// an unknown key is an error here (the resolver screens it first and
    /// degrades to 0 instead). `since_ms` restricts to activity at or after
    /// the cutoff.
    pub async fn count_activity(
        &self,
        user_id: &str,
        source: ActivitySource,
        filters: Option<&BTreeMap<String, String>>,
        since_ms: Option<i64>,
    ) -> Result<i64> {
        let ts = source.timestamp_column();
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ? AND {ts} IS NOT NULL",
            source.table()
        );
        let mut binds: Vec<String> = Vec::new();
        if let Some(filters) = filters {
            for (key, value) in filters {
                if !source.allowed_filters().contains(&key.as_str()) {
                    bail!("filter key {key:?} is not filterable on {}", source.table());
                }
                sql.push_str(&format!(" AND {key} = ?"));
                binds.push(value.clone());
            }
        }
        if since_ms.is_some() {
            sql.push_str(&format!(" AND {ts} >= ?"));
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(user_id);
        for value in &binds {
            query = query.bind(value);
        }
        if let Some(cutoff) = since_ms {
            query = query.bind(cutoff);
        }
        query
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("counting {} activity", source.table()))
    }

    /// Distinct calendar days with activity across the given sources,
    /// sorted descending. Days are derived from the fixed reference offset
    /// (`offset_secs`), never from an ambient database time zone.
    pub async fn activity_days(
        &self,
        user_id: &str,
        sources: &[ActivitySource],
        since_ms: i64,
        offset_secs: i64,
    ) -> Result<Vec<NaiveDate>> {
        let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
        for source in sources {
            let ts = source.timestamp_column();
            let sql = format!(
                "SELECT DISTINCT date({ts} / 1000 + ?, 'unixepoch') AS day
                   FROM {table}
                  WHERE user_id = ? AND {ts} IS NOT NULL AND {ts} >= ?",
                table = source.table()
            );
            let rows: Vec<(String,)> = sqlx::query_as(&sql)
                .bind(offset_secs)
                .bind(user_id)
                .bind(since_ms)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("listing {} activity days", source.table()))?;
            for (day,) in rows {
                match NaiveDate::parse_from_str(&day, "%Y-%m-%d") {
                    Ok(date) => {
                        days.insert(date);
                    }
                    Err(e) => warn!(day, error = %e, "unparseable activity day; skipping"),
                }
            }
        }
        Ok(days.into_iter().rev().collect())
    }

    /// Count completed tasks whose local completion hour is strictly below
    /// `before_hour` (or strictly above `after_hour`). Exactly one bound is
    /// expected; when both are set, both must hold.
    pub async fn count_tasks_by_hour(
        &self,
        user_id: &str,
        before_hour: Option<u8>,
        after_hour: Option<u8>,
        offset_secs: i64,
    ) -> Result<i64> {
        if before_hour.is_none() && after_hour.is_none() {
            bail!("hour-of-day count requires a before_hour or after_hour bound");
        }
        let mut sql = String::from(
            "SELECT COUNT(*) FROM tasks
              WHERE user_id = ? AND completed_at IS NOT NULL",
        );
        // SQLite's % is C-style and goes negative when the shifted timestamp
        // does (e.g. a negative offset near the epoch), so normalize into
        // [0, 86400) before extracting the hour.
        if before_hour.is_some() {
            sql.push_str(" AND (((completed_at / 1000 + ?) % 86400 + 86400) % 86400) / 3600 < ?");
        }
        if after_hour.is_some() {
            sql.push_str(" AND (((completed_at / 1000 + ?) % 86400 + 86400) % 86400) / 3600 > ?");
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(user_id);
        if let Some(hour) = before_hour {
            query = query.bind(offset_secs).bind(i64::from(hour));
        }
        if let Some(hour) = after_hour {
            query = query.bind(offset_secs).bind(i64::from(hour));
        }
        query
            .fetch_one(&self.pool)
            .await
            .context("counting tasks by hour")
    }

    /// Creation timestamp + points balance for one user. `None` if absent.
    pub async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT created_at, points FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .context("loading user profile")?;
        Ok(row.map(|(created_at_ms, points)| UserProfile { created_at_ms, points }))
    }

    // ─── Catalog ──────────────────────────────────────────────────────────────

    /// Load the active catalog ordered by ascending points.
    ///
    /// A row whose criteria JSON or rarity tier fails to parse is skipped
    /// with a warning; one malformed rule never blocks the others.
    pub async fn active_definitions(&self) -> Result<Vec<AchievementDefinition>> {
        let rows: Vec<(String, String, String, String, String, i64, String, String, String)> =
            sqlx::query_as(
                "SELECT badge_id, category, title, description, criteria,
                        points, rarity, icon, color
                   FROM achievement_definitions
                  WHERE active = 1
               ORDER BY points ASC",
            )
            .fetch_all(&self.pool)
            .await
            .context("loading achievement catalog")?;

        let mut definitions = Vec::with_capacity(rows.len());
        for (badge_id, category, title, description, criteria, points, rarity, icon, color) in rows
        {
            let criteria = match serde_json::from_str(&criteria) {
                Ok(c) => c,
                Err(e) => {
                    warn!(badge_id, error = %e, "malformed criteria JSON; skipping catalog row");
                    continue;
                }
            };
            let Some(rarity) = Rarity::parse(&rarity) else {
                warn!(badge_id, rarity, "unknown rarity tier; skipping catalog row");
                continue;
            };
            definitions.push(AchievementDefinition {
                badge_id,
                category,
                title,
                description,
                criteria,
                points,
                rarity,
                icon,
                color,
                active: true,
            });
        }
        Ok(definitions)
    }

    /// Insert catalog rows that do not exist yet (first-run seeding).
    /// Existing rows are left untouched; catalog edits belong to the
    /// external content-management process.
    pub async fn seed_catalog(&self, definitions: &[AchievementDefinition]) -> Result<()> {
        for def in definitions {
            let criteria =
                serde_json::to_string(&def.criteria).context("serializing criteria")?;
            sqlx::query(
                "INSERT OR IGNORE INTO achievement_definitions
                    (badge_id, category, title, description, criteria,
                     points, rarity, icon, color, active)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&def.badge_id)
            .bind(&def.category)
            .bind(&def.title)
            .bind(&def.description)
            .bind(&criteria)
            .bind(def.points)
            .bind(def.rarity.as_str())
            .bind(&def.icon)
            .bind(&def.color)
            .bind(i64::from(def.active))
            .execute(&self.pool)
            .await
            .with_context(|| format!("seeding catalog row {}", def.badge_id))?;
        }
        Ok(())
    }

    // ─── Unlock records ───────────────────────────────────────────────────────

    /// The set of badge keys this user has already unlocked.
    pub async fn unlocked_badge_ids(&self, user_id: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT badge_id FROM user_badges WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .context("loading unlocked badge ids")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// All unlock records for a user.
    pub async fn user_badges(&self, user_id: &str) -> Result<Vec<UserBadge>> {
        let rows: Vec<(String, String, String, String, String, i64, Option<String>, i64)> =
            sqlx::query_as(
                "SELECT id, user_id, badge_id, unlocked_at, tier,
                        progress_percentage, metadata, share_count
                   FROM user_badges
                  WHERE user_id = ?
               ORDER BY unlocked_at ASC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("loading user badges")?;

        let mut badges = Vec::with_capacity(rows.len());
        for (id, user_id, badge_id, unlocked_at, tier, progress, metadata, share_count) in rows {
            let Some(tier) = Rarity::parse(&tier) else {
                warn!(badge_id, tier, "unknown tier on unlock row; skipping");
                continue;
            };
            badges.push(UserBadge {
                id,
                user_id,
                badge_id,
                unlocked_at,
                tier,
                progress_percentage: progress,
                metadata,
                share_count,
            });
        }
        Ok(badges)
    }

    /// Insert an unlock record unless one already exists for the same
    /// `(user_id, badge_id)`. Returns `true` if this call created the row.
    ///
    /// `INSERT OR IGNORE` on the unique key makes the check-then-create
    /// sequence race-safe: two concurrent triggers can both observe "not
    /// unlocked yet", but only one insert takes effect and the loser reads
    /// "already unlocked, not an error".
    pub async fn insert_badge_if_absent(&self, badge: &UserBadge) -> Result<bool> {
        let rows_affected = sqlx::query(
            "INSERT OR IGNORE INTO user_badges
                (id, user_id, badge_id, unlocked_at, tier,
                 progress_percentage, metadata, share_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&badge.id)
        .bind(&badge.user_id)
        .bind(&badge.badge_id)
        .bind(&badge.unlocked_at)
        .bind(badge.tier.as_str())
        .bind(badge.progress_percentage)
        .bind(&badge.metadata)
        .bind(badge.share_count)
        .execute(&self.pool)
        .await
        .context("inserting unlock record")?
        .rows_affected();
        Ok(rows_affected > 0)
    }

    /// Credit points to a user's balance. Called only for a freshly
    /// inserted unlock row, so points are never double-credited.
    pub async fn credit_points(&self, user_id: &str, points: i64) -> Result<()> {
        sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
            .bind(points)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("crediting badge points")?;
        Ok(())
    }

    /// Increment the share counter on an unlock record, the only mutation
    /// an unlock row ever receives. Returns `false` if no such row exists.
    pub async fn increment_share_count(&self, user_id: &str, badge_id: &str) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE user_badges SET share_count = share_count + 1
              WHERE user_id = ? AND badge_id = ?",
        )
        .bind(user_id)
        .bind(badge_id)
        .execute(&self.pool)
        .await
        .context("incrementing share count")?
        .rows_affected();
        Ok(rows_affected > 0)
    }

    // ─── Ingestion helpers ────────────────────────────────────────────────────
    // The host application writes activity through its own CRUD layer; these
    // minimal writers exist for seeding, fixtures, and tests.

    pub async fn create_user(&self, user_id: &str, created_at_ms: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO users (id, created_at, points) VALUES (?, ?, 0)")
            .bind(user_id)
            .bind(created_at_ms)
            .execute(&self.pool)
            .await
            .context("creating user")?;
        Ok(())
    }

    pub async fn record_task(
        &self,
        user_id: &str,
        priority: &str,
        category: &str,
        completed_at_ms: Option<i64>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let status = if completed_at_ms.is_some() { "done" } else { "open" };
        sqlx::query(
            "INSERT INTO tasks (id, user_id, status, priority, category, completed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(status)
        .bind(priority)
        .bind(category)
        .bind(completed_at_ms)
        .execute(&self.pool)
        .await
        .context("recording task")?;
        Ok(id)
    }

    pub async fn record_health_log(
        &self,
        user_id: &str,
        kind: &str,
        logged_at_ms: i64,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO health_logs (id, user_id, kind, logged_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(user_id)
            .bind(kind)
            .bind(logged_at_ms)
            .execute(&self.pool)
            .await
            .context("recording health log")?;
        Ok(id)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
