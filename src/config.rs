//! Engine configuration (`laurel.toml`).
//!
//! All fields have serde defaults so a missing or partial file is fine.
//! The reference offset exists because "calendar day" is otherwise ambiguous:
//! activity timestamps are epoch milliseconds, and the streak and hour-of-day
//! rules must agree on what local day/hour those fall in.

use anyhow::{Context as _, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_STREAK_WINDOW_DAYS: u32 = 30;
const DEFAULT_NOTIFY_QUEUE: usize = 256;

/// Engine configuration, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed UTC offset, in minutes, used to derive the local calendar day
    /// for streaks and the local hour for the early/late task rules.
    /// Default: 0 (UTC). Example: -300 for UTC-5.
    pub reference_offset_minutes: i32,

    /// How far back the streak day query looks. A streak longer than this
    /// window is reported as the window length at most. Default: 30.
    pub streak_window_days: u32,

    /// Webhook URL that receives `badge_unlocked` notifications.
    /// None disables outbound notification entirely.
    pub notify_url: Option<String>,

    /// Capacity of the in-process notification queue. When full, further
    /// notifications are dropped with a warning; they never block an unlock.
    pub notify_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reference_offset_minutes: 0,
            streak_window_days: DEFAULT_STREAK_WINDOW_DAYS,
            notify_url: None,
            notify_queue: DEFAULT_NOTIFY_QUEUE,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// The reference offset as a `chrono::FixedOffset`.
    ///
    /// Falls back to UTC if the configured value is out of the valid
    /// ±24h range rather than failing the whole engine.
    pub fn reference_offset(&self) -> FixedOffset {
        self.reference_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }

    /// The reference offset in whole seconds, for SQL-side day/hour math.
    pub fn reference_offset_secs(&self) -> i64 {
        i64::from(self.reference_offset_minutes) * 60
    }
}
