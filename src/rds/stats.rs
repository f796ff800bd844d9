//! Per-provider update counters.
//!
//! # Metrics
//! - `<prefix>rds.update_attempt` (counter): fetches started
//! - `<prefix>rds.update_success` (counter): fetches applied or deduplicated
//! - `<prefix>rds.update_failure` (counter): fetch, parse or build failures
//! - `<prefix>rds.update_empty` (counter): updates carrying no resource
//! - `<prefix>rds.config_reload` (counter): new configurations published
//!
//! Values are mirrored in process so the admin API and tests can read them
//! without a recorder installed.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdsCounter {
    UpdateAttempt,
    UpdateSuccess,
    UpdateFailure,
    UpdateEmpty,
    ConfigReload,
}

impl RdsCounter {
    pub const ALL: [RdsCounter; 5] = [
        RdsCounter::UpdateAttempt,
        RdsCounter::UpdateSuccess,
        RdsCounter::UpdateFailure,
        RdsCounter::UpdateEmpty,
        RdsCounter::ConfigReload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RdsCounter::UpdateAttempt => "update_attempt",
            RdsCounter::UpdateSuccess => "update_success",
            RdsCounter::UpdateFailure => "update_failure",
            RdsCounter::UpdateEmpty => "update_empty",
            RdsCounter::ConfigReload => "config_reload",
        }
    }
}

#[derive(Debug, Default)]
pub struct RdsStats {
    prefix: String,
    update_attempt: AtomicU64,
    update_success: AtomicU64,
    update_failure: AtomicU64,
    update_empty: AtomicU64,
    config_reload: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RdsStatsSnapshot {
    pub update_attempt: u64,
    pub update_success: u64,
    pub update_failure: u64,
    pub update_empty: u64,
    pub config_reload: u64,
}

impl RdsStats {
    /// `stat_prefix` is used verbatim, so callers include any trailing `.`.
    pub fn new(stat_prefix: impl Into<String>) -> Self {
        Self {
            prefix: stat_prefix.into(),
            ..Default::default()
        }
    }

    pub fn metric_name(&self, counter: RdsCounter) -> String {
        format!("{}rds.{}", self.prefix, counter.as_str())
    }

    pub fn inc(&self, counter: RdsCounter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
        metrics::counter!(self.metric_name(counter)).increment(1);
    }

    pub fn get(&self, counter: RdsCounter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RdsStatsSnapshot {
        RdsStatsSnapshot {
            update_attempt: self.get(RdsCounter::UpdateAttempt),
            update_success: self.get(RdsCounter::UpdateSuccess),
            update_failure: self.get(RdsCounter::UpdateFailure),
            update_empty: self.get(RdsCounter::UpdateEmpty),
            config_reload: self.get(RdsCounter::ConfigReload),
        }
    }

    fn slot(&self, counter: RdsCounter) -> &AtomicU64 {
        match counter {
            RdsCounter::UpdateAttempt => &self.update_attempt,
            RdsCounter::UpdateSuccess => &self.update_success,
            RdsCounter::UpdateFailure => &self.update_failure,
            RdsCounter::UpdateEmpty => &self.update_empty,
            RdsCounter::ConfigReload => &self.config_reload,
        }
    }
}
