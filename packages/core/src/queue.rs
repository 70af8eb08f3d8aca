//! Queue domain types: operational state, settings and introspection.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current operational state of the task queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Queue is active and dispatching tasks.
    #[default]
    Running,
    /// Dispatch is stopped; in-flight tasks still finish.
    Paused,
    /// Queue is shutting down and will not dispatch again.
    Draining,
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueState::Running => write!(f, "running"),
            QueueState::Paused => write!(f, "paused"),
            QueueState::Draining => write!(f, "draining"),
        }
    }
}

/// Retry and retention policy for the task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Attempts per task before it is terminally failed.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles on every further retry.
    pub backoff_base_ms: u64,
    /// Completed task records to keep.
    pub keep_completed: usize,
    /// Failed task records to keep.
    pub keep_failed: usize,
    /// Waiting tasks at which health reports a warning.
    pub warning_threshold: u64,
    /// Waiting tasks at which health reports critical.
    pub critical_threshold: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 2000,
            keep_completed: 100,
            keep_failed: 50,
            warning_threshold: 100,
            critical_threshold: 500,
        }
    }
}

impl QueueSettings {
    /// Delay before the retry that follows the given failed attempt (1-based).
    ///
    /// Exponential: `base`, `2 * base`, `4 * base`, ...
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << exponent))
    }
}

/// Counts of tasks per status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Tasks ready for dispatch.
    pub waiting: u64,
    /// Tasks executing on a worker.
    pub active: u64,
    /// Tasks waiting out a retry backoff.
    pub delayed: u64,
    /// Retained completed tasks.
    pub completed: u64,
    /// Retained terminally failed tasks.
    pub failed: u64,
    /// Whether dispatch is paused.
    pub paused: bool,
}

impl QueueStats {
    /// Tasks that still have work ahead of them.
    pub fn pending(&self) -> u64 {
        self.waiting + self.active + self.delayed
    }

    /// Total processed tasks.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Failed share of processed tasks, between 0 and 1.
    pub fn failure_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some(self.failed as f64 / total as f64)
        }
    }
}

/// Coarse health classification of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Paused,
}

/// Snapshot of queue health for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueHealth {
    pub state: QueueState,
    pub status: HealthStatus,
    pub stats: QueueStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_rate: Option<f64>,
    /// Last time a task was dispatched or finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl QueueHealth {
    /// Classify the queue from its state and counters.
    pub fn evaluate(
        state: QueueState,
        stats: QueueStats,
        settings: &QueueSettings,
        last_activity: Option<DateTime<Utc>>,
    ) -> Self {
        let failure_rate = stats.failure_rate();
        let status = if state == QueueState::Paused {
            HealthStatus::Paused
        } else if stats.waiting >= settings.critical_threshold {
            HealthStatus::Critical
        } else if stats.waiting >= settings.warning_threshold
            || failure_rate.is_some_and(|rate| rate > 0.5)
        {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        Self {
            state,
            status,
            stats,
            failure_rate,
            last_activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        let settings = QueueSettings::default();
        assert_eq!(settings.backoff_for(1), Duration::from_secs(2));
        assert_eq!(settings.backoff_for(2), Duration::from_secs(4));
        assert_eq!(settings.backoff_for(3), Duration::from_secs(8));
    }

    #[test]
    fn test_health_thresholds() {
        let settings = QueueSettings::default();

        let quiet = QueueStats::default();
        let health = QueueHealth::evaluate(QueueState::Running, quiet.clone(), &settings, None);
        assert_eq!(health.status, HealthStatus::Healthy);

        let paused = QueueHealth::evaluate(QueueState::Paused, quiet.clone(), &settings, None);
        assert_eq!(paused.status, HealthStatus::Paused);

        let draining = QueueHealth::evaluate(QueueState::Draining, quiet, &settings, None);
        assert_eq!(draining.status, HealthStatus::Healthy);
        assert_eq!(draining.state, QueueState::Draining);

        let backlog = QueueStats {
            waiting: 150,
            ..Default::default()
        };
        let health = QueueHealth::evaluate(QueueState::Running, backlog, &settings, None);
        assert_eq!(health.status, HealthStatus::Warning);

        let flooded = QueueStats {
            waiting: 500,
            ..Default::default()
        };
        let health = QueueHealth::evaluate(QueueState::Running, flooded, &settings, None);
        assert_eq!(health.status, HealthStatus::Critical);

        let failing = QueueStats {
            completed: 1,
            failed: 3,
            ..Default::default()
        };
        let health = QueueHealth::evaluate(QueueState::Running, failing, &settings, None);
        assert_eq!(health.status, HealthStatus::Warning);
        assert_eq!(health.failure_rate, Some(0.75));
    }
}
