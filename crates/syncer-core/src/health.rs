//! Health record and liveness derivation
//!
//! The registry maps a target key to the Unix timestamp of its last completed
//! run. Entries are seeded when a syncer is built and stamped at the end of
//! every successful run. Liveness is computed on demand against the targets
//! of the active runtime.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

#[derive(Clone, Debug, Default)]
pub struct HealthRegistry {
    last_runs: Arc<DashMap<String, i64>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `now` for a newly registered target
    pub fn seed(&self, key: &str, now: i64) {
        self.last_runs.insert(key.to_string(), now);
    }

    /// Record a completed run
    pub fn touch(&self, key: &str, now: i64) {
        self.last_runs.insert(key.to_string(), now);
    }

    pub fn last_run(&self, key: &str) -> Option<i64> {
        self.last_runs.get(key).map(|v| *v)
    }

    /// Classify every `(key, threshold)` pair as running or lost
    pub fn liveness<'a>(
        &self,
        targets: impl IntoIterator<Item = (&'a str, i64)>,
        now: i64,
        uptime: Duration,
    ) -> Liveness {
        let mut liveness = Liveness {
            uptime: format_uptime(uptime),
            ..Default::default()
        };

        for (key, maximum_interval_sec) in targets {
            liveness.total += 1;
            let last = self.last_run(key).unwrap_or(0);
            if now - last > maximum_interval_sec {
                liveness.lost += 1;
                liveness.details.push(format!(
                    "syncer:{},Not running for more than {} sec",
                    key,
                    now - last
                ));
            } else {
                liveness.running += 1;
                liveness.details.push(format!("syncer:{},is ok", key));
            }
        }

        liveness.status = if liveness.lost == 0 {
            HealthStatus::Ok
        } else if liveness.running == 0 {
            HealthStatus::Down
        } else {
            HealthStatus::Warn
        };
        liveness
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    #[default]
    Ok,
    Warn,
    Down,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "OK"),
            HealthStatus::Warn => write!(f, "WARN"),
            HealthStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Aggregate liveness report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Liveness {
    pub total: usize,
    pub running: usize,
    pub lost: usize,
    pub status: HealthStatus,
    pub details: Vec<String>,
    pub uptime: String,
}

impl Liveness {
    pub fn is_down(&self) -> bool {
        self.status == HealthStatus::Down
    }
}

/// `1h2m3s` style rendering, rounded to seconds
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs_f64().round() as u64;
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
