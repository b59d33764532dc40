// Worker Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Worker identifier
pub type WorkerId = String;

/// Minimum health score for a worker to receive new work
pub const HEALTH_FLOOR: f64 = 0.5;

/// Decay applied to the rolling success rate on every completion
pub const SUCCESS_RATE_DECAY: f64 = 0.95;

/// Worker state
///
/// `Busy` is derived from load. `Error` and `Maintenance` are only entered on
/// an explicit external signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Starting,
    Stopping,
    Error,
    Maintenance,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "IDLE"),
            WorkerStatus::Busy => write!(f, "BUSY"),
            WorkerStatus::Starting => write!(f, "STARTING"),
            WorkerStatus::Stopping => write!(f, "STOPPING"),
            WorkerStatus::Error => write!(f, "ERROR"),
            WorkerStatus::Maintenance => write!(f, "MAINTENANCE"),
        }
    }
}

impl FromStr for WorkerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IDLE" => Ok(WorkerStatus::Idle),
            "BUSY" => Ok(WorkerStatus::Busy),
            "STARTING" => Ok(WorkerStatus::Starting),
            "STOPPING" => Ok(WorkerStatus::Stopping),
            "ERROR" => Ok(WorkerStatus::Error),
            "MAINTENANCE" => Ok(WorkerStatus::Maintenance),
            other => Err(DomainError::UnknownWorkerStatus(other.to_string())),
        }
    }
}

/// A registered worker and its rolling health/load figures.
///
/// `provider` and `model` are opaque labels owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub provider: String,
    pub model: String,

    pub max_concurrent: u32,
    pub current_load: u32,
    pub status: WorkerStatus,

    pub success_rate: f64,
    pub error_count: u32,
    pub health_score: f64,

    pub processed_count: u64,
    pub avg_processing_time_ms: f64,

    pub registered_at: i64,    // epoch ms
    pub last_activity_at: i64, // epoch ms
}

impl WorkerInfo {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        max_concurrent: u32,
        now_millis: i64,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            model: model.into(),
            max_concurrent,
            current_load: 0,
            status: WorkerStatus::Idle,
            success_rate: 1.0,
            error_count: 0,
            health_score: 1.0,
            processed_count: 0,
            avg_processing_time_ms: 0.0,
            registered_at: now_millis,
            last_activity_at: now_millis,
        }
    }

    /// current_load / max_concurrent
    pub fn load_fraction(&self) -> f64 {
        if self.max_concurrent == 0 {
            return 1.0;
        }
        self.current_load as f64 / self.max_concurrent as f64
    }

    pub fn has_headroom(&self) -> bool {
        self.current_load < self.max_concurrent
    }

    /// Eligible for new work: accepting state, spare capacity, healthy.
    ///
    /// A partially loaded `Busy` worker still counts; `Busy` means "has work",
    /// not "is full".
    pub fn is_available(&self) -> bool {
        matches!(self.status, WorkerStatus::Idle | WorkerStatus::Busy)
            && self.has_headroom()
            && self.health_score > HEALTH_FLOOR
    }

    /// Idle with nothing in flight
    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle && self.current_load == 0
    }

    /// Account for a request handed to this worker
    pub fn record_dequeue(&mut self, now_millis: i64) {
        self.current_load = (self.current_load + 1).min(self.max_concurrent);
        if self.status == WorkerStatus::Idle {
            self.status = WorkerStatus::Busy;
        }
        self.last_activity_at = now_millis;
    }

    /// Account for a finished request
    pub fn record_completion(
        &mut self,
        success: bool,
        processing_time_ms: f64,
        now_millis: i64,
        max_errors: u32,
    ) {
        self.current_load = self.current_load.saturating_sub(1);

        self.processed_count += 1;
        let n = self.processed_count as f64;
        self.avg_processing_time_ms =
            (self.avg_processing_time_ms * (n - 1.0) + processing_time_ms) / n;

        self.update_health(success, max_errors);

        if self.current_load == 0 && self.status == WorkerStatus::Busy {
            self.status = WorkerStatus::Idle;
        }
        self.last_activity_at = now_millis;
    }

    /// Exponentially decayed success rate; error count never decays.
    pub fn update_health(&mut self, success: bool, max_errors: u32) {
        self.success_rate = if success {
            (self.success_rate * SUCCESS_RATE_DECAY + (1.0 - SUCCESS_RATE_DECAY)).min(1.0)
        } else {
            (self.success_rate * SUCCESS_RATE_DECAY).max(0.0)
        };
        if !success {
            self.error_count += 1;
        }

        let error_term = (1.0 - self.error_count as f64 / max_errors.max(1) as f64).max(0.0);
        self.health_score = (self.success_rate + error_term) / 2.0;
    }
}
