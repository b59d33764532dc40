// Scheduler constants (ADR: No magic values)
use std::time::Duration;

/// Queue created for workers that name no queue
pub const DEFAULT_QUEUE: &str = "default";

/// History log bound; when exceeded the most recent half is kept
pub const HISTORY_MAX_ENTRIES: usize = 10_000;

/// Completed requests considered by the rolling wait/processing averages
pub const METRICS_WINDOW: usize = 1_000;

/// Trailing window for throughput (60s)
pub const THROUGHPUT_WINDOW_MS: i64 = 60_000;

/// Global worker cap
pub const DEFAULT_MAX_WORKERS: usize = 32;

/// Pending capacity for queues created implicitly by add_worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

/// Error count at which the error term of the health score reaches zero
pub const DEFAULT_MAX_ERRORS: u32 = 10;

/// Autoscaling cadence (30s)
pub const DEFAULT_AUTOSCALE_INTERVAL: Duration = Duration::from_secs(30);

/// Scale up when Σload / Σcapacity exceeds this
pub const SCALE_UP_LOAD_THRESHOLD: f64 = 0.8;

/// Scale up when more requests than this are pending across all queues
pub const SCALE_UP_PENDING_THRESHOLD: usize = 10;

/// Scale down when Σload / Σcapacity falls below this (and nothing is pending)
pub const SCALE_DOWN_LOAD_THRESHOLD: f64 = 0.2;
