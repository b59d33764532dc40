// Scheduler configuration

use crate::application::constants::*;
use crate::application::load_balancer::LoadBalanceStrategy;
use crate::domain::QueueType;
use std::time::Duration;

/// Knobs for the queue manager and the autoscaling loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Global worker cap (add_worker fails and scale-up stops at this count)
    pub max_workers: usize,

    /// Capacity of queues created implicitly by add_worker
    pub default_queue_capacity: usize,

    /// Discipline of queues created implicitly by add_worker
    pub default_queue_type: QueueType,

    /// Health-score error normaliser
    pub max_errors: u32,

    /// Strategy used by select_worker / dispatch
    pub load_balance_strategy: LoadBalanceStrategy,

    pub autoscale_interval: Duration,
    pub scale_up_load_threshold: f64,
    pub scale_up_pending_threshold: usize,
    pub scale_down_load_threshold: f64,

    /// Force-fail requests processing longer than this. `None` disables the reaper.
    pub stall_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            default_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            default_queue_type: QueueType::Priority,
            max_errors: DEFAULT_MAX_ERRORS,
            load_balance_strategy: LoadBalanceStrategy::LeastLoaded,
            autoscale_interval: DEFAULT_AUTOSCALE_INTERVAL,
            scale_up_load_threshold: SCALE_UP_LOAD_THRESHOLD,
            scale_up_pending_threshold: SCALE_UP_PENDING_THRESHOLD,
            scale_down_load_threshold: SCALE_DOWN_LOAD_THRESHOLD,
            stall_timeout: None,
        }
    }
}
