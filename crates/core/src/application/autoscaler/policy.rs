//! Scaling policy - pure threshold evaluation, no I/O

use serde::{Deserialize, Serialize};

use crate::application::config::SchedulerConfig;
use crate::domain::{QueueId, WorkerId};

/// Decision produced by one autoscaling tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingDecision {
    /// No action needed
    None,
    /// Ask the provisioner for more workers
    ScaleUp {
        queue_id: Option<QueueId>,
        count: u32,
        reason: String,
    },
    /// Ask the provisioner to retire this idle worker
    ScaleDown { worker_id: WorkerId, reason: String },
}

/// Aggregate load observed at tick time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingContext {
    /// Σ current_load / Σ max_concurrent
    pub system_load: f64,
    pub total_pending: usize,
    pub worker_count: usize,
    /// Queue with the most pending requests, if any are pending
    pub busiest_queue: Option<QueueId>,
}

/// What the thresholds call for, before a worker is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalingAction {
    Hold,
    ScaleUp { reason: String },
    ScaleDown { reason: String },
}

#[derive(Debug, Clone)]
pub struct ScalingPolicy {
    max_workers: usize,
    scale_up_load: f64,
    scale_up_pending: usize,
    scale_down_load: f64,
}

impl ScalingPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            scale_up_load: config.scale_up_load_threshold,
            scale_up_pending: config.scale_up_pending_threshold,
            scale_down_load: config.scale_down_load_threshold,
        }
    }

    pub fn evaluate(&self, ctx: &ScalingContext) -> ScalingAction {
        let overloaded = ctx.system_load > self.scale_up_load;
        let backlog = ctx.total_pending > self.scale_up_pending;
        let unserved = ctx.worker_count == 0 && ctx.total_pending > 0;

        if overloaded || backlog || unserved {
            if ctx.worker_count >= self.max_workers {
                return ScalingAction::Hold;
            }
            let reason = if overloaded {
                format!("system load {:.2} above {:.2}", ctx.system_load, self.scale_up_load)
            } else if backlog {
                format!(
                    "{} pending requests above {}",
                    ctx.total_pending, self.scale_up_pending
                )
            } else {
                format!("{} pending requests and no workers", ctx.total_pending)
            };
            return ScalingAction::ScaleUp { reason };
        }

        if ctx.system_load < self.scale_down_load && ctx.total_pending == 0 && ctx.worker_count > 1
        {
            return ScalingAction::ScaleDown {
                reason: format!(
                    "system load {:.2} below {:.2} with empty queues",
                    ctx.system_load, self.scale_down_load
                ),
            };
        }

        ScalingAction::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ScalingPolicy {
        ScalingPolicy::from_config(&SchedulerConfig {
            max_workers: 4,
            ..Default::default()
        })
    }

    fn ctx(system_load: f64, total_pending: usize, worker_count: usize) -> ScalingContext {
        ScalingContext {
            system_load,
            total_pending,
            worker_count,
            busiest_queue: None,
        }
    }

    #[test]
    fn test_scale_up_on_load() {
        assert!(matches!(
            policy().evaluate(&ctx(0.9, 0, 2)),
            ScalingAction::ScaleUp { .. }
        ));
    }

    #[test]
    fn test_scale_up_on_backlog() {
        assert!(matches!(
            policy().evaluate(&ctx(0.5, 11, 2)),
            ScalingAction::ScaleUp { .. }
        ));
        // Exactly at the threshold is not enough
        assert_eq!(policy().evaluate(&ctx(0.5, 10, 2)), ScalingAction::Hold);
    }

    #[test]
    fn test_scale_up_without_workers() {
        assert!(matches!(
            policy().evaluate(&ctx(0.0, 1, 0)),
            ScalingAction::ScaleUp { .. }
        ));
    }

    #[test]
    fn test_scale_up_respects_ceiling() {
        assert_eq!(policy().evaluate(&ctx(1.0, 50, 4)), ScalingAction::Hold);
    }

    #[test]
    fn test_scale_down_when_idle() {
        assert!(matches!(
            policy().evaluate(&ctx(0.1, 0, 2)),
            ScalingAction::ScaleDown { .. }
        ));
    }

    #[test]
    fn test_never_scale_below_one_worker() {
        assert_eq!(policy().evaluate(&ctx(0.0, 0, 1)), ScalingAction::Hold);
    }

    #[test]
    fn test_no_scale_down_with_pending_work() {
        assert_eq!(policy().evaluate(&ctx(0.1, 3, 3)), ScalingAction::Hold);
    }

    #[test]
    fn test_hold_in_band() {
        assert_eq!(policy().evaluate(&ctx(0.5, 2, 3)), ScalingAction::Hold);
    }
}
