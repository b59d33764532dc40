// Autoscaler - periodic scaling decisions forwarded to a Provisioner
//
// The manager only decides; starting and stopping workers is the provisioner's
// job, which later reports back through add_worker / remove_worker.

pub mod policy;
pub mod shutdown;

pub use policy::{ScalingAction, ScalingContext, ScalingDecision, ScalingPolicy};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::application::manager::QueueManager;
use crate::error::Result;
use crate::port::Provisioner;

pub struct Autoscaler {
    manager: Arc<QueueManager>,
    provisioner: Arc<dyn Provisioner>,
    interval: Duration,
}

impl Autoscaler {
    /// Uses the manager's configured autoscale interval
    pub fn new(manager: Arc<QueueManager>, provisioner: Arc<dyn Provisioner>) -> Self {
        let interval = manager.config().autoscale_interval;
        Self {
            manager,
            provisioner,
            interval,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One housekeeping pass: reap stalled requests (if enabled), evaluate the
    /// thresholds and hand the resulting intent to the provisioner.
    ///
    /// A retirement the provisioner refuses is rolled back so the worker keeps
    /// receiving work.
    pub async fn run_once(&self) -> Result<ScalingDecision> {
        if let Some(timeout) = self.manager.config().stall_timeout {
            let reaped = self.manager.reap_stalled(timeout)?;
            if !reaped.is_empty() {
                warn!(count = reaped.len(), "Reaped stalled requests");
            }
        }

        let decision = self.manager.tick();
        match &decision {
            ScalingDecision::None => {}
            ScalingDecision::ScaleUp {
                queue_id, count, ..
            } => {
                self.provisioner.scale_up(queue_id.as_ref(), *count).await?;
            }
            ScalingDecision::ScaleDown { worker_id, .. } => {
                if let Err(e) = self.provisioner.retire(worker_id).await {
                    self.manager.cancel_retirement(worker_id)?;
                    return Err(e.into());
                }
            }
        }
        Ok(decision)
    }

    /// Tick loop until `shutdown` fires. Failures are logged, never fatal.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Autoscaler started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so a fresh daemon gets one
        // interval to register workers.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Autoscaler tick failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Autoscaler stopping");
                    break;
                }
            }
        }
    }

    /// Run the loop on the tokio runtime
    pub fn spawn(self) -> AutoscalerHandle {
        let (shutdown, token) = shutdown_channel();
        let task = tokio::spawn(self.run(token));
        AutoscalerHandle { shutdown, task }
    }
}

pub struct AutoscalerHandle {
    shutdown: ShutdownSender,
    task: JoinHandle<()>,
}

impl AutoscalerHandle {
    /// Signal the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.shutdown.shutdown();
        if let Err(e) = self.task.await {
            error!(error = %e, "Autoscaler task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::SchedulerConfig;
    use crate::domain::{QueueType, Request, WorkerStatus};
    use crate::error::AppError;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::provisioner::mocks::{ProvisionEvent, RecordingProvisioner};
    use crate::port::time_provider::mocks::MockTimeProvider;

    fn manager_with(config: SchedulerConfig) -> (Arc<QueueManager>, Arc<MockTimeProvider>) {
        let clock = Arc::new(MockTimeProvider::new(0));
        let manager = QueueManager::new(
            config,
            clock.clone(),
            Arc::new(SequentialIdProvider::new("req")),
        );
        (Arc::new(manager), clock)
    }

    #[tokio::test]
    async fn test_scale_up_forwarded_to_provisioner() {
        let (manager, _) = manager_with(SchedulerConfig::default());
        manager.create_queue("chat", QueueType::Priority, 100).unwrap();
        for i in 0..11 {
            manager
                .enqueue("chat", Request::new(format!("r{}", i), 5))
                .unwrap();
        }

        let provisioner = Arc::new(RecordingProvisioner::new());
        let autoscaler = Autoscaler::new(manager, provisioner.clone());
        let decision = autoscaler.run_once().await.unwrap();

        assert!(matches!(decision, ScalingDecision::ScaleUp { .. }));
        assert_eq!(
            provisioner.events(),
            vec![ProvisionEvent::ScaleUp {
                queue_id: Some("chat".to_string()),
                count: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_rejected_retire_is_rolled_back() {
        let (manager, clock) = manager_with(SchedulerConfig::default());
        manager.add_worker("w1", "p", "m", 1, "q").unwrap();
        manager.add_worker("w2", "p", "m", 1, "q").unwrap();
        clock.advance(1_000);

        let provisioner = Arc::new(RecordingProvisioner::new_rejecting());
        let autoscaler = Autoscaler::new(manager.clone(), provisioner);

        let err = autoscaler.run_once().await.unwrap_err();
        assert!(matches!(err, AppError::Provisioning(_)));
        for worker in manager.workers() {
            assert_eq!(worker.status, WorkerStatus::Idle);
        }
    }

    #[tokio::test]
    async fn test_run_once_reaps_when_enabled() {
        let (manager, clock) = manager_with(SchedulerConfig {
            stall_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        manager.add_worker("w1", "p", "m", 1, "q").unwrap();
        manager.enqueue("q", Request::new("r", 5)).unwrap();
        manager.next_request("w1").unwrap().unwrap();
        clock.advance(31_000);

        let autoscaler = Autoscaler::new(manager.clone(), Arc::new(RecordingProvisioner::new()));
        autoscaler.run_once().await.unwrap();

        assert_eq!(manager.worker("w1").unwrap().current_load, 0);
        assert_eq!(manager.queue_stats("q").unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_spawned_loop_stops_on_shutdown() {
        let (manager, _) = manager_with(SchedulerConfig::default());
        let handle = Autoscaler::new(manager, Arc::new(RecordingProvisioner::new()))
            .with_interval(Duration::from_millis(10))
            .spawn();

        tokio::time::sleep(Duration::from_millis(30)).await;
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("autoscaler did not stop");
    }
}
