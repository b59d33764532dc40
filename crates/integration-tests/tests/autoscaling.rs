//! Autoscaling loop tests
//!
//! Drives QueueManager::tick / Autoscaler against a recording provisioner that
//! plays the orchestrator: it registers or removes workers when asked.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use infergate_core::application::autoscaler::{Autoscaler, ScalingDecision};
use infergate_core::application::{QueueManager, SchedulerConfig};
use infergate_core::domain::{QueueId, QueueType, Request, WorkerId, WorkerStatus};
use infergate_core::port::provisioner::mocks::{ProvisionEvent, RecordingProvisioner};
use infergate_core::port::{ProvisionError, Provisioner};
use infergate_integration_tests::manager_with_clock;

/// Orchestrator stand-in: acts on intents immediately
struct InProcessProvisioner {
    manager: Arc<QueueManager>,
    next_id: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl Provisioner for InProcessProvisioner {
    async fn scale_up(&self, queue_id: Option<&QueueId>, count: u32) -> Result<(), ProvisionError> {
        for _ in 0..count {
            let n = self
                .next_id
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.manager
                .add_worker(
                    format!("auto-{}", n),
                    "local",
                    "llama",
                    2,
                    queue_id.cloned().unwrap_or_else(|| "default".to_string()),
                )
                .map_err(|e| ProvisionError::Rejected(e.to_string()))?;
        }
        Ok(())
    }

    async fn retire(&self, worker_id: &WorkerId) -> Result<(), ProvisionError> {
        self.manager
            .remove_worker(worker_id)
            .map(|_| ())
            .map_err(|e| ProvisionError::Rejected(e.to_string()))
    }
}

/// Backlog with no workers scales up; drained system with spare workers scales down
#[tokio::test]
async fn test_scale_up_then_down_lifecycle() {
    let (manager, clock) = manager_with_clock(SchedulerConfig::default(), 0);
    manager.create_queue("chat", QueueType::Priority, 100).unwrap();
    for i in 0..20 {
        manager.enqueue("chat", Request::new(format!("r{}", i), 5)).unwrap();
    }

    let provisioner = Arc::new(InProcessProvisioner {
        manager: manager.clone(),
        next_id: Default::default(),
    });
    let autoscaler = Autoscaler::new(manager.clone(), provisioner);

    // Pending 20 > 10: one worker per tick
    for expected in 1..=2 {
        let decision = autoscaler.run_once().await.unwrap();
        assert!(matches!(decision, ScalingDecision::ScaleUp { .. }));
        assert_eq!(manager.workers().len(), expected);
    }

    // Drain everything
    for worker in manager.workers() {
        while let Some(r) = manager.next_request(&worker.id).unwrap() {
            clock.advance(10);
            manager.complete(&worker.id, &r.id, true, None).unwrap();
        }
    }
    assert_eq!(manager.queue_stats("chat").unwrap().pending, 0);

    // Idle: retire down to a single worker, then hold
    match autoscaler.run_once().await.unwrap() {
        ScalingDecision::ScaleDown { .. } => {}
        other => panic!("expected scale down, got {:?}", other),
    }
    assert_eq!(manager.workers().len(), 1);
    assert_eq!(autoscaler.run_once().await.unwrap(), ScalingDecision::None);
}

#[tokio::test]
async fn test_scale_up_stops_at_max_workers() {
    let (manager, _) = manager_with_clock(
        SchedulerConfig {
            max_workers: 2,
            ..Default::default()
        },
        0,
    );
    manager.add_worker("w1", "p", "m", 1, "q").unwrap();
    manager.add_worker("w2", "p", "m", 1, "q").unwrap();
    for i in 0..30 {
        manager.enqueue("q", Request::new(format!("r{}", i), 5)).unwrap();
    }

    assert_eq!(manager.tick(), ScalingDecision::None);
}

/// Overload alone (load > 0.8) is enough to scale up
#[tokio::test]
async fn test_overload_triggers_scale_up() {
    let (manager, _) = manager_with_clock(SchedulerConfig::default(), 0);
    manager.add_worker("w1", "p", "m", 1, "q").unwrap();
    manager.enqueue("q", Request::new("only", 5)).unwrap();
    manager.next_request("w1").unwrap().unwrap();

    let provisioner = Arc::new(RecordingProvisioner::new());
    let autoscaler = Autoscaler::new(manager.clone(), provisioner.clone());
    autoscaler.run_once().await.unwrap();

    // Nothing pending, so no queue is singled out
    assert_eq!(
        provisioner.events(),
        vec![ProvisionEvent::ScaleUp {
            queue_id: None,
            count: 1
        }]
    );
}

/// Retirement target is the worker idle the longest, and it stops receiving work
#[tokio::test]
async fn test_scale_down_targets_longest_idle() {
    let (manager, clock) = manager_with_clock(SchedulerConfig::default(), 0);
    manager.add_worker("old", "p", "m", 1, "q").unwrap();
    clock.advance(60_000);
    manager.add_worker("fresh", "p", "m", 1, "q").unwrap();

    let provisioner = Arc::new(RecordingProvisioner::new());
    let autoscaler = Autoscaler::new(manager.clone(), provisioner.clone());
    autoscaler.run_once().await.unwrap();

    assert_eq!(
        provisioner.events(),
        vec![ProvisionEvent::Retire {
            worker_id: "old".to_string()
        }]
    );
    assert_eq!(manager.worker("old").unwrap().status, WorkerStatus::Stopping);
    assert_eq!(manager.worker("fresh").unwrap().status, WorkerStatus::Idle);
}

/// Spawned loop ticks on its interval and stops cleanly
#[tokio::test]
async fn test_spawned_loop_emits_intents_until_shutdown() {
    let (manager, _) = manager_with_clock(SchedulerConfig::default(), 0);
    manager.create_queue("q", QueueType::Priority, 100).unwrap();
    for i in 0..15 {
        manager.enqueue("q", Request::new(format!("r{}", i), 5)).unwrap();
    }

    let provisioner = Arc::new(RecordingProvisioner::new());
    let handle = Autoscaler::new(manager, provisioner.clone())
        .with_interval(Duration::from_millis(20))
        .spawn();

    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.shutdown().await;

    let events = provisioner.events();
    assert!(!events.is_empty(), "loop never ticked");
    assert!(events.iter().all(|e| matches!(
        e,
        ProvisionEvent::ScaleUp { queue_id: Some(q), count: 1 } if q == "q"
    )));

    // No more ticks after shutdown
    let after = events.len();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(provisioner.events().len(), after);
}
