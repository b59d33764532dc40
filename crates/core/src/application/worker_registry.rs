//! WorkerRegistry - worker identities, their queue assignment and in-flight work
//!
//! Independent of queue contents. The manager holds the registry lock across
//! every operation that touches both a worker and a queue.

use std::collections::HashMap;
use tracing::info;

use crate::domain::{QueueId, RequestId, WorkerId, WorkerInfo};
use crate::error::{AppError, Result};

pub struct WorkerRegistry {
    workers: HashMap<WorkerId, WorkerInfo>,
    assignments: HashMap<WorkerId, QueueId>,
    // Request IDs are only unique within a queue
    in_flight: HashMap<(QueueId, RequestId), WorkerId>,
    max_workers: usize,
}

impl WorkerRegistry {
    pub fn new(max_workers: usize) -> Self {
        Self {
            workers: HashMap::new(),
            assignments: HashMap::new(),
            in_flight: HashMap::new(),
            max_workers,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn contains(&self, worker_id: &str) -> bool {
        self.workers.contains_key(worker_id)
    }

    /// Check that `worker_id` could be registered right now
    pub fn ensure_can_register(&self, worker_id: &str) -> Result<()> {
        if self.workers.contains_key(worker_id) {
            return Err(AppError::Conflict(format!(
                "Worker {} already registered",
                worker_id
            )));
        }
        if self.workers.len() >= self.max_workers {
            return Err(AppError::WorkerLimit(self.workers.len()));
        }
        Ok(())
    }

    pub fn register(&mut self, worker: WorkerInfo, queue_id: QueueId) -> Result<()> {
        self.ensure_can_register(&worker.id)?;
        info!(
            worker_id = %worker.id,
            queue_id = %queue_id,
            provider = %worker.provider,
            model = %worker.model,
            max_concurrent = worker.max_concurrent,
            "Worker registered"
        );
        self.assignments.insert(worker.id.clone(), queue_id);
        self.workers.insert(worker.id.clone(), worker);
        Ok(())
    }

    /// Remove a worker; refused while it has work in flight
    pub fn deregister(&mut self, worker_id: &str) -> Result<WorkerInfo> {
        let worker = self
            .workers
            .get(worker_id)
            .ok_or_else(|| AppError::NotFound(format!("Worker {} not found", worker_id)))?;

        if worker.current_load > 0 {
            return Err(AppError::InvalidState(format!(
                "Worker {} has {} request(s) in flight",
                worker_id, worker.current_load
            )));
        }

        self.assignments.remove(worker_id);
        let worker = self
            .workers
            .remove(worker_id)
            .ok_or_else(|| AppError::NotFound(format!("Worker {} not found", worker_id)))?;
        info!(worker_id = %worker_id, processed = worker.processed_count, "Worker deregistered");
        Ok(worker)
    }

    pub fn get(&self, worker_id: &str) -> Option<&WorkerInfo> {
        self.workers.get(worker_id)
    }

    pub fn get_mut(&mut self, worker_id: &str) -> Option<&mut WorkerInfo> {
        self.workers.get_mut(worker_id)
    }

    pub fn queue_of(&self, worker_id: &str) -> Option<&QueueId> {
        self.assignments.get(worker_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerInfo> {
        self.workers.values()
    }

    /// Workers assigned to `queue_id` in registration order
    pub fn workers_for_queue(&self, queue_id: &str) -> Vec<&WorkerInfo> {
        let mut workers: Vec<&WorkerInfo> = self
            .assignments
            .iter()
            .filter(|(_, q)| q.as_str() == queue_id)
            .filter_map(|(id, _)| self.workers.get(id))
            .collect();
        workers.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        workers
    }

    pub fn track(&mut self, queue_id: QueueId, request_id: RequestId, worker_id: WorkerId) {
        self.in_flight.insert((queue_id, request_id), worker_id);
    }

    pub fn untrack(&mut self, queue_id: &str, request_id: &str) -> Option<WorkerId> {
        self.in_flight
            .remove(&(queue_id.to_string(), request_id.to_string()))
    }

    pub fn owner_of(&self, queue_id: &str, request_id: &str) -> Option<&WorkerId> {
        self.in_flight
            .get(&(queue_id.to_string(), request_id.to_string()))
    }

    /// Σ current_load / Σ max_concurrent (0 with no workers)
    pub fn system_load(&self) -> f64 {
        let (load, capacity) = self.workers.values().fold((0u64, 0u64), |(l, c), w| {
            (l + w.current_load as u64, c + w.max_concurrent as u64)
        });
        if capacity == 0 {
            return 0.0;
        }
        load as f64 / capacity as f64
    }

    /// Idle worker with the longest time since its last activity
    pub fn retirement_candidate(&self) -> Option<&WorkerInfo> {
        self.workers
            .values()
            .filter(|w| w.is_idle())
            .min_by(|a, b| {
                a.last_activity_at
                    .cmp(&b.last_activity_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
    }
}
