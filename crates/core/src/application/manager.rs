//! QueueManager - owns the named queues and the worker registry
//!
//! Lock order is registry -> queue map -> single queue. Every operation that
//! updates both a queue and a worker (next_request, complete, dispatch, reaping)
//! holds the registry lock throughout, so a request can never be handed to a
//! worker that is being removed concurrently. Enqueue only takes the queue map
//! (read) and the target queue, so producers on different queues do not contend.
//!
//! Nothing here blocks waiting for work: an empty queue or a saturated worker
//! yields `Ok(None)` immediately and callers poll at their own cadence.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::autoscaler::policy::{
    ScalingAction, ScalingContext, ScalingDecision, ScalingPolicy,
};
use crate::application::config::SchedulerConfig;
use crate::application::load_balancer::LoadBalancer;
use crate::application::priority_queue::{EnqueueOutcome, PriorityQueue, QueueStats};
use crate::application::worker_registry::WorkerRegistry;
use crate::domain::{
    Priority, QueueConfig, QueueId, QueueType, Request, RequestId, WorkerId, WorkerInfo,
    WorkerStatus,
};
use crate::error::{AppError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{IdProvider, TimeProvider};

/// Whole-system snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub queue_count: usize,
    pub worker_count: usize,
    pub workers_by_status: BTreeMap<WorkerStatus, usize>,
    pub total_capacity: u64,
    pub total_load: u64,
    pub system_load: f64,
    pub avg_health_score: f64,
    pub total_pending: usize,
    pub total_processing: usize,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_queue_full_drops: u64,
    pub throughput_per_sec: f64,
}

pub struct QueueManager {
    config: SchedulerConfig,
    queues: RwLock<HashMap<QueueId, Mutex<PriorityQueue>>>,
    registry: Mutex<WorkerRegistry>,
    balancer: LoadBalancer,
    policy: ScalingPolicy,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl QueueManager {
    pub fn new(
        config: SchedulerConfig,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            registry: Mutex::new(WorkerRegistry::new(config.max_workers)),
            balancer: LoadBalancer::new(config.load_balance_strategy),
            policy: ScalingPolicy::from_config(&config),
            config,
            time_provider,
            id_provider,
        }
    }

    /// Wall clock and UUID request IDs
    pub fn with_system_providers(config: SchedulerConfig) -> Self {
        Self::new(config, Arc::new(SystemTimeProvider), Arc::new(UuidProvider))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build a request with a generated ID
    pub fn new_request(&self, priority: Priority) -> Request {
        Request::new(self.id_provider.generate_id(), priority)
    }

    // ------------------------------------------------------------------
    // Queues
    // ------------------------------------------------------------------

    pub fn create_queue(
        &self,
        queue_id: impl Into<String>,
        queue_type: QueueType,
        capacity: usize,
    ) -> Result<()> {
        let queue_id = queue_id.into();
        validate_id("queue", &queue_id)?;
        if capacity == 0 {
            return Err(AppError::Validation(
                "queue capacity must be at least 1".to_string(),
            ));
        }

        let mut queues = write(&self.queues);
        if queues.contains_key(&queue_id) {
            return Err(AppError::Conflict(format!(
                "Queue {} already exists",
                queue_id
            )));
        }
        queues.insert(
            queue_id.clone(),
            Mutex::new(PriorityQueue::new(QueueConfig::new(
                queue_id.clone(),
                queue_type,
                capacity,
            ))),
        );

        info!(queue_id = %queue_id, queue_type = %queue_type, capacity, "Queue created");
        Ok(())
    }

    pub fn queue_ids(&self) -> Vec<QueueId> {
        let mut ids: Vec<QueueId> = read(&self.queues).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Route a request to `queue_id`.
    ///
    /// A full queue is reported as `EnqueueOutcome::Rejected`, not as an error.
    pub fn enqueue(&self, queue_id: &str, request: Request) -> Result<EnqueueOutcome> {
        validate_id("request", &request.id)?;
        let now = self.time_provider.now_millis();
        let outcome = self.with_queue(queue_id, |q| q.enqueue(request, now))??;
        Ok(outcome)
    }

    pub fn queue_stats(&self, queue_id: &str) -> Result<QueueStats> {
        let now = self.time_provider.now_millis();
        self.with_queue(queue_id, |q| q.stats(now))
    }

    // ------------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------------

    /// Register a worker on `queue_id`, creating the queue with default
    /// settings if it does not exist yet.
    pub fn add_worker(
        &self,
        worker_id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        max_concurrent: u32,
        queue_id: impl Into<String>,
    ) -> Result<WorkerInfo> {
        let worker_id = worker_id.into();
        let queue_id = queue_id.into();
        validate_id("worker", &worker_id)?;
        validate_id("queue", &queue_id)?;
        if max_concurrent == 0 {
            return Err(AppError::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        let now = self.time_provider.now_millis();
        let mut registry = lock(&self.registry);
        registry.ensure_can_register(&worker_id)?;
        self.ensure_queue(&queue_id);

        let worker = WorkerInfo::new(worker_id, provider, model, max_concurrent, now);
        registry.register(worker.clone(), queue_id)?;
        Ok(worker)
    }

    /// Deregister a worker. Refused while it has requests in flight.
    pub fn remove_worker(&self, worker_id: &str) -> Result<WorkerInfo> {
        let mut registry = lock(&self.registry);
        match registry.deregister(worker_id) {
            Ok(worker) => Ok(worker),
            Err(err) => {
                warn!(worker_id = %worker_id, error = %err, "Worker removal refused");
                Err(err)
            }
        }
    }

    pub fn worker(&self, worker_id: &str) -> Option<WorkerInfo> {
        lock(&self.registry).get(worker_id).cloned()
    }

    pub fn workers(&self) -> Vec<WorkerInfo> {
        let mut workers: Vec<WorkerInfo> = lock(&self.registry).iter().cloned().collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        workers
    }

    /// External status signal (Error, Maintenance, back to Idle, ...).
    ///
    /// `Busy` is derived from load and cannot be set; asking for `Idle` on a
    /// loaded worker yields `Busy`.
    pub fn set_worker_status(&self, worker_id: &str, status: WorkerStatus) -> Result<WorkerInfo> {
        if status == WorkerStatus::Busy {
            return Err(AppError::Validation(
                "BUSY is derived from load and cannot be set".to_string(),
            ));
        }

        let mut registry = lock(&self.registry);
        let worker = registry
            .get_mut(worker_id)
            .ok_or_else(|| worker_not_found(worker_id))?;

        let previous = worker.status;
        worker.status = match status {
            WorkerStatus::Idle if worker.current_load > 0 => WorkerStatus::Busy,
            other => other,
        };
        info!(
            worker_id = %worker_id,
            from = %previous,
            to = %worker.status,
            "Worker status changed"
        );
        Ok(worker.clone())
    }

    /// Undo a scale-down selection the provisioner could not act on
    pub fn cancel_retirement(&self, worker_id: &str) -> Result<()> {
        let mut registry = lock(&self.registry);
        let worker = registry
            .get_mut(worker_id)
            .ok_or_else(|| worker_not_found(worker_id))?;
        if worker.status == WorkerStatus::Stopping {
            worker.status = if worker.current_load > 0 {
                WorkerStatus::Busy
            } else {
                WorkerStatus::Idle
            };
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Hand the next request of the worker's queue to the worker.
    ///
    /// `Ok(None)` when the queue is empty or the worker has no headroom, is
    /// unhealthy, or is not accepting work.
    pub fn next_request(&self, worker_id: &str) -> Result<Option<Request>> {
        let now = self.time_provider.now_millis();
        let mut registry = lock(&self.registry);
        self.next_request_locked(&mut registry, worker_id, now)
    }

    /// Finish a request previously handed to `worker_id`.
    ///
    /// Returns `Ok(false)` (and changes nothing) when the request is not in
    /// flight on that worker, so duplicate completions are harmless.
    /// `processing_time_ms` defaults to completed_at - started_at.
    pub fn complete(
        &self,
        worker_id: &str,
        request_id: &str,
        success: bool,
        processing_time_ms: Option<f64>,
    ) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let mut registry = lock(&self.registry);

        let queue_id = registry
            .queue_of(worker_id)
            .cloned()
            .ok_or_else(|| worker_not_found(worker_id))?;

        if registry.owner_of(&queue_id, request_id).map(String::as_str) != Some(worker_id) {
            debug!(
                worker_id = %worker_id,
                request_id = %request_id,
                "Completion ignored: request not in flight on this worker"
            );
            return Ok(false);
        }

        let finished = self.with_queue(&queue_id, |q| q.complete(request_id, success, now))??;
        registry.untrack(&queue_id, request_id);
        let Some(request) = finished else {
            return Ok(false);
        };

        let sample = processing_time_ms
            .unwrap_or_else(|| request.processing_time_ms().unwrap_or_default() as f64)
            .max(0.0);
        if let Some(worker) = registry.get_mut(worker_id) {
            worker.record_completion(success, sample, now, self.config.max_errors);
            debug!(
                worker_id = %worker_id,
                request_id = %request_id,
                success,
                load = worker.current_load,
                health = worker.health_score,
                "Request completed"
            );
        }
        Ok(true)
    }

    /// Pick an available worker on `queue_id` with the configured strategy
    pub fn select_worker(&self, queue_id: &str) -> Result<Option<WorkerId>> {
        let registry = lock(&self.registry);
        if !read(&self.queues).contains_key(queue_id) {
            return Err(queue_not_found(queue_id));
        }
        Ok(self.select_locked(&registry, queue_id))
    }

    /// Push-style scheduling: select a worker and hand it the next request of
    /// `queue_id` in one step.
    pub fn dispatch(&self, queue_id: &str) -> Result<Option<(WorkerId, Request)>> {
        let now = self.time_provider.now_millis();
        let mut registry = lock(&self.registry);

        if self.with_queue(queue_id, |q| q.pending_len())? == 0 {
            return Ok(None);
        }
        let Some(worker_id) = self.select_locked(&registry, queue_id) else {
            debug!(queue_id = %queue_id, "No available worker for dispatch");
            return Ok(None);
        };

        let request = self.next_request_locked(&mut registry, &worker_id, now)?;
        Ok(request.map(|r| (worker_id, r)))
    }

    // ------------------------------------------------------------------
    // Autoscaling and housekeeping
    // ------------------------------------------------------------------

    /// Evaluate one autoscaling step.
    ///
    /// A worker chosen for retirement is moved to `Stopping` so it gets no new
    /// work while the provisioner tears it down.
    pub fn tick(&self) -> ScalingDecision {
        let mut registry = lock(&self.registry);

        let ctx = {
            let queues = read(&self.queues);
            let mut total_pending = 0;
            let mut busiest: Option<(&QueueId, usize)> = None;
            for (id, queue) in queues.iter() {
                let pending = lock(queue).pending_len();
                total_pending += pending;
                let deeper = match busiest {
                    None => pending > 0,
                    Some((best_id, best)) => pending > best || (pending == best && id < best_id),
                };
                if deeper {
                    busiest = Some((id, pending));
                }
            }
            ScalingContext {
                system_load: registry.system_load(),
                total_pending,
                worker_count: registry.len(),
                busiest_queue: busiest.map(|(id, _)| id.clone()),
            }
        };

        match self.policy.evaluate(&ctx) {
            ScalingAction::Hold => {
                debug!(
                    system_load = ctx.system_load,
                    pending = ctx.total_pending,
                    workers = ctx.worker_count,
                    "Autoscale: hold"
                );
                ScalingDecision::None
            }
            ScalingAction::ScaleUp { reason } => {
                info!(
                    queue_id = ?ctx.busiest_queue,
                    system_load = ctx.system_load,
                    pending = ctx.total_pending,
                    workers = ctx.worker_count,
                    reason = %reason,
                    "Autoscale: scale up"
                );
                ScalingDecision::ScaleUp {
                    queue_id: ctx.busiest_queue,
                    count: 1,
                    reason,
                }
            }
            ScalingAction::ScaleDown { reason } => {
                let Some(worker_id) = registry.retirement_candidate().map(|w| w.id.clone()) else {
                    debug!("Autoscale: scale down wanted but no idle worker");
                    return ScalingDecision::None;
                };
                if let Some(worker) = registry.get_mut(&worker_id) {
                    worker.status = WorkerStatus::Stopping;
                }
                info!(
                    worker_id = %worker_id,
                    system_load = ctx.system_load,
                    workers = ctx.worker_count,
                    reason = %reason,
                    "Autoscale: scale down"
                );
                ScalingDecision::ScaleDown { worker_id, reason }
            }
        }
    }

    /// Force-fail every request that has been processing for at least
    /// `max_processing`, releasing the owning worker's load.
    pub fn reap_stalled(&self, max_processing: Duration) -> Result<Vec<RequestId>> {
        let now = self.time_provider.now_millis();
        let window = i64::try_from(max_processing.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(window);

        let mut registry = lock(&self.registry);
        let queues = read(&self.queues);
        let mut reaped = Vec::new();

        for (queue_id, queue) in queues.iter() {
            let mut queue = lock(queue);
            for request_id in queue.stalled_since(cutoff) {
                let Some(request) = queue.complete(&request_id, false, now)? else {
                    continue;
                };
                let owner = registry.untrack(queue_id, &request_id);
                if let Some(worker) = owner.as_deref().and_then(|id| registry.get_mut(id)) {
                    let sample = request.processing_time_ms().unwrap_or_default() as f64;
                    worker.record_completion(false, sample, now, self.config.max_errors);
                }
                warn!(
                    queue_id = %queue_id,
                    request_id = %request_id,
                    worker_id = ?owner,
                    started_at = ?request.started_at,
                    "Stalled request force-failed"
                );
                reaped.push(request_id);
            }
        }
        Ok(reaped)
    }

    pub fn system_stats(&self) -> SystemStats {
        let now = self.time_provider.now_millis();
        let registry = lock(&self.registry);
        let queues = read(&self.queues);

        let mut stats = SystemStats {
            queue_count: queues.len(),
            worker_count: registry.len(),
            system_load: registry.system_load(),
            ..Default::default()
        };

        for queue in queues.values() {
            let queue = lock(queue);
            stats.total_pending += queue.pending_len();
            stats.total_processing += queue.processing_len();
            stats.total_completed += queue.completed();
            stats.total_failed += queue.failed();
            stats.total_queue_full_drops += queue.queue_full_drops();
            stats.throughput_per_sec += queue.metrics(now).throughput_per_sec;
        }

        let mut health_sum = 0.0;
        for worker in registry.iter() {
            *stats.workers_by_status.entry(worker.status).or_default() += 1;
            stats.total_capacity += worker.max_concurrent as u64;
            stats.total_load += worker.current_load as u64;
            health_sum += worker.health_score;
        }
        if stats.worker_count > 0 {
            stats.avg_health_score = health_sum / stats.worker_count as f64;
        }
        stats
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn next_request_locked(
        &self,
        registry: &mut WorkerRegistry,
        worker_id: &str,
        now: i64,
    ) -> Result<Option<Request>> {
        let worker = registry
            .get(worker_id)
            .ok_or_else(|| worker_not_found(worker_id))?;
        if !worker.is_available() {
            debug!(
                worker_id = %worker_id,
                status = %worker.status,
                load = worker.current_load,
                health = worker.health_score,
                "Worker not eligible for new work"
            );
            return Ok(None);
        }

        let queue_id = registry.queue_of(worker_id).cloned().ok_or_else(|| {
            AppError::Internal(format!("Worker {} has no queue assignment", worker_id))
        })?;

        let Some(request) = self.with_queue(&queue_id, |q| q.dequeue(now))?? else {
            return Ok(None);
        };

        registry.track(queue_id.clone(), request.id.clone(), worker_id.to_string());
        if let Some(worker) = registry.get_mut(worker_id) {
            worker.record_dequeue(now);
        }
        debug!(
            worker_id = %worker_id,
            queue_id = %queue_id,
            request_id = %request.id,
            priority = request.priority,
            "Request assigned"
        );
        Ok(Some(request))
    }

    fn select_locked(&self, registry: &WorkerRegistry, queue_id: &str) -> Option<WorkerId> {
        let candidates: Vec<&WorkerInfo> = registry
            .workers_for_queue(queue_id)
            .into_iter()
            .filter(|w| w.is_available())
            .collect();
        self.balancer.select(&candidates).map(|w| w.id.clone())
    }

    fn with_queue<T>(&self, queue_id: &str, f: impl FnOnce(&mut PriorityQueue) -> T) -> Result<T> {
        let queues = read(&self.queues);
        let queue = queues
            .get(queue_id)
            .ok_or_else(|| queue_not_found(queue_id))?;
        let mut guard = lock(queue);
        Ok(f(&mut guard))
    }

    fn ensure_queue(&self, queue_id: &str) {
        let mut queues = write(&self.queues);
        if queues.contains_key(queue_id) {
            return;
        }
        queues.insert(
            queue_id.to_string(),
            Mutex::new(PriorityQueue::new(QueueConfig::new(
                queue_id,
                self.config.default_queue_type,
                self.config.default_queue_capacity,
            ))),
        );
        info!(
            queue_id = %queue_id,
            queue_type = %self.config.default_queue_type,
            capacity = self.config.default_queue_capacity,
            "Queue created with defaults for worker assignment"
        );
    }
}

fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(AppError::Validation(format!("{} id cannot be empty", kind)));
    }
    Ok(())
}

fn queue_not_found(queue_id: &str) -> AppError {
    AppError::NotFound(format!("Queue {} not found", queue_id))
}

fn worker_not_found(worker_id: &str) -> AppError {
    AppError::NotFound(format!("Worker {} not found", worker_id))
}

// Poisoned locks are recovered: every critical section leaves the state consistent
// before anything that could panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
