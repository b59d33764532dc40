//! PriorityQueue - one logical queue of inference requests
//!
//! Pending requests live in five tier buckets (FIFO within each tier); dequeued
//! requests move to the `processing` map until completed. A request ID is in at
//! most one of those places at a time, and total pending never exceeds capacity.
//!
//! Metrics are derived from a bounded history log on read instead of being kept
//! as running sums.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::application::constants::{HISTORY_MAX_ENTRIES, METRICS_WINDOW, THROUGHPUT_WINDOW_MS};
use crate::domain::error::{DomainError, Result};
use crate::domain::{
    PriorityTier, QueueConfig, QueueId, QueueType, Request, RequestId, TIER_COUNT,
};

/// Result of an enqueue attempt
///
/// A full queue is backpressure, not an error: the request is handed back so
/// the caller can retry, drop or divert it.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    Accepted,
    Rejected(Request),
}

impl EnqueueOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EnqueueOutcome::Accepted)
    }
}

/// Rolling timing figures over the history window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub avg_wait_time_ms: f64,
    pub avg_processing_time_ms: f64,
    pub avg_total_time_ms: f64,
    /// Requests created in the trailing 60s, per second
    pub throughput_per_sec: f64,
}

/// Point-in-time snapshot of one queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue_id: QueueId,
    pub queue_type: QueueType,
    pub capacity: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: u64,
    pub failed: u64,
    pub total_enqueued: u64,
    pub queue_full_drops: u64,
    pub tier_distribution: BTreeMap<PriorityTier, usize>,
    pub metrics: QueueMetrics,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    request: Request,
}

pub struct PriorityQueue {
    config: QueueConfig,
    tiers: [VecDeque<Entry>; TIER_COUNT],
    pending_ids: HashSet<RequestId>,
    processing: HashMap<RequestId, Request>,
    history: VecDeque<Request>,
    // Absolute position of history[0], and each ID's newest position
    history_base: u64,
    history_index: HashMap<RequestId, u64>,
    next_seq: u64,

    completed: u64,
    failed: u64,
    total_enqueued: u64,
    queue_full_drops: u64,

    rng: StdRng,
}

impl PriorityQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic sampling for the weighted discipline
    pub fn with_seed(config: QueueConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: QueueConfig, rng: StdRng) -> Self {
        Self {
            config,
            tiers: Default::default(),
            pending_ids: HashSet::new(),
            processing: HashMap::new(),
            history: VecDeque::new(),
            history_base: 0,
            history_index: HashMap::new(),
            next_seq: 0,
            completed: 0,
            failed: 0,
            total_enqueued: 0,
            queue_full_drops: 0,
            rng,
        }
    }

    pub fn id(&self) -> &QueueId {
        &self.config.id
    }

    pub fn queue_type(&self) -> QueueType {
        self.config.queue_type
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn pending_len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }

    pub fn processing_len(&self) -> usize {
        self.processing.len()
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn queue_full_drops(&self) -> u64 {
        self.queue_full_drops
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_processing(&self, request_id: &str) -> bool {
        self.processing.contains_key(request_id)
    }

    pub fn tier_distribution(&self) -> BTreeMap<PriorityTier, usize> {
        PriorityTier::DESCENDING
            .iter()
            .map(|tier| (*tier, self.tiers[tier.index()].len()))
            .collect()
    }

    /// Add a request to the tail of its tier.
    ///
    /// Fails only if the ID is already pending or in flight here.
    pub fn enqueue(&mut self, mut request: Request, now_millis: i64) -> Result<EnqueueOutcome> {
        if self.pending_ids.contains(&request.id) || self.processing.contains_key(&request.id) {
            return Err(DomainError::DuplicateRequest(request.id));
        }

        if self.pending_len() >= self.config.capacity {
            self.queue_full_drops += 1;
            warn!(
                queue_id = %self.config.id,
                request_id = %request.id,
                capacity = self.config.capacity,
                drops = self.queue_full_drops,
                "Queue full, rejecting request"
            );
            return Ok(EnqueueOutcome::Rejected(request));
        }

        request.mark_pending(now_millis);
        let tier = request.tier();

        self.push_history(request.clone());

        self.pending_ids.insert(request.id.clone());
        let seq = self.next_seq;
        self.next_seq += 1;

        debug!(
            queue_id = %self.config.id,
            request_id = %request.id,
            tier = %tier,
            "Request enqueued"
        );
        self.tiers[tier.index()].push_back(Entry { seq, request });
        self.total_enqueued += 1;

        Ok(EnqueueOutcome::Accepted)
    }

    /// Take the next request according to the queue's discipline.
    ///
    /// `Ok(None)` when nothing is pending.
    pub fn dequeue(&mut self, now_millis: i64) -> Result<Option<Request>> {
        let Some(slot) = self.select_tier() else {
            return Ok(None);
        };
        let Some(Entry { request, .. }) = self.tiers[slot].pop_front() else {
            return Ok(None);
        };

        let mut request = request;
        self.pending_ids.remove(&request.id);
        request.start(now_millis)?;

        self.record_in_history(&request);
        self.processing.insert(request.id.clone(), request.clone());

        debug!(
            queue_id = %self.config.id,
            request_id = %request.id,
            wait_ms = request.wait_time_ms().unwrap_or_default(),
            "Request dequeued"
        );
        Ok(Some(request))
    }

    /// Finish an in-flight request.
    ///
    /// Unknown or already completed IDs are ignored (`Ok(None)`) so duplicate
    /// completion signals are harmless.
    pub fn complete(
        &mut self,
        request_id: &str,
        success: bool,
        now_millis: i64,
    ) -> Result<Option<Request>> {
        let Some(mut request) = self.processing.remove(request_id) else {
            debug!(
                queue_id = %self.config.id,
                request_id = %request_id,
                "Completion for unknown request ignored"
            );
            return Ok(None);
        };

        request.finish(now_millis, success)?;
        if success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        self.record_in_history(&request);

        Ok(Some(request))
    }

    /// In-flight requests started at or before `cutoff_millis`
    pub fn stalled_since(&self, cutoff_millis: i64) -> Vec<RequestId> {
        let mut stalled: Vec<(&RequestId, i64)> = self
            .processing
            .values()
            .filter_map(|r| r.started_at.map(|started| (&r.id, started)))
            .filter(|(_, started)| *started <= cutoff_millis)
            .collect();
        stalled.sort_by_key(|(_, started)| *started);
        stalled.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Recompute rolling metrics from the history log
    pub fn metrics(&self, now_millis: i64) -> QueueMetrics {
        let finished: Vec<&Request> = self
            .history
            .iter()
            .filter(|r| r.status.is_terminal())
            .collect();
        let window = &finished[finished.len().saturating_sub(METRICS_WINDOW)..];

        let average = |f: fn(&Request) -> Option<i64>| -> f64 {
            let samples: Vec<i64> = window.iter().filter_map(|r| f(r)).collect();
            if samples.is_empty() {
                return 0.0;
            }
            samples.iter().sum::<i64>() as f64 / samples.len() as f64
        };

        let horizon = now_millis - THROUGHPUT_WINDOW_MS;
        let recent = self
            .history
            .iter()
            .filter(|r| r.created_at >= horizon)
            .count();

        QueueMetrics {
            avg_wait_time_ms: average(Request::wait_time_ms),
            avg_processing_time_ms: average(Request::processing_time_ms),
            avg_total_time_ms: average(Request::total_time_ms),
            throughput_per_sec: recent as f64 / (THROUGHPUT_WINDOW_MS as f64 / 1000.0),
        }
    }

    pub fn stats(&self, now_millis: i64) -> QueueStats {
        QueueStats {
            queue_id: self.config.id.clone(),
            queue_type: self.config.queue_type,
            capacity: self.config.capacity,
            pending: self.pending_len(),
            processing: self.processing.len(),
            completed: self.completed,
            failed: self.failed,
            total_enqueued: self.total_enqueued,
            queue_full_drops: self.queue_full_drops,
            tier_distribution: self.tier_distribution(),
            metrics: self.metrics(now_millis),
        }
    }

    fn select_tier(&mut self) -> Option<usize> {
        match self.config.queue_type {
            QueueType::Priority => self.tiers.iter().position(|t| !t.is_empty()),
            QueueType::Fifo => self
                .tiers
                .iter()
                .enumerate()
                .filter_map(|(i, t)| t.front().map(|e| (i, e.seq)))
                .min_by_key(|(_, seq)| *seq)
                .map(|(i, _)| i),
            QueueType::Weighted => {
                let weights: Vec<u64> = PriorityTier::DESCENDING
                    .iter()
                    .map(|tier| tier.weight() * self.tiers[tier.index()].len() as u64)
                    .collect();
                let total: u64 = weights.iter().sum();
                if total == 0 {
                    return None;
                }
                let mut roll = self.rng.gen_range(0..total);
                for (i, weight) in weights.iter().enumerate() {
                    if roll < *weight {
                        return Some(i);
                    }
                    roll -= weight;
                }
                self.tiers.iter().position(|t| !t.is_empty())
            }
        }
    }

    /// Replace the history snapshot of `request`; appended when its
    /// enqueue entry has already been trimmed
    fn record_in_history(&mut self, request: &Request) {
        match self.history_index.get(&request.id).copied() {
            Some(pos) if pos >= self.history_base => {
                if let Some(slot) = self.history.get_mut((pos - self.history_base) as usize) {
                    *slot = request.clone();
                }
            }
            _ => self.push_history(request.clone()),
        }
    }

    fn push_history(&mut self, request: Request) {
        let pos = self.history_base + self.history.len() as u64;
        self.history_index.insert(request.id.clone(), pos);
        self.history.push_back(request);
        self.trim_history();
    }

    fn trim_history(&mut self) {
        if self.history.len() <= HISTORY_MAX_ENTRIES {
            return;
        }
        let excess = self.history.len() - HISTORY_MAX_ENTRIES / 2;
        for (offset, request) in self.history.drain(..excess).enumerate() {
            let pos = self.history_base + offset as u64;
            if self.history_index.get(&request.id) == Some(&pos) {
                self.history_index.remove(&request.id);
            }
        }
        self.history_base += excess as u64;
    }
}
