// Application Layer - Queues, workers and the scheduling loop

pub mod autoscaler;
pub mod config;
pub mod constants;
pub mod load_balancer;
pub mod manager;
pub mod priority_queue;
pub mod worker_registry;

// Re-exports
pub use autoscaler::{Autoscaler, AutoscalerHandle, ScalingDecision};
pub use config::SchedulerConfig;
pub use load_balancer::{LoadBalanceStrategy, LoadBalancer};
pub use manager::{QueueManager, SystemStats};
pub use priority_queue::{EnqueueOutcome, PriorityQueue, QueueMetrics, QueueStats};
pub use worker_registry::WorkerRegistry;
