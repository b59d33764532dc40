//! Shared fixtures for the cross-crate tests

use std::sync::Arc;

use infergate_core::application::{QueueManager, SchedulerConfig};
use infergate_core::port::id_provider::mocks::SequentialIdProvider;
use infergate_core::port::time_provider::mocks::MockTimeProvider;

/// Manager on a hand-driven clock with `req-N` request IDs
pub fn manager_with_clock(
    config: SchedulerConfig,
    start_ms: i64,
) -> (Arc<QueueManager>, Arc<MockTimeProvider>) {
    let clock = Arc::new(MockTimeProvider::new(start_ms));
    let manager = QueueManager::new(
        config,
        clock.clone(),
        Arc::new(SequentialIdProvider::new("req")),
    );
    (Arc::new(manager), clock)
}
