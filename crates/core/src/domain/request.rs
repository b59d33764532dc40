// Request Domain Model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::error::{DomainError, Result};

/// Request ID (caller-supplied or UUID v4)
pub type RequestId = String;

/// Priority (0..=10, higher number = more urgent)
///
/// Values outside the range are not rejected; tier mapping clamps them.
pub type Priority = i32;

/// Request lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Completed and Failed are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::Processing => write!(f, "PROCESSING"),
            RequestStatus::Completed => write!(f, "COMPLETED"),
            RequestStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Priority band a request is scheduled in.
///
/// Derived from the numeric priority every time it is needed; never stored on
/// the request, so the boundaries below are the only definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityTier {
    Background,
    Low,
    Medium,
    High,
    Critical,
}

/// Number of tiers
pub const TIER_COUNT: usize = 5;

impl PriorityTier {
    /// Tiers in dequeue order (most urgent first)
    pub const DESCENDING: [PriorityTier; TIER_COUNT] = [
        PriorityTier::Critical,
        PriorityTier::High,
        PriorityTier::Medium,
        PriorityTier::Low,
        PriorityTier::Background,
    ];

    pub fn from_priority(priority: Priority) -> Self {
        match priority {
            p if p >= 9 => PriorityTier::Critical,
            7..=8 => PriorityTier::High,
            5..=6 => PriorityTier::Medium,
            3..=4 => PriorityTier::Low,
            _ => PriorityTier::Background,
        }
    }

    /// Position in `DESCENDING` (0 = Critical)
    pub fn index(self) -> usize {
        match self {
            PriorityTier::Critical => 0,
            PriorityTier::High => 1,
            PriorityTier::Medium => 2,
            PriorityTier::Low => 3,
            PriorityTier::Background => 4,
        }
    }

    /// Static sampling weight used by the weighted dequeue discipline
    pub fn weight(self) -> u64 {
        match self {
            PriorityTier::Critical => 16,
            PriorityTier::High => 8,
            PriorityTier::Medium => 4,
            PriorityTier::Low => 2,
            PriorityTier::Background => 1,
        }
    }
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityTier::Critical => write!(f, "CRITICAL"),
            PriorityTier::High => write!(f, "HIGH"),
            PriorityTier::Medium => write!(f, "MEDIUM"),
            PriorityTier::Low => write!(f, "LOW"),
            PriorityTier::Background => write!(f, "BACKGROUND"),
        }
    }
}

/// One unit of queued inference work.
///
/// The scheduler never looks inside `payload`; `tags` is the caller's open
/// extension map. Status and timestamps are only changed by the owning queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub priority: Priority,
    pub status: RequestStatus,

    pub created_at: i64, // epoch ms, stamped at enqueue
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,

    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Request {
    /// Create a pending request. `created_at` is stamped when it is enqueued.
    pub fn new(id: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            priority,
            status: RequestStatus::Pending,
            created_at: 0,
            started_at: None,
            completed_at: None,
            payload: serde_json::Value::Null,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tier(&self) -> PriorityTier {
        PriorityTier::from_priority(self.priority)
    }

    /// Reset to a fresh Pending state at enqueue time
    pub fn mark_pending(&mut self, now_millis: i64) {
        self.status = RequestStatus::Pending;
        self.created_at = now_millis;
        self.started_at = None;
        self.completed_at = None;
    }

    /// Transition Pending -> Processing
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.status != RequestStatus::Pending || self.started_at.is_some() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: RequestStatus::Processing.to_string(),
            });
        }
        self.status = RequestStatus::Processing;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition Processing -> Completed | Failed
    pub fn finish(&mut self, now_millis: i64, success: bool) -> Result<()> {
        let target = if success {
            RequestStatus::Completed
        } else {
            RequestStatus::Failed
        };
        if self.status != RequestStatus::Processing || self.completed_at.is_some() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.completed_at = Some(now_millis);
        Ok(())
    }

    /// started_at - created_at
    pub fn wait_time_ms(&self) -> Option<i64> {
        self.started_at.map(|started| started - self.created_at)
    }

    /// completed_at - started_at
    pub fn processing_time_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }

    /// completed_at - created_at
    pub fn total_time_ms(&self) -> Option<i64> {
        self.completed_at.map(|completed| completed - self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(PriorityTier::from_priority(10), PriorityTier::Critical);
        assert_eq!(PriorityTier::from_priority(9), PriorityTier::Critical);
        assert_eq!(PriorityTier::from_priority(8), PriorityTier::High);
        assert_eq!(PriorityTier::from_priority(7), PriorityTier::High);
        assert_eq!(PriorityTier::from_priority(6), PriorityTier::Medium);
        assert_eq!(PriorityTier::from_priority(5), PriorityTier::Medium);
        assert_eq!(PriorityTier::from_priority(4), PriorityTier::Low);
        assert_eq!(PriorityTier::from_priority(3), PriorityTier::Low);
        assert_eq!(PriorityTier::from_priority(2), PriorityTier::Background);
        assert_eq!(PriorityTier::from_priority(0), PriorityTier::Background);
    }

    #[test]
    fn test_out_of_range_priority_is_clamped() {
        assert_eq!(PriorityTier::from_priority(250), PriorityTier::Critical);
        assert_eq!(PriorityTier::from_priority(-3), PriorityTier::Background);
    }

    #[test]
    fn test_descending_matches_index() {
        for (i, tier) in PriorityTier::DESCENDING.iter().enumerate() {
            assert_eq!(tier.index(), i);
        }
        assert!(PriorityTier::Critical > PriorityTier::Background);
    }

    #[test]
    fn test_request_lifecycle() {
        let mut request = Request::new("req-1", 7);
        request.mark_pending(1_000);
        assert_eq!(request.status, RequestStatus::Pending);

        request.start(1_500).unwrap();
        assert_eq!(request.status, RequestStatus::Processing);
        assert_eq!(request.wait_time_ms(), Some(500));

        request.finish(2_500, true).unwrap();
        assert_eq!(request.status, RequestStatus::Completed);
        assert_eq!(request.processing_time_ms(), Some(1_000));
        assert_eq!(request.total_time_ms(), Some(1_500));
    }

    #[test]
    fn test_started_at_set_only_once() {
        let mut request = Request::new("req-2", 5);
        request.mark_pending(0);
        request.start(10).unwrap();
        assert!(request.start(20).is_err());
        assert_eq!(request.started_at, Some(10));
    }

    #[test]
    fn test_finish_requires_processing() {
        let mut request = Request::new("req-3", 5);
        request.mark_pending(0);
        assert!(request.finish(10, false).is_err());
        assert!(request.completed_at.is_none());

        request.start(10).unwrap();
        request.finish(20, false).unwrap();
        assert_eq!(request.status, RequestStatus::Failed);
        assert!(request.finish(30, true).is_err());
        assert_eq!(request.completed_at, Some(20));
    }
}
