// Queue Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Queue identifier
pub type QueueId = String;

/// Dequeue discipline, fixed when the queue is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueType {
    /// Highest non-empty tier first, FIFO within a tier
    #[default]
    Priority,
    /// Globally oldest pending request regardless of tier
    Fifo,
    /// Tier sampled proportionally to its static weight times its depth
    Weighted,
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueType::Priority => write!(f, "priority"),
            QueueType::Fifo => write!(f, "fifo"),
            QueueType::Weighted => write!(f, "weighted"),
        }
    }
}

impl FromStr for QueueType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(QueueType::Priority),
            "fifo" => Ok(QueueType::Fifo),
            "weighted" => Ok(QueueType::Weighted),
            other => Err(DomainError::UnknownQueueType(other.to_string())),
        }
    }
}

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub id: QueueId,
    pub queue_type: QueueType,
    /// Maximum pending requests across all tiers
    pub capacity: usize,
}

impl QueueConfig {
    pub fn new(id: impl Into<String>, queue_type: QueueType, capacity: usize) -> Self {
        Self {
            id: id.into(),
            queue_type,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_type_parse() {
        assert_eq!("FIFO".parse::<QueueType>().unwrap(), QueueType::Fifo);
        assert_eq!(" weighted ".parse::<QueueType>().unwrap(), QueueType::Weighted);
        assert!(matches!(
            "lifo".parse::<QueueType>(),
            Err(DomainError::UnknownQueueType(_))
        ));
    }

    #[test]
    fn test_queue_type_default_is_priority() {
        assert_eq!(QueueType::default(), QueueType::Priority);
    }
}
