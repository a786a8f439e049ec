// Task queue: Redis-list backed lanes with durable enqueue
// The consumer side (weighted dequeue, retry, recovery) lives in crate::worker

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::RedisPool;

/// Task type for extraction jobs; the payload is the serialized Job row
pub const TASK_EXTRACTION_JOB: &str = "extraction:job";

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Queue lanes. Fast serves domains with a known recipe, learn feeds the
/// recipe-discovery worker, default is the fallback lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Fast,
    Learn,
    Default,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Fast, Lane::Learn, Lane::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Fast => "fast",
            Lane::Learn => "learn",
            Lane::Default => "default",
        }
    }

    /// Relative dequeue weight. Soft priority only.
    pub fn weight(&self) -> usize {
        match self {
            Lane::Fast => 10,
            Lane::Learn => 5,
            Lane::Default => 3,
        }
    }

    pub fn pending_key(&self) -> String {
        format!("queue:{}", self.as_str())
    }

    pub fn retry_key(&self) -> String {
        format!("queue:{}:retry", self.as_str())
    }

    pub fn active_key(&self, consumer: &str) -> String {
        format!("queue:{}:active:{}", self.as_str(), consumer)
    }
}

/// Serialized unit of queued work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub task_type: String,
    pub retry_count: u32,
    pub payload: serde_json::Value,
}

/// Producer handle for the task queue
pub struct TaskQueue {
    redis: RedisPool,
}

impl TaskQueue {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }

    /// Durably enqueue a task: the call returns only after Redis has
    /// acknowledged the push. Fails closed on any Redis error.
    #[instrument(skip(self, payload), fields(lane = lane.as_str()))]
    pub async fn enqueue(
        &self,
        task_type: &str,
        payload: serde_json::Value,
        lane: Lane,
    ) -> Result<Uuid, QueueError> {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            task_type: task_type.to_string(),
            retry_count: 0,
            payload,
        };

        let body = serde_json::to_string(&envelope)?;
        let mut conn = self.redis.connection();
        conn.lpush::<_, _, ()>(lane.pending_key(), &body).await?;

        debug!(task_id = %envelope.id, lane = lane.as_str(), "Task enqueued");
        Ok(envelope.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_keys() {
        assert_eq!(Lane::Fast.pending_key(), "queue:fast");
        assert_eq!(Lane::Learn.retry_key(), "queue:learn:retry");
        assert_eq!(Lane::Default.active_key("w1"), "queue:default:active:w1");
    }

    #[test]
    fn lane_weights() {
        assert_eq!(Lane::Fast.weight(), 10);
        assert_eq!(Lane::Learn.weight(), 5);
        assert_eq!(Lane::Default.weight(), 3);
    }

    #[test]
    fn envelope_roundtrip() {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            task_type: TASK_EXTRACTION_JOB.to_string(),
            retry_count: 2,
            payload: serde_json::json!({"url": "https://example.com"}),
        };

        let body = serde_json::to_string(&envelope).unwrap();
        let parsed: TaskEnvelope = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.id, envelope.id);
        assert_eq!(parsed.task_type, "extraction:job");
        assert_eq!(parsed.retry_count, 2);
        assert_eq!(parsed.payload["url"], "https://example.com");
    }
}
