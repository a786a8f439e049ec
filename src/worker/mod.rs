// Queue consumer runtime
//
// Delivery is at-least-once: tasks move from the pending list to a
// per-consumer active list (LMOVE), are acked with LREM after the handler
// returns Ok, and are rescheduled through a retry ZSET with exponential
// backoff on error. Anything left in the active list from a previous crash
// is pushed back to pending on startup.

pub mod handler;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use crate::db::RedisPool;
use crate::services::queue::{Lane, QueueError, TaskEnvelope};

/// Idle sleep when every lane comes up empty
const EMPTY_POLL_SLEEP: Duration = Duration::from_millis(500);

/// Base retry delay; doubles per attempt
const RETRY_BASE: Duration = Duration::from_secs(30);

/// Retry delay ceiling
const RETRY_CAP: Duration = Duration::from_secs(900);

/// Tasks that exhausted their retries land here for inspection
const DEAD_KEY: &str = "queue:dead";

/// How many due retries are promoted per poll cycle and lane
const PROMOTE_BATCH: isize = 50;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A registered consumer of one task type
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    /// Names this consumer's active lists; stable across restarts so crash
    /// recovery can find them
    pub consumer_id: String,
}

pub struct QueueWorker {
    redis: RedisPool,
    config: WorkerConfig,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl QueueWorker {
    pub fn new(redis: RedisPool, config: WorkerConfig) -> Self {
        Self {
            redis,
            config,
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, task_type: &str, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(task_type.to_string(), handler);
    }

    /// Run until the shutdown signal flips. In-flight handlers finish;
    /// new dequeues stop immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        let mut conn = self.redis.connection();
        self.recover_active(&mut conn).await?;

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let schedule = weighted_schedule();
        let mut cursor = 0usize;

        info!(
            concurrency = self.config.concurrency,
            consumer_id = %self.config.consumer_id,
            "Worker started, listening for tasks"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if cursor == 0 {
                if let Err(e) = self.promote_due_retries(&mut conn).await {
                    warn!(error = %e, "Failed to promote retries");
                }
            }

            // Hold a permit before popping so a dequeued task always has a
            // slot to run in
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => {
                    permit.expect("semaphore closed")
                }
                _ = shutdown.changed() => continue,
            };

            let lane = schedule[cursor];
            cursor = (cursor + 1) % schedule.len();

            match self.pop(&mut conn, lane).await {
                Ok(Some(raw)) => {
                    let worker = WorkerContext {
                        redis: self.redis.clone(),
                        handlers: self.handlers.clone(),
                        max_retries: self.config.max_retries,
                        consumer_id: self.config.consumer_id.clone(),
                    };
                    tokio::spawn(async move {
                        worker.process(lane, raw).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    // Only sleep after a full fruitless sweep of the schedule
                    if cursor == 0 {
                        tokio::select! {
                            _ = tokio::time::sleep(EMPTY_POLL_SLEEP) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!(error = %e, "Dequeue failed");
                    tokio::select! {
                        _ = tokio::time::sleep(EMPTY_POLL_SLEEP) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!("Worker draining in-flight tasks");
        let _ = semaphore
            .acquire_many(self.config.concurrency as u32)
            .await;
        info!("Worker stopped");
        Ok(())
    }

    /// Atomically move one task from pending to this consumer's active list
    async fn pop(
        &self,
        conn: &mut ConnectionManager,
        lane: Lane,
    ) -> Result<Option<String>, QueueError> {
        let raw: Option<String> = redis::cmd("LMOVE")
            .arg(lane.pending_key())
            .arg(lane.active_key(&self.config.consumer_id))
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(conn)
            .await?;
        Ok(raw)
    }

    /// Crash recovery: push any orphaned active tasks back to pending
    async fn recover_active(&self, conn: &mut ConnectionManager) -> Result<(), QueueError> {
        for lane in Lane::ALL {
            let active = lane.active_key(&self.config.consumer_id);
            let mut recovered = 0usize;

            loop {
                let raw: Option<String> = redis::cmd("LMOVE")
                    .arg(&active)
                    .arg(lane.pending_key())
                    .arg("RIGHT")
                    .arg("LEFT")
                    .query_async(conn)
                    .await?;
                if raw.is_none() {
                    break;
                }
                recovered += 1;
            }

            if recovered > 0 {
                warn!(
                    lane = lane.as_str(),
                    recovered, "Re-queued tasks left over from a previous run"
                );
            }
        }
        Ok(())
    }

    /// Move due retry entries back onto their pending lists
    async fn promote_due_retries(&self, conn: &mut ConnectionManager) -> Result<(), QueueError> {
        let now_ms = chrono::Utc::now().timestamp_millis();

        for lane in Lane::ALL {
            let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
                .arg(lane.retry_key())
                .arg("-inf")
                .arg(now_ms)
                .arg("LIMIT")
                .arg(0)
                .arg(PROMOTE_BATCH)
                .query_async(conn)
                .await?;

            for raw in due {
                conn.lpush::<_, _, ()>(lane.pending_key(), &raw).await?;
                conn.zrem::<_, _, ()>(lane.retry_key(), &raw).await?;
                debug!(lane = lane.as_str(), "Promoted retry task");
            }
        }
        Ok(())
    }
}

/// Per-task processing context, cheap to clone into spawned tasks
struct WorkerContext {
    redis: RedisPool,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    max_retries: u32,
    consumer_id: String,
}

impl WorkerContext {
    async fn process(&self, lane: Lane, raw: String) {
        let mut conn = self.redis.connection();

        let envelope: TaskEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Dropping undecodable task");
                self.ack(&mut conn, lane, &raw).await;
                return;
            }
        };

        let Some(handler) = self.handlers.get(&envelope.task_type) else {
            error!(task_type = %envelope.task_type, "No handler registered, dropping task");
            self.ack(&mut conn, lane, &raw).await;
            return;
        };

        debug!(task_id = %envelope.id, lane = lane.as_str(), "Processing task");

        match handler.handle(&envelope).await {
            Ok(()) => {
                self.ack(&mut conn, lane, &raw).await;
            }
            Err(e) => {
                warn!(task_id = %envelope.id, error = %e, "Task handler failed");
                // Retry entry goes in before the ack so a crash between the
                // two duplicates the task instead of losing it
                self.schedule_retry(&mut conn, lane, envelope).await;
                self.ack(&mut conn, lane, &raw).await;
            }
        }
    }

    async fn ack(&self, conn: &mut ConnectionManager, lane: Lane, raw: &str) {
        if let Err(e) = conn
            .lrem::<_, _, ()>(lane.active_key(&self.consumer_id), 1, raw)
            .await
        {
            error!(error = %e, "Failed to ack task");
        }
    }

    async fn schedule_retry(
        &self,
        conn: &mut ConnectionManager,
        lane: Lane,
        mut envelope: TaskEnvelope,
    ) {
        envelope.retry_count += 1;

        let Ok(raw) = serde_json::to_string(&envelope) else {
            return;
        };

        if envelope.retry_count > self.max_retries {
            error!(
                task_id = %envelope.id,
                retries = envelope.retry_count - 1,
                "Task exhausted retries, moving to dead queue"
            );
            if let Err(e) = conn.lpush::<_, _, ()>(DEAD_KEY, &raw).await {
                error!(error = %e, "Failed to move task to dead queue");
            }
            return;
        }

        let delay = retry_backoff(envelope.retry_count);
        let ready_at = chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64;

        info!(
            task_id = %envelope.id,
            retry = envelope.retry_count,
            delay_secs = delay.as_secs(),
            "Scheduling task retry"
        );
        if let Err(e) = conn
            .zadd::<_, _, _, ()>(lane.retry_key(), &raw, ready_at)
            .await
        {
            error!(error = %e, "Failed to schedule retry");
        }
    }
}

/// Flattened lane schedule: each lane appears weight-many times, giving the
/// soft priority ordering without starving any lane.
pub fn weighted_schedule() -> Vec<Lane> {
    let mut schedule = Vec::new();
    for lane in Lane::ALL {
        for _ in 0..lane.weight() {
            schedule.push(lane);
        }
    }
    schedule
}

/// Exponential backoff: 30s doubling per attempt, capped at 15 minutes
pub fn retry_backoff(retry_count: u32) -> Duration {
    let factor = 2u64.saturating_pow(retry_count.saturating_sub(1));
    RETRY_BASE.saturating_mul(factor as u32).min(RETRY_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_reflects_weights() {
        let schedule = weighted_schedule();
        assert_eq!(schedule.len(), 18);
        assert_eq!(schedule.iter().filter(|l| **l == Lane::Fast).count(), 10);
        assert_eq!(schedule.iter().filter(|l| **l == Lane::Learn).count(), 5);
        assert_eq!(schedule.iter().filter(|l| **l == Lane::Default).count(), 3);
        // Fast lane leads the cycle
        assert_eq!(schedule[0], Lane::Fast);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(1), Duration::from_secs(30));
        assert_eq!(retry_backoff(2), Duration::from_secs(60));
        assert_eq!(retry_backoff(3), Duration::from_secs(120));
        assert_eq!(retry_backoff(6), Duration::from_secs(900));
        assert_eq!(retry_backoff(20), Duration::from_secs(900));
    }
}
