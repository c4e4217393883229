use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client as RedisClient;
use tracing::{debug, error, info, warn};

use crate::jobs::{dispatch, Job, JobScheduler};
use crate::pipeline::PipelineContext;

/// Seconds a worker blocks on an empty queue before polling again.
const POP_TIMEOUT_SECS: u64 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// A Redis list used as a FIFO job queue (`LPUSH` in, `BRPOP` out).
#[derive(Clone)]
pub struct RedisJobQueue {
    client: RedisClient,
    key: String,
}

impl RedisJobQueue {
    pub fn new(client: RedisClient, key: String) -> Self {
        Self { client, key }
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")
    }

    /// Waits up to `POP_TIMEOUT_SECS` for the next raw job payload.
    async fn pop(&self, conn: &mut MultiplexedConnection) -> Result<Option<String>> {
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(POP_TIMEOUT_SECS)
            .query_async(conn)
            .await?;
        Ok(popped.map(|(_, payload)| payload))
    }
}

#[async_trait]
impl JobScheduler for RedisJobQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        let payload = serde_json::to_string(&job)?;
        let mut conn = self.connection().await?;
        let depth: i64 = redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .context("Failed to enqueue job")?;
        debug!("Enqueued {payload} (queue depth {depth})");
        Ok(())
    }
}

/// Pops jobs forever, running each on its own task so independent jobs
/// proceed in parallel. Connection failures are retried after a short delay.
pub async fn run_worker(queue: RedisJobQueue, ctx: PipelineContext) {
    info!("Job worker listening on Redis list '{}'", queue.key);

    loop {
        let mut conn = match queue.connection().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("{e:#}; retrying in {}s", RECONNECT_DELAY.as_secs());
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        loop {
            let payload = match queue.pop(&mut conn).await {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Job queue read failed: {e:#}");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    break;
                }
            };

            let job: Job = match serde_json::from_str(&payload) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Dropping malformed job payload {payload:?}: {e}");
                    continue;
                }
            };

            debug!("Dispatching {job:?}");
            let ctx = ctx.clone();
            tokio::spawn(async move { dispatch(&ctx, job).await });
        }
    }
}
