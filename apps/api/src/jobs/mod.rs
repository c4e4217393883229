//! Deferred jobs. A mutation enqueues a job once; the worker runs it once,
//! asynchronously, on its own Tokio task.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::{run_extract_job, run_patch_job, PipelineContext};

pub mod redis_queue;

pub use redis_queue::{run_worker, RedisJobQueue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    GeneratePatch { patch_id: Uuid },
    ExtractResume { resume_id: Uuid },
}

#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<()>;
}

/// Runs a single job to completion. Jobs record their own failures.
pub async fn dispatch(ctx: &PipelineContext, job: Job) {
    match job {
        Job::GeneratePatch { patch_id } => run_patch_job(ctx, patch_id).await,
        Job::ExtractResume { resume_id } => run_extract_job(ctx, resume_id).await,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingScheduler {
        pub jobs: Mutex<Vec<Job>>,
    }

    #[async_trait]
    impl JobScheduler for RecordingScheduler {
        async fn enqueue(&self, job: Job) -> Result<()> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }
}
