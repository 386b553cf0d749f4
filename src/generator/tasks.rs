//! Bounded execution of blocking per-region work.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use tracing::debug;

/// Runs blocking jobs on the tokio blocking pool, at most `max_tasks` at a time.
#[derive(Debug, Clone)]
pub struct TaskLimiter {
    semaphore: Arc<Semaphore>,
    max_tasks: usize,
    cooldown: Option<Duration>,
}

impl TaskLimiter {
    pub const DEFAULT_MAX_TASKS: usize = 6;

    pub fn new(max_tasks: usize) -> Self {
        let max_tasks = max_tasks.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_tasks)),
            max_tasks,
            cooldown: None,
        }
    }

    /// Keep a slot busy for `cooldown` after each job before the next one may start in it.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = (!cooldown.is_zero()).then_some(cooldown);
        self
    }

    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    pub async fn run_blocking<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("Task limiter closed")?;

        let result = spawn_blocking(job).await.context("Task panicked")?;

        if let Some(cooldown) = self.cooldown {
            debug!("Cooling down for {:?}", cooldown);
            tokio::time::sleep(cooldown).await;
        }
        drop(permit);

        result
    }
}

impl Default for TaskLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_TASKS)
    }
}
