//! Job definitions: a recurrence interval plus a unit of work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::interval::{self, IntervalError};

/// Outcome of one work invocation.
pub type WorkResult = anyhow::Result<()>;

/// The unit of work a job performs each time it fires.
///
/// Implemented for any `Fn() -> impl Future<Output = WorkResult>` closure, so
/// most callers never implement it by hand.
#[async_trait]
pub trait Work: Send + Sync + 'static {
    async fn run(&self) -> WorkResult;
}

#[async_trait]
impl<F, Fut> Work for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    async fn run(&self) -> WorkResult {
        (self)().await
    }
}

/// A registered job: how often it recurs and what it does.
///
/// Immutable once built. Cloning shares the same work function.
#[derive(Clone)]
pub struct JobDefinition {
    every: String,
    work: Arc<dyn Work>,
}

impl JobDefinition {
    /// Build a definition from a human interval (`"5 minutes"`) and a work
    /// function.
    pub fn new(every: impl Into<String>, work: impl Work) -> Self {
        Self {
            every: every.into(),
            work: Arc::new(work),
        }
    }

    /// The recurrence expression as registered.
    pub fn every(&self) -> &str {
        &self.every
    }

    /// Resolve the recurrence expression. Called afresh on every reschedule.
    pub fn interval(&self) -> Result<Duration, IntervalError> {
        interval::resolve(&self.every)
    }

    pub fn work(&self) -> &Arc<dyn Work> {
        &self.work
    }
}

impl core::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("every", &self.every)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn closures_are_work() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let definition = JobDefinition::new("5 minutes", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        definition.work().run().await.unwrap();
        definition.clone().work().run().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(definition.interval(), Ok(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn work_errors_are_returned() {
        let definition = JobDefinition::new("1 second", || async { Err(anyhow::anyhow!("disk full")) });
        let err = definition.work().run().await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
