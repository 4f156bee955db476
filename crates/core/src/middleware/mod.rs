//! Middleware chain wrapped around every work invocation.
//!
//! Middleware are kept as an ordered list and composed into a [`Pipeline`]
//! once per work attempt (classic onion layout):
//!
//! ```text
//! M1 before → M2 before → work → M2 after → M1 after
//! ```
//!
//! The first registered middleware is the outermost. Each one receives the job
//! name, the job definition and a [`Next`] continuation; it may run code
//! around `next.run()`, skip it entirely, or rewrite the result.

mod logging;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::job::{JobDefinition, WorkResult};
use crate::job_name::JobName;

pub use logging::LoggingMiddleware;

/// Cross-cutting behavior around a work invocation.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, job: JobName, definition: JobDefinition, next: Next) -> WorkResult;
}

/// The rest of the chain after the current middleware.
///
/// Consumed by [`Next::run`], so a middleware can continue the chain at most
/// once.
pub struct Next {
    layers: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    job: JobName,
    definition: JobDefinition,
}

impl Next {
    /// Run the remaining middleware and then the job's work.
    pub async fn run(self) -> WorkResult {
        let Next {
            layers,
            index,
            job,
            definition,
        } = self;

        match layers.get(index).cloned() {
            Some(layer) => {
                let next = Next {
                    layers,
                    index: index + 1,
                    job: job.clone(),
                    definition: definition.clone(),
                };
                layer.handle(job, definition, next).await
            }
            None => definition.work().run().await,
        }
    }

    /// Name of the job being run.
    pub fn job(&self) -> &JobName {
        &self.job
    }
}

/// Ordered list of middleware, appended to during setup.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it wraps everything appended after it.
    pub fn push(&mut self, middleware: impl Middleware) {
        self.layers.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Freeze the current list into a callable pipeline.
    pub fn compose(&self) -> Pipeline {
        Pipeline {
            layers: self.layers.iter().cloned().collect(),
        }
    }
}

impl core::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// A composed chain ready to run one job invocation.
#[derive(Clone)]
pub struct Pipeline {
    layers: Arc<[Arc<dyn Middleware>]>,
}

impl Pipeline {
    /// Run the whole chain around `definition`'s work. Resolves exactly once.
    pub async fn invoke(self, job: JobName, definition: JobDefinition) -> WorkResult {
        Next {
            layers: self.layers,
            index: 0,
            job,
            definition,
        }
        .run()
        .await
    }
}

/// Middleware built from a closure.
pub struct FnMiddleware<F> {
    f: F,
}

/// Wrap a closure `(job, definition, next) -> future` as middleware.
pub fn from_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(JobName, JobDefinition, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(JobName, JobDefinition, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkResult> + Send + 'static,
{
    async fn handle(&self, job: JobName, definition: JobDefinition, next: Next) -> WorkResult {
        (self.f)(job, definition, next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, label: &'static str) -> impl Middleware + use<> {
        let log = log.clone();
        from_fn(move |_job, _definition, next: Next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{label}-before"));
                let result = next.run().await;
                log.lock().unwrap().push(format!("{label}-after"));
                result
            }
        })
    }

    fn recording_work(log: &Log) -> JobDefinition {
        let log = log.clone();
        JobDefinition::new("5 minutes", move || {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("work".to_string());
                Ok(())
            }
        })
    }

    fn job() -> JobName {
        JobName::parse("cleanup").unwrap()
    }

    #[tokio::test]
    async fn first_registered_is_outermost() {
        let log: Log = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(recording(&log, "m1"));
        chain.push(recording(&log, "m2"));

        chain.compose().invoke(job(), recording_work(&log)).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["m1-before", "m2-before", "work", "m2-after", "m1-after"]
        );
    }

    #[tokio::test]
    async fn empty_chain_runs_work_directly() {
        let log: Log = Arc::default();
        MiddlewareChain::new()
            .compose()
            .invoke(job(), recording_work(&log))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["work"]);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let log: Log = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(from_fn(|_job, _definition, _next| async { Ok(()) }));
        chain.push(recording(&log, "inner"));

        chain.compose().invoke(job(), recording_work(&log)).await.unwrap();

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn middleware_can_suppress_and_rewrite_errors() {
        let failing = JobDefinition::new("1 minute", || async { Err(anyhow::anyhow!("boom")) });

        let mut suppress = MiddlewareChain::new();
        suppress.push(from_fn(|_job, _definition, next: Next| async move {
            let _ = next.run().await;
            Ok(())
        }));
        assert!(suppress.compose().invoke(job(), failing.clone()).await.is_ok());

        let mut rewrite = MiddlewareChain::new();
        rewrite.push(from_fn(|job: JobName, _definition, next: Next| async move {
            next.run().await.map_err(|e| e.context(format!("job {job} failed")))
        }));
        let err = rewrite.compose().invoke(job(), failing).await.unwrap_err();
        assert_eq!(err.to_string(), "job cleanup failed");
    }

    #[tokio::test]
    async fn composed_pipeline_ignores_later_pushes() {
        let log: Log = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(recording(&log, "m1"));
        let pipeline = chain.compose();
        chain.push(recording(&log, "m2"));

        pipeline.invoke(job(), recording_work(&log)).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["m1-before", "work", "m1-after"]);
        assert_eq!(chain.len(), 2);
    }
}
