//! Scheduler core: expiry-driven wake-ups, lock-guarded runs and idempotent
//! rescheduling.
//!
//! ## Cycle
//!
//! ```text
//! register ──▶ SET {prefix}:work:{name} {name} PX <interval> NX
//!                      │ (TTL elapses in the store)
//!                      ▼
//!        expired-key event, delivered to every instance
//!                      │
//!          ┌───────────┴────────────┐
//!          ▼                        ▼
//!   lock won: run pipeline    lock lost: skip
//!   then release the lock
//!          └───────────┬────────────┘
//!                      ▼
//!   every instance: SET ... NX again (first writer wins, others no-op)
//! ```
//!
//! The store keeps time for the whole fleet; instances only react to its
//! notifications, so scheduling reduces to a locking problem.

mod outcome;
mod runner;
mod stats;

use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

use bossman_core::{
    JobDefinition, JobName, JobRegistry, KeySpace, Middleware, MiddlewareChain, Next, Pipeline,
    WorkResult, from_fn,
};

use crate::config::SchedulerConfig;
use crate::error::{LockError, SchedulerError, WorkFailure};
use crate::lock::{DistributedLock, LockHandle};
use crate::store::CoordinationStore;

pub use outcome::{ExpiryOutcome, HandledExpiry, LockOutcome, WorkReport};
pub use runner::SchedulerHandle;
pub use stats::SchedulerStats;

/// One scheduler instance.
///
/// Cheap to clone; clones share the registry, middleware and counters.
pub struct Scheduler<S: CoordinationStore> {
    inner: Arc<Inner<S>>,
}

impl<S: CoordinationStore> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S> {
    store: Arc<S>,
    locks: DistributedLock<S>,
    keys: KeySpace,
    registry: Arc<JobRegistry>,
    middleware: RwLock<MiddlewareChain>,
    lock_timeout: Duration,
    enable_expiry_events: bool,
    stats: Mutex<SchedulerStats>,
}

impl<S: CoordinationStore> Scheduler<S> {
    pub fn new(store: Arc<S>, config: &SchedulerConfig) -> Self {
        Self::with_registry(store, config, Arc::new(JobRegistry::new()))
    }

    /// Build a scheduler around an existing registry.
    pub fn with_registry(store: Arc<S>, config: &SchedulerConfig, registry: Arc<JobRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                locks: DistributedLock::new(store.clone()),
                store,
                keys: KeySpace::new(config.prefix.clone()),
                registry,
                middleware: RwLock::new(MiddlewareChain::new()),
                lock_timeout: config.lock_timeout,
                enable_expiry_events: config.enable_expiry_events,
                stats: Mutex::new(SchedulerStats::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn keys(&self) -> &KeySpace {
        &self.inner.keys
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    pub fn lock_timeout(&self) -> Duration {
        self.inner.lock_timeout
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Append a middleware around every subsequent run.
    pub fn use_middleware(&self, middleware: impl Middleware) {
        self.inner
            .middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(middleware);
    }

    /// Append a closure middleware `(job, definition, next) -> future`.
    pub fn use_fn<F, Fut>(&self, f: F)
    where
        F: Fn(JobName, JobDefinition, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        self.use_middleware(from_fn(f));
    }

    /// Register a job and schedule its first wake-up.
    ///
    /// Re-registering a name replaces its definition. The interval is checked
    /// before anything is stored, and a failed store write restores the
    /// registry to what it was before the call.
    #[instrument(skip(self, name, definition), fields(job = name.as_ref(), every = definition.every()))]
    pub async fn register(
        &self,
        name: impl AsRef<str>,
        definition: JobDefinition,
    ) -> Result<(), SchedulerError> {
        let name = JobName::parse(name)?;
        definition
            .interval()
            .map_err(|source| SchedulerError::Interval {
                job: name.to_string(),
                source,
            })?;

        let previous = self.inner.registry.insert(name.clone(), definition);

        if let Err(e) = self.schedule_run(name.as_str()).await {
            // Undo the insert so a failed registration leaves no trace.
            match previous {
                Some(previous) => {
                    self.inner.registry.insert(name, previous);
                }
                None => {
                    self.inner.registry.remove(name.as_str());
                }
            }
            warn!(error = %e, "registration failed; job not scheduled");
            return Err(e);
        }

        if previous.is_some() {
            info!("replaced existing job definition");
        } else {
            info!("job registered");
        }
        Ok(())
    }

    /// Stop handling a job in this instance.
    ///
    /// This instance no longer races for the job's lock nor writes its wake
    /// key. Other instances that registered the job keep it recurring.
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.inner.registry.remove(name).is_some();
        if removed {
            info!(job = name, "job deregistered");
        }
        removed
    }

    /// Write the job's next wake key if none exists.
    ///
    /// Returns `false` when another instance already scheduled it; that is the
    /// expected resolution of concurrent rescheduling, not an error.
    pub async fn schedule_run(&self, name: &str) -> Result<bool, SchedulerError> {
        let definition = self
            .inner
            .registry
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;
        let ttl = definition
            .interval()
            .map_err(|source| SchedulerError::Interval {
                job: name.to_string(),
                source,
            })?;

        let key = self.inner.keys.work_key(name);
        let written = match self.inner.store.set_if_absent(&key, name, ttl).await {
            Ok(written) => written,
            Err(e) => {
                self.record(|s| s.store_errors += 1);
                return Err(e.into());
            }
        };

        if written {
            self.record(|s| s.reschedules_won += 1);
            debug!(job = name, ttl_ms = ttl.as_millis() as u64, "scheduled next run");
        } else {
            self.record(|s| s.reschedules_lost += 1);
            trace!(job = name, "next run already scheduled");
        }
        Ok(written)
    }

    /// Handle a key name received from the expiry feed.
    pub async fn handle_expired_key(&self, key: &str) -> ExpiryOutcome {
        match self.inner.keys.job_from_expired_key(key) {
            Some(name) => self.handle_expiry(name).await,
            None => {
                trace!(key, "ignoring expired key outside namespace");
                ExpiryOutcome::Ignored
            }
        }
    }

    /// React to the expiry of `name`'s wake key: race for the lock, run the
    /// job if won, and reschedule regardless of the lock outcome.
    #[instrument(skip(self), level = "debug")]
    pub async fn handle_expiry(&self, name: &str) -> ExpiryOutcome {
        let Ok(job) = JobName::parse(name) else {
            trace!("ignoring malformed job name");
            return ExpiryOutcome::Ignored;
        };
        let Some(definition) = self.inner.registry.get(name) else {
            debug!("job not registered here, skipping");
            return ExpiryOutcome::NotRegistered(name.to_string());
        };
        self.record(|s| s.expiries_observed += 1);

        let lock = self.try_execute(job.clone(), definition).await;

        let rescheduled = self.schedule_run(name).await;
        match &rescheduled {
            Err(SchedulerError::UnknownJob(_)) => debug!("job deregistered during run, not rescheduling"),
            Err(e) => error!(error = %e, "failed to reschedule job"),
            Ok(_) => {}
        }

        ExpiryOutcome::Handled(HandledExpiry {
            job,
            lock,
            rescheduled,
        })
    }

    async fn try_execute(&self, job: JobName, definition: JobDefinition) -> LockOutcome {
        let key = self.inner.keys.lock_key(job.as_str());

        match self.inner.locks.acquire(&key, self.inner.lock_timeout).await {
            Ok(lock) => {
                self.record(|s| {
                    s.executions += 1;
                    s.last_execution_at = Some(Utc::now());
                });
                let pipeline = self
                    .inner
                    .middleware
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .compose();
                let inner = self.inner.clone();
                LockOutcome::Acquired(tokio::spawn(execute(inner, pipeline, job, definition, lock)))
            }
            Err(LockError::Unavailable { .. }) => {
                self.record(|s| s.lock_contentions += 1);
                debug!("another instance is running this job");
                LockOutcome::Unavailable
            }
            Err(LockError::Store(e)) => {
                self.record(|s| s.store_errors += 1);
                error!(error = %e, "lock acquisition failed");
                LockOutcome::StoreUnavailable(e)
            }
        }
    }

    fn record(&self, update: impl FnOnce(&mut SchedulerStats)) {
        self.inner.record(update);
    }
}

impl<S> Inner<S> {
    fn record(&self, update: impl FnOnce(&mut SchedulerStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut *stats);
    }
}

/// Run the pipeline in its own task so a panic cannot skip the release.
async fn execute<S: CoordinationStore>(
    inner: Arc<Inner<S>>,
    pipeline: Pipeline,
    job: JobName,
    definition: JobDefinition,
    lock: LockHandle,
) -> WorkReport {
    let started = Instant::now();

    let result = match tokio::spawn(pipeline.invoke(job.clone(), definition)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WorkFailure::Failed(e)),
        Err(e) if e.is_panic() => Err(WorkFailure::Panicked(panic_message(e.into_panic()))),
        Err(_) => Err(WorkFailure::Cancelled),
    };
    let elapsed = started.elapsed();
    let overran = elapsed >= lock.ttl();

    let lock_released = match inner.locks.release(&lock).await {
        Ok(released) => released,
        Err(e) => {
            inner.record(|s| s.store_errors += 1);
            error!(job = %job, key = lock.key(), error = %e, "failed to release lock; it will expire on its own");
            false
        }
    };

    let elapsed_ms = elapsed.as_millis() as u64;
    if overran {
        inner.record(|s| s.overruns += 1);
        warn!(
            job = %job,
            elapsed_ms,
            lock_timeout_ms = lock.ttl().as_millis() as u64,
            "run outlived its lock; another instance may have run concurrently"
        );
    }
    match &result {
        Ok(()) => debug!(job = %job, elapsed_ms, "run completed"),
        Err(e) => {
            inner.record(|s| s.work_failures += 1);
            warn!(job = %job, elapsed_ms, error = %e, "run failed");
        }
    }

    WorkReport {
        job,
        result,
        elapsed,
        overran,
        lock_released,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}
