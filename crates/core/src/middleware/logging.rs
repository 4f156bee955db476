use std::time::Instant;

use async_trait::async_trait;
use tracing::{Instrument, debug, info_span, warn};

use super::{Middleware, Next};
use crate::job::{JobDefinition, WorkResult};
use crate::job_name::JobName;

/// Emits a `job_run` span plus start/finish events around each run.
///
/// Failures are logged at warn level and passed through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, job: JobName, definition: JobDefinition, next: Next) -> WorkResult {
        let span = info_span!("job_run", job = %job, every = %definition.every());

        async move {
            let started = Instant::now();
            debug!("job started");

            let result = next.run().await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => debug!(elapsed_ms, "job finished"),
                Err(e) => warn!(elapsed_ms, error = %e, "job failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}
