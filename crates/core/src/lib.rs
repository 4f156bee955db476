//! `bossman-core`: scheduling primitives shared by every scheduler instance.
//!
//! This crate contains **pure** building blocks (no store or network access):
//! job identities, interval resolution, the store key namespace, job
//! definitions, the job registry and the middleware chain.

pub mod error;
pub mod interval;
pub mod job;
pub mod job_name;
pub mod keys;
pub mod middleware;
pub mod registry;

pub use error::{CoreError, CoreResult};
pub use interval::IntervalError;
pub use job::{JobDefinition, Work, WorkResult};
pub use job_name::JobName;
pub use keys::{DEFAULT_PREFIX, KeySpace};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain, Next, Pipeline, from_fn};
pub use registry::JobRegistry;
