//! Background job scheduler and job implementations.

mod deferred_dispatch;
mod dispatch_cleanup;
mod pool_metrics;
mod scheduler;

pub use deferred_dispatch::DeferredDispatchJob;
pub use dispatch_cleanup::DispatchCleanupJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
