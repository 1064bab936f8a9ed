//! Retry and backoff policy.
//!
//! Download retries are a per-record budget (`JobRecord::download_retries`);
//! this module supplies the timing side: how long a job waits before it is
//! handed back to its queue after a failure.

mod policy;

pub use policy::RetryPolicy;
