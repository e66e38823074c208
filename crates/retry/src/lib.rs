//! Bounded retry with capped exponential backoff and an in-memory status
//! ledger.
//!
//! [`RetryOrchestrator::execute`] runs an effectful closure up to a fixed
//! number of attempts, sleeping between failures. While an invocation is
//! backing off it is visible in the ledger as `Retrying`; an exhausted
//! invocation is left behind as a terminal `Failed` record until an operator
//! clears it. Successful invocations leave no trace.

pub mod backoff;
pub mod ledger;
pub mod orchestrator;

pub use {
    backoff::BackoffPolicy,
    ledger::{LedgerKeying, LedgerStatus, RetryOperation, RetryStatus},
    orchestrator::{RetryOrchestrator, RetryPolicy},
};
