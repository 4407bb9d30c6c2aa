//! Retry policy for unanswered segment requests.
//!
//! Timeouts are retried, absence (a Nack) never is. By default a timed-out
//! request is re-expressed immediately and without limit; a cap and an
//! exponential backoff can be configured.

mod policy;

pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
