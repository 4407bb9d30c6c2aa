//! Consumer side: fetch named content segment by segment into a local file.
//!
//! A [`FetchSession`] asks for the bare name, learns the qualified name and
//! final segment from the first answer, locks `<target>.sgt`, then keeps up
//! to `pipeline_depth` segment requests outstanding. Segments are written at
//! `index * chunk_size` in whatever order they arrive. When every segment is
//! on disk the part file is renamed into place and the table deleted.
//!
//! If another process already holds the table lock, the session waits as a
//! watcher and restarts once that download ends.

mod download;
pub mod driver;
mod error;
mod events;
mod follower;
mod session;
#[cfg(test)]
mod tests;

pub use error::FetchError;
pub use events::FetchEvent;
pub use follower::{FollowStatus, StreamFollower};
pub use session::FetchSession;

use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    AwaitingFirstSegment,
    Fetching,
    /// Another process is downloading the same target.
    Watching,
    Complete,
    Cancelled,
    Failed,
}

/// Tuning for one fetch. Usually built from [`crate::config::NfetchConfig::fetch_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Segment size the producer cuts content into.
    pub chunk_size: u32,
    /// Maximum outstanding segment requests.
    pub pipeline_depth: usize,
    pub interest_lifetime: Duration,
    pub watch_poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        crate::config::NfetchConfig::default().fetch_options()
    }
}
