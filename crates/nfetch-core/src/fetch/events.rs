use std::path::PathBuf;

use crate::name::ContentName;
use crate::progress::FetchProgress;

/// Notifications from a fetch to whoever is listening.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Progress(FetchProgress),
    /// A request went unanswered; `try_again` says whether it is re-expressed.
    InterestTimeout { name: ContentName, try_again: bool },
    /// The file is at `path`. Emitted once.
    Complete { path: PathBuf },
    /// Terminal failure; on-disk state is kept for a later attempt.
    Failed { error: String },
}
