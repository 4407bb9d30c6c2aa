//! Producer side: answer segment interests for a file or stream.

mod session;
mod source;
mod worker;

pub use session::ServeSession;
pub use source::{FileSource, SegmentSource, StreamSource};
pub use worker::{StreamProgress, StreamWorker};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("segment {0} does not exist")]
    NotFound(u64),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
