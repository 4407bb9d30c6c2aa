use crate::name::ContentName;
use crate::segment_table::TableError;
use crate::storage::StorageError;
use crate::target::TargetError;
use crate::transport::FaceError;

use super::FetchState;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(ContentName),
    #[error("gave up on {name} after {attempts} attempts")]
    RetriesExhausted { name: ContentName, attempts: u32 },
    #[error("segment {index} has {got} bytes, expected {expected}")]
    SegmentSize { index: u64, expected: u64, got: u64 },
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Face(#[from] FaceError),
    #[error("operation not valid while {0:?}")]
    InvalidState(FetchState),
}
