//! Interest and Data packets as the engine sees them (no wire encoding).

use std::time::Duration;

use crate::name::ContentName;

/// Default interest lifetime before the transport reports a timeout.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

/// A request for the content named `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: ContentName,
    pub lifetime: Duration,
}

impl Interest {
    pub fn new(name: ContentName) -> Self {
        Interest {
            name,
            lifetime: DEFAULT_INTEREST_LIFETIME,
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// A named response carrying one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: ContentName,
    pub content: Vec<u8>,
    /// Index of the last segment of this content, when the producer knows it.
    pub final_block_id: Option<u64>,
}

impl Data {
    pub fn new(name: ContentName, content: Vec<u8>) -> Self {
        Data {
            name,
            content,
            final_block_id: None,
        }
    }

    pub fn with_final_block_id(mut self, final_segment: Option<u64>) -> Self {
        self.final_block_id = final_segment;
        self
    }

    /// Segment number carried in the name, if any.
    pub fn segment(&self) -> Option<u64> {
        self.name.segment()
    }

    /// True if this is the last segment of the content.
    pub fn is_final(&self) -> bool {
        matches!((self.segment(), self.final_block_id), (Some(s), Some(f)) if s == f)
    }
}
