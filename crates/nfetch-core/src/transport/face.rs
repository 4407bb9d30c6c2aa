use crate::name::ContentName;

use super::packet::{Data, Interest};

#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error("face is closed")]
    Closed,
    #[error("cannot express interest {name}: {reason}")]
    Rejected { name: ContentName, reason: String },
}

/// Outcome of an expressed interest, delivered back to whoever drives the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceEvent {
    Data { interest: ContentName, data: Data },
    Timeout { interest: ContentName },
    /// Nobody has the content.
    Nack { interest: ContentName },
}

impl FaceEvent {
    pub fn interest(&self) -> &ContentName {
        match self {
            FaceEvent::Data { interest, .. }
            | FaceEvent::Timeout { interest }
            | FaceEvent::Nack { interest } => interest,
        }
    }
}

/// Request side of the transport.
pub trait Face {
    fn express_interest(&mut self, interest: &Interest) -> Result<(), FaceError>;

    /// Forget an outstanding interest; a late answer to it may still arrive.
    fn remove_pending_interest(&mut self, name: &ContentName);
}

/// Serving side: answers an interest with a Data, or `None` when absent.
pub trait Authority {
    fn serve(&mut self, name: &ContentName) -> Option<Data>;
}
