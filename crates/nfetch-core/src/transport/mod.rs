//! Transport seam: what the engine needs from the Interest/Data network.
//!
//! The engine never touches a socket. A [`Face`] expresses interests; the
//! answers come back as [`FaceEvent`]s through whatever drives the session.
//! [`Forwarder`] + [`LoopbackFace`] provide an in-process network used by
//! the CLI and tests.

mod face;
mod forwarder;
mod packet;

pub use face::{Authority, Face, FaceError, FaceEvent};
pub use forwarder::{Forwarder, LoopbackFace, RouteCost, SharedForwarder};
pub use packet::{Data, Interest, DEFAULT_INTEREST_LIFETIME};
