//! Async loop feeding face events and timer ticks into a [`FetchSession`].
//!
//! One event at a time, on whatever task awaits [`drive`]; the session
//! itself never blocks or spawns.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::transport::{Face, FaceEvent};

use super::{FetchError, FetchSession, FetchState};

/// Longest sleep when nothing is scheduled.
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Start the session if needed and run it until it completes, fails, or is
/// cancelled. A closed event channel cancels the session.
pub async fn drive<F: Face>(
    session: &mut FetchSession<F>,
    events: &mut UnboundedReceiver<FaceEvent>,
) -> Result<FetchState, FetchError> {
    if session.state() == FetchState::Idle {
        session.start()?;
    }
    while !session.is_finished() {
        let wake = next_wake(session);
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => dispatch(session, event)?,
                None => {
                    tracing::debug!("face event channel closed");
                    session.cancel();
                }
            },
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => {
                session.tick(Instant::now())?;
            }
        }
    }
    Ok(session.state())
}

/// Hand one face event to the session.
pub fn dispatch<F: Face>(session: &mut FetchSession<F>, event: FaceEvent) -> Result<(), FetchError> {
    match event {
        FaceEvent::Data { interest, data } => session.on_data(&interest, data),
        FaceEvent::Timeout { interest } => session.on_timeout(&interest),
        FaceEvent::Nack { interest } => session.on_nack(&interest),
    }
}

fn next_wake<F: Face>(session: &FetchSession<F>) -> Instant {
    let now = Instant::now();
    if session.state() == FetchState::Watching {
        return now + session.options().watch_poll_interval;
    }
    match session.next_retry_at() {
        Some(at) => at.min(now + IDLE_TICK),
        None => now + IDLE_TICK,
    }
}
