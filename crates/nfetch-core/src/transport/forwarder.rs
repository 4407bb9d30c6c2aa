//! In-process forwarder: routes interests to registered authorities.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;

use crate::name::ContentName;

use super::face::{Authority, Face, FaceError, FaceEvent};
use super::packet::{Data, Interest};

/// Route cost hints; lower is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RouteCost(pub u32);

impl RouteCost {
    pub const USB: RouteCost = RouteCost(10);
    pub const LOCAL_NETWORK: RouteCost = RouteCost(20);
    pub const HTTP: RouteCost = RouteCost(100);
}

struct Route {
    prefix: ContentName,
    cost: RouteCost,
    authority: Box<dyn Authority + Send>,
}

/// Prefix registry standing in for a forwarding daemon.
#[derive(Default)]
pub struct Forwarder {
    routes: Vec<Route>,
}

pub type SharedForwarder = Arc<Mutex<Forwarder>>;

impl Forwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedForwarder {
        Arc::new(Mutex::new(self))
    }

    pub fn register_authority(
        &mut self,
        prefix: ContentName,
        cost: RouteCost,
        authority: Box<dyn Authority + Send>,
    ) {
        tracing::debug!(prefix = %prefix, cost = cost.0, "registering authority");
        self.routes.push(Route {
            prefix,
            cost,
            authority,
        });
    }

    /// Drop every route registered for exactly `prefix`. Returns whether any existed.
    pub fn unregister_authority(&mut self, prefix: &ContentName) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r.prefix != *prefix);
        before != self.routes.len()
    }

    /// Ask matching authorities in order (longest prefix, then lowest cost)
    /// until one answers.
    pub fn route(&mut self, name: &ContentName) -> Option<Data> {
        let mut candidates: Vec<usize> = self
            .routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.prefix.is_prefix_of(name))
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by_key(|&i| {
            let r = &self.routes[i];
            (std::cmp::Reverse(r.prefix.len()), r.cost)
        });
        candidates
            .into_iter()
            .find_map(|i| self.routes[i].authority.serve(name))
    }
}

/// Face that answers from a shared [`Forwarder`] and queues the result on
/// the driver's event channel. Absent content becomes a Nack.
pub struct LoopbackFace {
    forwarder: SharedForwarder,
    events: UnboundedSender<FaceEvent>,
}

impl LoopbackFace {
    pub fn new(forwarder: SharedForwarder, events: UnboundedSender<FaceEvent>) -> Self {
        LoopbackFace { forwarder, events }
    }
}

impl Face for LoopbackFace {
    fn express_interest(&mut self, interest: &Interest) -> Result<(), FaceError> {
        let answer = {
            let mut fwd = self.forwarder.lock().unwrap_or_else(|e| e.into_inner());
            fwd.route(&interest.name)
        };
        let event = match answer {
            Some(data) => FaceEvent::Data {
                interest: interest.name.clone(),
                data,
            },
            None => FaceEvent::Nack {
                interest: interest.name.clone(),
            },
        };
        self.events.send(event).map_err(|_| FaceError::Closed)
    }

    fn remove_pending_interest(&mut self, name: &ContentName) {
        tracing::trace!(name = %name, "loopback interest withdrawn");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl Authority for Fixed {
        fn serve(&mut self, name: &ContentName) -> Option<Data> {
            Some(Data::new(name.clone(), self.0.as_bytes().to_vec()))
        }
    }

    struct Absent;

    impl Authority for Absent {
        fn serve(&mut self, _name: &ContentName) -> Option<Data> {
            None
        }
    }

    fn answer(fwd: &mut Forwarder, name: &str) -> Option<String> {
        fwd.route(&ContentName::parse(name))
            .map(|d| String::from_utf8(d.content).unwrap())
    }

    #[test]
    fn lowest_cost_wins_for_same_prefix() {
        let mut fwd = Forwarder::new();
        fwd.register_authority(ContentName::parse("/a"), RouteCost::HTTP, Box::new(Fixed("http")));
        fwd.register_authority(ContentName::parse("/a"), RouteCost::USB, Box::new(Fixed("usb")));
        assert_eq!(answer(&mut fwd, "/a/file").as_deref(), Some("usb"));
    }

    #[test]
    fn longest_prefix_wins_over_cost() {
        let mut fwd = Forwarder::new();
        fwd.register_authority(ContentName::parse("/a"), RouteCost::USB, Box::new(Fixed("short")));
        fwd.register_authority(ContentName::parse("/a/b"), RouteCost::HTTP, Box::new(Fixed("long")));
        assert_eq!(answer(&mut fwd, "/a/b/c").as_deref(), Some("long"));
        assert_eq!(answer(&mut fwd, "/a/x").as_deref(), Some("short"));
        assert_eq!(answer(&mut fwd, "/z"), None);
    }

    #[test]
    fn falls_through_to_next_authority() {
        let mut fwd = Forwarder::new();
        fwd.register_authority(ContentName::parse("/a"), RouteCost::USB, Box::new(Absent));
        fwd.register_authority(ContentName::parse("/a"), RouteCost::HTTP, Box::new(Fixed("http")));
        assert_eq!(answer(&mut fwd, "/a").as_deref(), Some("http"));
        assert!(fwd.unregister_authority(&ContentName::parse("/a")));
        assert_eq!(answer(&mut fwd, "/a"), None);
        assert!(!fwd.unregister_authority(&ContentName::parse("/a")));
    }

    #[test]
    fn loopback_queues_data_or_nack() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut fwd = Forwarder::new();
        fwd.register_authority(ContentName::parse("/a"), RouteCost::USB, Box::new(Fixed("x")));
        let mut face = LoopbackFace::new(fwd.shared(), tx);

        face.express_interest(&Interest::new(ContentName::parse("/a/1"))).unwrap();
        face.express_interest(&Interest::new(ContentName::parse("/b"))).unwrap();

        match rx.try_recv().unwrap() {
            FaceEvent::Data { interest, data } => {
                assert_eq!(interest, ContentName::parse("/a/1"));
                assert_eq!(data.content, b"x");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            FaceEvent::Nack {
                interest: ContentName::parse("/b")
            }
        );
    }

    #[test]
    fn loopback_reports_closed_channel() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let mut face = LoopbackFace::new(Forwarder::new().shared(), tx);
        assert!(matches!(
            face.express_interest(&Interest::new(ContentName::parse("/a"))),
            Err(FaceError::Closed)
        ));
    }
}
