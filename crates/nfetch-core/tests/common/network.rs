//! In-process network for integration tests: a loopback face that loses,
//! duplicates and reorders answers, plus an authority that counts requests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use nfetch_core::name::ContentName;
use nfetch_core::serve::{FileSource, ServeSession};
use nfetch_core::transport::{
    Authority, Data, Face, FaceError, FaceEvent, Forwarder, Interest, RouteCost, SharedForwarder,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, Default)]
pub struct Impairments {
    /// Every Nth interest (first attempt of a name only) times out instead of being answered.
    pub drop_every: Option<usize>,
    /// Every answer is delivered twice.
    pub duplicate: bool,
    /// Answers queued together are delivered in reverse order.
    pub reorder: bool,
}

pub struct TestFace {
    forwarder: SharedForwarder,
    outbound: UnboundedSender<FaceEvent>,
    impairments: Impairments,
    count: usize,
    dropped: HashSet<ContentName>,
    pub expressed: Arc<Mutex<Vec<ContentName>>>,
}

impl Face for TestFace {
    fn express_interest(&mut self, interest: &Interest) -> Result<(), FaceError> {
        self.expressed.lock().unwrap().push(interest.name.clone());
        self.count += 1;
        if let Some(n) = self.impairments.drop_every {
            if self.count % n == 0 && self.dropped.insert(interest.name.clone()) {
                return self
                    .outbound
                    .send(FaceEvent::Timeout {
                        interest: interest.name.clone(),
                    })
                    .map_err(|_| FaceError::Closed);
            }
        }
        let answer = self.forwarder.lock().unwrap().route(&interest.name);
        let event = match answer {
            Some(data) => FaceEvent::Data {
                interest: interest.name.clone(),
                data,
            },
            None => FaceEvent::Nack {
                interest: interest.name.clone(),
            },
        };
        if self.impairments.duplicate {
            self.outbound.send(event.clone()).map_err(|_| FaceError::Closed)?;
        }
        self.outbound.send(event).map_err(|_| FaceError::Closed)
    }

    fn remove_pending_interest(&mut self, _name: &ContentName) {}
}

/// Face plus the receiver the driver reads from. With `reorder`, a background
/// task reverses each burst of queued answers before passing it on.
pub fn face(
    forwarder: SharedForwarder,
    impairments: Impairments,
) -> (TestFace, UnboundedReceiver<FaceEvent>) {
    let (tx, rx) = unbounded_channel();
    let face = |outbound| TestFace {
        forwarder,
        outbound,
        impairments,
        count: 0,
        dropped: HashSet::new(),
        expressed: Arc::new(Mutex::new(Vec::new())),
    };
    if !impairments.reorder {
        return (face(tx), rx);
    }
    let (raw_tx, mut raw_rx) = unbounded_channel::<FaceEvent>();
    tokio::spawn(async move {
        while let Some(first) = raw_rx.recv().await {
            let mut burst = vec![first];
            while let Ok(ev) = raw_rx.try_recv() {
                burst.push(ev);
            }
            for ev in burst.into_iter().rev() {
                if tx.send(ev).is_err() {
                    return;
                }
            }
        }
    });
    (face(raw_tx), rx)
}

/// Wraps an authority and records which segment each answered interest asked for.
pub struct Counting<A> {
    inner: A,
    pub served: Arc<Mutex<Vec<u64>>>,
}

impl<A: Authority> Authority for Counting<A> {
    fn serve(&mut self, name: &ContentName) -> Option<Data> {
        let data = self.inner.serve(name)?;
        self.served
            .lock()
            .unwrap()
            .push(name.segment().unwrap_or(0));
        Some(data)
    }
}

/// Serve `content` as `/file-name` with `chunk` sized segments. Returns the
/// forwarder and the log of served segment indices.
pub fn serve_bytes(
    dir: &std::path::Path,
    content: &[u8],
    chunk: u32,
) -> (SharedForwarder, Arc<Mutex<Vec<u64>>>) {
    let src = dir.join("source.bin");
    std::fs::write(&src, content).unwrap();
    let session = ServeSession::new(
        ContentName::parse("/file-name"),
        FileSource::open(&src).unwrap(),
        chunk,
    );
    let served = Arc::new(Mutex::new(Vec::new()));
    let counting = Counting {
        inner: session,
        served: Arc::clone(&served),
    };
    let mut fwd = Forwarder::new();
    fwd.register_authority(ContentName::parse("/file-name"), RouteCost::LOCAL_NETWORK, Box::new(counting));
    (fwd.shared(), served)
}

pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}
