//! Session tests driven by hand through a recording face.

mod driver;

use std::path::Path;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::name::ContentName;
use crate::target::{DirTarget, FileTarget, Target};
use crate::transport::{Data, Face, FaceError, Interest};

use super::{FetchEvent, FetchOptions, FetchSession};

pub(super) const CHUNK: usize = 4096;

/// Records what the session asks the network for.
#[derive(Debug, Default)]
pub(super) struct MockFace {
    /// Every interest expressed, in order.
    pub expressed: Vec<ContentName>,
    /// Expressed and neither answered nor removed.
    pub outstanding: Vec<ContentName>,
    pub removed: Vec<ContentName>,
}

impl Face for MockFace {
    fn express_interest(&mut self, interest: &Interest) -> Result<(), FaceError> {
        self.expressed.push(interest.name.clone());
        self.outstanding.push(interest.name.clone());
        Ok(())
    }

    fn remove_pending_interest(&mut self, name: &ContentName) {
        self.outstanding.retain(|n| n != name);
        self.removed.push(name.clone());
    }
}

pub(super) type Session = FetchSession<MockFace>;

pub(super) fn options(pipeline_depth: usize) -> FetchOptions {
    FetchOptions {
        chunk_size: CHUNK as u32,
        pipeline_depth,
        ..FetchOptions::default()
    }
}

pub(super) fn dir_session(
    dir: &Path,
    opts: FetchOptions,
) -> (Session, UnboundedReceiver<FetchEvent>) {
    session_with(Box::new(DirTarget::new(dir)), opts)
}

pub(super) fn file_session(
    path: &Path,
    opts: FetchOptions,
) -> (Session, UnboundedReceiver<FetchEvent>) {
    session_with(Box::new(FileTarget::new(path)), opts)
}

fn session_with(
    target: Box<dyn Target + Send>,
    opts: FetchOptions,
) -> (Session, UnboundedReceiver<FetchEvent>) {
    let (tx, rx) = unbounded_channel();
    let session = FetchSession::new(
        ContentName::parse("/file-name"),
        target,
        MockFace::default(),
        opts,
        tx,
    );
    (session, rx)
}

/// Content of segment `i` in the generated test files.
pub(super) fn segment_bytes(i: u64) -> Vec<u8> {
    vec![(i % 251) as u8; CHUNK]
}

pub(super) fn build_segment(prefix: &str, i: u64, n_segments: u64, content: Vec<u8>) -> Data {
    Data::new(ContentName::parse(prefix).append_segment(i), content)
        .with_final_block_id(Some(n_segments - 1))
}

pub(super) fn seg_name(prefix: &str, i: u64) -> ContentName {
    ContentName::parse(prefix).append_segment(i)
}

pub(super) fn names(list: &[ContentName]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

pub(super) fn outstanding(s: &Session) -> Vec<String> {
    names(&s.face().outstanding)
}

/// Deliver `data` as the answer to `interest`, as the network would.
pub(super) fn answer(s: &mut Session, interest: &ContentName, data: Data) {
    s.face_mut().outstanding.retain(|n| n != interest);
    s.on_data(interest, data).unwrap();
}

/// Answer a segment of a generated file of `n` segments under `/file-name`.
pub(super) fn answer_segment(s: &mut Session, i: u64, n: u64) {
    let name = seg_name("/file-name", i);
    answer(s, &name, build_segment("/file-name", i, n, segment_bytes(i)));
}

pub(super) fn drain(rx: &mut UnboundedReceiver<FetchEvent>) -> Vec<FetchEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub(super) fn expected_file(n: u64) -> Vec<u8> {
    (0..n).flat_map(segment_bytes).collect()
}

pub(super) fn assert_download_completed(path: &Path) {
    assert!(path.exists(), "{} missing", path.display());
    assert!(!crate::storage::part_path(path).exists());
    assert!(!crate::storage::table_path(path).exists());
}
