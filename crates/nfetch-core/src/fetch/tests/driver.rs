use std::time::Duration;

use super::*;
use crate::fetch::driver::drive;
use crate::fetch::FetchState;
use crate::serve::{FileSource, ServeSession};
use crate::transport::{FaceEvent, Forwarder, LoopbackFace, RouteCost};

fn served(dir: &Path, content: &[u8]) -> crate::transport::SharedForwarder {
    let src = dir.join("source.bin");
    std::fs::write(&src, content).unwrap();
    let serve = ServeSession::new(
        ContentName::parse("/file-name"),
        FileSource::open(&src).unwrap(),
        CHUNK as u32,
    );
    let mut fwd = Forwarder::new();
    fwd.register_authority(ContentName::parse("/file-name"), RouteCost::USB, Box::new(serve));
    fwd.shared()
}

#[tokio::test]
async fn drive_copies_through_loopback() {
    let src_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..CHUNK as u32 * 7 + 123).map(|i| (i % 253) as u8).collect();
    let fwd = served(src_dir.path(), &content);

    let (face_tx, mut face_rx) = tokio::sync::mpsc::unbounded_channel::<FaceEvent>();
    let (ev_tx, mut ev_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut session = FetchSession::new(
        ContentName::parse("/file-name"),
        Box::new(DirTarget::new(out_dir.path())),
        LoopbackFace::new(fwd, face_tx),
        options(3),
        ev_tx,
    );
    let state = drive(&mut session, &mut face_rx).await.unwrap();
    assert_eq!(state, FetchState::Complete);

    let path = out_dir.path().join("file-name");
    assert_eq!(std::fs::read(&path).unwrap(), content);
    let events = drain(&mut ev_rx);
    let progress = events
        .iter()
        .filter(|e| matches!(e, FetchEvent::Progress(_)))
        .count();
    assert_eq!(progress, 8);
    assert_eq!(events.last(), Some(&FetchEvent::Complete { path }));
}

#[tokio::test]
async fn drive_reports_missing_content() {
    let out_dir = tempfile::tempdir().unwrap();
    let (face_tx, mut face_rx) = tokio::sync::mpsc::unbounded_channel::<FaceEvent>();
    let (ev_tx, _ev_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut session = FetchSession::new(
        ContentName::parse("/nobody-has-this"),
        Box::new(DirTarget::new(out_dir.path())),
        LoopbackFace::new(Forwarder::new().shared(), face_tx),
        options(3),
        ev_tx,
    );
    let err = drive(&mut session, &mut face_rx).await.unwrap_err();
    assert!(matches!(err, crate::fetch::FetchError::NotFound(_)));
    assert_eq!(session.state(), FetchState::Failed);
}

#[tokio::test]
async fn drive_waits_out_a_watch() {
    let src_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let path = out_dir.path().join("out.bin");
    let fwd = served(src_dir.path(), b"watched content");

    // Hold the table as if another process were downloading.
    let crate::segment_table::Opened::Locked(holder) =
        crate::segment_table::SegmentTable::open(&path).unwrap()
    else {
        panic!("expected lock");
    };

    let (face_tx, mut face_rx) = tokio::sync::mpsc::unbounded_channel::<FaceEvent>();
    let (ev_tx, _ev_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut opts = options(3);
    opts.watch_poll_interval = Duration::from_millis(10);
    let mut session = FetchSession::new(
        ContentName::parse("/file-name"),
        Box::new(FileTarget::new(&path)),
        LoopbackFace::new(fwd, face_tx),
        opts,
        ev_tx,
    );

    let release = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        holder.delete_and_unlock().unwrap();
    };
    let (state, ()) = tokio::join!(drive(&mut session, &mut face_rx), release);
    assert_eq!(state.unwrap(), FetchState::Complete);
    assert_eq!(std::fs::read(&path).unwrap(), b"watched content");
}

#[tokio::test]
async fn drive_completes_from_stream_of_whole_chunks() {
    let out_dir = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..CHUNK * 2).map(|i| (i % 13) as u8).collect();
    let serve = ServeSession::new(
        ContentName::parse("/file-name"),
        crate::serve::StreamSource::new(std::io::Cursor::new(content.clone())),
        CHUNK as u32,
    );
    let mut fwd = Forwarder::new();
    fwd.register_authority(ContentName::parse("/file-name"), RouteCost::USB, Box::new(serve));

    let (face_tx, mut face_rx) = tokio::sync::mpsc::unbounded_channel::<FaceEvent>();
    let (ev_tx, _ev_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut session = FetchSession::new(
        ContentName::parse("/file-name"),
        Box::new(DirTarget::new(out_dir.path())),
        LoopbackFace::new(fwd.shared(), face_tx),
        options(4),
        ev_tx,
    );
    let state = tokio::time::timeout(Duration::from_secs(5), drive(&mut session, &mut face_rx))
        .await
        .expect("session stalled")
        .unwrap();
    assert_eq!(state, FetchState::Complete);
    assert_eq!(session.final_segment(), Some(1));
    assert_eq!(std::fs::read(out_dir.path().join("file-name")).unwrap(), content);
}
