//! `nfetch copy` – publish a local file under a name and fetch it back.

use anyhow::{bail, Context, Result};
use nfetch_core::config::NfetchConfig;
use nfetch_core::fetch::driver::drive;
use nfetch_core::fetch::{FetchEvent, FetchSession, FetchState, FollowStatus, StreamFollower};
use nfetch_core::name::ContentName;
use nfetch_core::serve::{FileSource, ServeSession, StreamProgress, StreamWorker};
use nfetch_core::target::{DirTarget, FileTarget, Target};
use nfetch_core::transport::{FaceEvent, Forwarder, LoopbackFace, RouteCost};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::cli::CopyArgs;

const PROGRESS_INTERVAL_MS: u128 = 500;

pub async fn run_copy(cfg: &NfetchConfig, args: CopyArgs) -> Result<()> {
    let name = ContentName::parse(&args.name);
    if name.is_empty() {
        bail!("content name must have at least one component");
    }
    let chunk_size = args.chunk_size.unwrap_or(cfg.chunk_size);
    if chunk_size == 0 {
        bail!("chunk size must be positive");
    }
    let target: Box<dyn Target + Send> = match (&args.output, &args.out_dir) {
        (Some(file), _) => Box::new(FileTarget::new(file)),
        (None, Some(dir)) => Box::new(DirTarget::new(dir)),
        (None, None) => bail!("one of --output or --out-dir is required"),
    };
    let source = FileSource::open(&args.source)
        .with_context(|| format!("cannot serve {}", args.source.display()))?;
    tracing::info!(
        source = %args.source.display(),
        name = %name,
        size = source.size(),
        chunk_size,
        "publishing file"
    );
    let serve = ServeSession::new(name.clone(), source, chunk_size);

    let (events_tx, events_rx) = unbounded_channel();
    let printer = tokio::spawn(print_progress(events_rx));

    let result = if args.stream {
        let every = cfg.stream_progress_every;
        follow_stream(serve, target.as_ref(), &name, chunk_size, every, events_tx)
    } else {
        fetch(cfg, &args, serve, name, chunk_size, target, events_tx).await
    };
    let _ = printer.await;

    let path = result?;
    println!("Copied {} -> {}", args.source.display(), path.display());
    Ok(())
}

async fn fetch(
    cfg: &NfetchConfig,
    args: &CopyArgs,
    serve: ServeSession<FileSource>,
    name: ContentName,
    chunk_size: u32,
    target: Box<dyn Target + Send>,
    events: tokio::sync::mpsc::UnboundedSender<FetchEvent>,
) -> Result<PathBuf> {
    let cost = args.cost.map(RouteCost).unwrap_or(RouteCost::LOCAL_NETWORK);
    let mut forwarder = Forwarder::new();
    forwarder.register_authority(name.clone(), cost, Box::new(serve));

    let mut opts = cfg.fetch_options();
    opts.chunk_size = chunk_size;
    if let Some(depth) = args.pipeline {
        opts.pipeline_depth = depth.max(1);
    }

    let (face_tx, mut face_rx) = unbounded_channel::<FaceEvent>();
    let face = LoopbackFace::new(forwarder.shared(), face_tx);
    let mut session = FetchSession::new(name, target, face, opts, events);
    let state = drive(&mut session, &mut face_rx).await?;
    if state != FetchState::Complete {
        bail!("fetch ended in state {:?}", state);
    }
    session
        .target_path()
        .map(Path::to_path_buf)
        .context("completed fetch has no target path")
}

/// Producer thread writes segments into a shared file; the follower copies
/// them into the target as progress is reported.
fn follow_stream(
    mut serve: ServeSession<FileSource>,
    target: &dyn Target,
    name: &ContentName,
    chunk_size: u32,
    progress_every: u64,
    events: tokio::sync::mpsc::UnboundedSender<FetchEvent>,
) -> Result<PathBuf> {
    let final_path = target.resolve(name)?;
    let shared_path = stream_path(&final_path);
    let writer = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(&shared_path)
        .with_context(|| format!("failed to create {}", shared_path.display()))?;
    let reader = File::open(&shared_path)
        .with_context(|| format!("failed to open {}", shared_path.display()))?;

    let result = (|| -> Result<PathBuf> {
        let Some(mut follower) =
            StreamFollower::open(target, name, chunk_size, None, reader, events)?
        else {
            bail!("{} is already being downloaded", final_path.display());
        };

        let (progress_tx, progress_rx) = std::sync::mpsc::channel::<StreamProgress>();
        let producer = std::thread::spawn(move || {
            let mut writer = writer;
            StreamWorker::new(&mut serve).run(&mut writer, 0, progress_every, |p| {
                let _ = progress_tx.send(p);
            })
        });

        let mut done = None;
        for progress in progress_rx {
            if let FollowStatus::Complete(path) = follower.on_progress(&progress)? {
                done = Some(path);
                break;
            }
        }
        let final_segment = producer
            .join()
            .map_err(|_| anyhow::anyhow!("stream producer panicked"))??;
        tracing::debug!(final_segment, "stream producer finished");
        match done {
            Some(path) => Ok(path),
            None => {
                follower.cancel();
                bail!("stream ended before every segment arrived")
            }
        }
    })();

    if let Err(e) = std::fs::remove_file(&shared_path) {
        tracing::warn!(path = %shared_path.display(), error = %e, "could not remove stream file");
    }
    result
}

fn stream_path(final_path: &Path) -> PathBuf {
    let mut s = final_path.as_os_str().to_owned();
    s.push(".stream");
    PathBuf::from(s)
}

async fn print_progress(mut events: UnboundedReceiver<FetchEvent>) {
    let mut last_print: Option<Instant> = None;
    while let Some(event) = events.recv().await {
        match event {
            FetchEvent::Progress(p) => {
                let now = Instant::now();
                let due = last_print.map_or(true, |t| {
                    now.duration_since(t).as_millis() >= PROGRESS_INTERVAL_MS
                });
                let last = p.segment_count == Some(p.segments_done);
                if due || last {
                    let total = p
                        .segment_count
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    let pct = p
                        .fraction()
                        .map(|f| format!("{:.1}%", f * 100.0))
                        .unwrap_or_else(|| "?".to_string());
                    println!(
                        "  {} / {} segments ({})  {:.2} MiB/s",
                        p.segments_done,
                        total,
                        pct,
                        p.bytes_per_sec() / 1_048_576.0
                    );
                    last_print = Some(now);
                }
            }
            FetchEvent::InterestTimeout { name, try_again } => {
                tracing::debug!(name = %name, try_again, "interest timed out");
            }
            FetchEvent::Complete { path } => {
                tracing::info!(path = %path.display(), "copy complete");
            }
            FetchEvent::Failed { error } => {
                tracing::warn!(error = %error, "copy failed");
            }
        }
    }
}
