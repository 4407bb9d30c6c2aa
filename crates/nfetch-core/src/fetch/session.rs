//! The consumer state machine.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;

use crate::name::ContentName;
use crate::pending::PendingTracker;
use crate::retry::{ErrorKind, RetryDecision};
use crate::segment_table::{Opened, SegmentTable};
use crate::target::Target;
use crate::transport::{Data, Face, Interest};
use crate::watcher::{CompletionWatcher, WatchStatus};

use super::download::Download;
use super::{FetchError, FetchEvent, FetchOptions, FetchState};

/// Fetches one named piece of content into a [`Target`].
///
/// Driven entirely through `&mut self` calls: [`start`](Self::start), then one
/// of [`on_data`](Self::on_data) / [`on_timeout`](Self::on_timeout) /
/// [`on_nack`](Self::on_nack) per face event, and [`tick`](Self::tick) for
/// deferred retries and watching. Every method that fails leaves the session
/// `Failed` and emits [`FetchEvent::Failed`].
pub struct FetchSession<F: Face> {
    face: F,
    target: Box<dyn Target + Send>,
    opts: FetchOptions,
    events: UnboundedSender<FetchEvent>,
    requested_name: ContentName,
    /// Known once the first response arrives (or from a resumed table).
    qualified_name: Option<ContentName>,
    /// Name of the outstanding first request while awaiting it.
    first_request: Option<ContentName>,
    /// Table locked at start for targets with a known path.
    early_table: Option<SegmentTable>,
    download: Option<Download>,
    watcher: Option<CompletionWatcher>,
    tracker: PendingTracker,
    /// Next segment index the pipeline considers.
    frontier: u64,
    /// Final segment as learned from responses.
    final_segment: Option<u64>,
    /// Segments answered with a Nack before the final segment was known.
    nacked: Vec<u64>,
    restart_after_watch: bool,
    state: FetchState,
}

impl<F: Face> FetchSession<F> {
    pub fn new(
        requested_name: ContentName,
        target: Box<dyn Target + Send>,
        face: F,
        opts: FetchOptions,
        events: UnboundedSender<FetchEvent>,
    ) -> Self {
        FetchSession {
            face,
            target,
            opts,
            events,
            requested_name,
            qualified_name: None,
            first_request: None,
            early_table: None,
            download: None,
            watcher: None,
            tracker: PendingTracker::new(),
            frontier: 0,
            final_segment: None,
            nacked: Vec::new(),
            restart_after_watch: false,
            state: FetchState::Idle,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            FetchState::Complete | FetchState::Cancelled | FetchState::Failed
        )
    }

    pub fn requested_name(&self) -> &ContentName {
        &self.requested_name
    }

    pub fn qualified_name(&self) -> Option<&ContentName> {
        self.qualified_name.as_ref()
    }

    pub fn final_segment(&self) -> Option<u64> {
        self.final_segment
    }

    /// Output path once known.
    pub fn target_path(&self) -> Option<&Path> {
        self.download
            .as_ref()
            .map(Download::path)
            .or_else(|| self.watcher.as_ref().map(CompletionWatcher::target))
            .or_else(|| self.target.known_path())
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_pending(&self, name: &ContentName) -> bool {
        self.tracker.contains(name)
    }

    /// When the next deferred retry is due.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.tracker.next_due()
    }

    pub fn options(&self) -> &FetchOptions {
        &self.opts
    }

    pub fn face(&self) -> &F {
        &self.face
    }

    pub fn face_mut(&mut self) -> &mut F {
        &mut self.face
    }

    pub fn start(&mut self) -> Result<(), FetchError> {
        if self.state != FetchState::Idle {
            return Err(FetchError::InvalidState(self.state));
        }
        let r = self.begin();
        self.guard(r)
    }

    pub fn on_data(&mut self, interest: &ContentName, data: Data) -> Result<(), FetchError> {
        let r = self.handle_data(interest, data);
        self.guard(r)
    }

    pub fn on_timeout(&mut self, interest: &ContentName) -> Result<(), FetchError> {
        let r = self.handle_timeout(interest);
        self.guard(r)
    }

    pub fn on_nack(&mut self, interest: &ContentName) -> Result<(), FetchError> {
        let r = self.handle_nack(interest);
        self.guard(r)
    }

    /// Express deferred retries that are due and poll the watcher.
    pub fn tick(&mut self, now: Instant) -> Result<(), FetchError> {
        let r = self.handle_tick(now);
        self.guard(r)
    }

    /// Check whether the download we are waiting on has ended; restart if so.
    pub fn poll_watcher(&mut self) -> Result<(), FetchError> {
        let r = self.check_watcher();
        self.guard(r)
    }

    /// Stop. Outstanding interests are withdrawn; the part file and segment
    /// table stay on disk for a later attempt.
    pub fn cancel(&mut self) {
        if self.is_finished() {
            return;
        }
        self.withdraw_all();
        self.release_storage();
        self.watcher = None;
        self.state = FetchState::Cancelled;
        tracing::info!(name = %self.requested_name, "fetch cancelled");
    }

    fn begin(&mut self) -> Result<(), FetchError> {
        if let Some(path) = self.target.known_path().map(Path::to_path_buf) {
            let table = match SegmentTable::open(&path)? {
                Opened::Conflict => {
                    self.enter_watching(&path);
                    return Ok(());
                }
                Opened::Locked(table) => table,
            };
            match Download::resume(&path, table, self.opts.chunk_size)? {
                Ok(download) => return self.resume(download),
                Err(table) => self.early_table = Some(table),
            }
        }

        let first = match (&self.qualified_name, self.restart_after_watch) {
            (Some(qn), true) => qn.clone().append_segment(0),
            _ => self.requested_name.clone(),
        };
        self.state = FetchState::AwaitingFirstSegment;
        self.first_request = Some(first.clone());
        tracing::info!(name = %first, "requesting first segment");
        self.express(first)
    }

    fn resume(&mut self, download: Download) -> Result<(), FetchError> {
        self.qualified_name = download.qualified_name().cloned();
        self.final_segment = download.final_segment();
        self.frontier = download.first_incomplete().unwrap_or(0);
        self.download = Some(download);
        self.state = FetchState::Fetching;
        self.advance()
    }

    fn handle_data(&mut self, interest: &ContentName, data: Data) -> Result<(), FetchError> {
        match self.state {
            FetchState::AwaitingFirstSegment => {
                if self.first_request.as_ref() != Some(interest) || self.tracker.resolve(interest).is_none() {
                    tracing::debug!(name = %interest, "ignoring unexpected response");
                    return Ok(());
                }
                self.first_request = None;
                self.on_first_segment(data)
            }
            FetchState::Fetching => {
                let Some(pending) = self.tracker.resolve(interest) else {
                    tracing::debug!(name = %interest, "ignoring duplicate response");
                    return Ok(());
                };
                let Some(index) = pending.segment() else {
                    return Ok(());
                };
                if data.segment() != Some(index) {
                    tracing::warn!(
                        interest = %interest,
                        data = %data.name,
                        "response name does not match request, asking again"
                    );
                    let again = pending.interest.clone();
                    self.tracker.retrack(pending, None);
                    self.face.express_interest(&again)?;
                    return Ok(());
                }
                if let Some(f) = data.final_block_id {
                    self.learn_final(f)?;
                }
                if self.final_segment.is_some_and(|f| index > f) {
                    tracing::debug!(segment = index, "dropping segment past the end");
                    return Ok(());
                }
                self.save(index, &data.content)?;
                self.advance()
            }
            _ => {
                tracing::debug!(name = %interest, state = ?self.state, "ignoring response");
                Ok(())
            }
        }
    }

    fn on_first_segment(&mut self, data: Data) -> Result<(), FetchError> {
        let qualified_name = data.name.without_segment();
        let index = data.segment().unwrap_or(0);
        let final_segment = data.final_block_id;
        tracing::info!(
            requested = %self.requested_name,
            qualified = %qualified_name,
            final_segment = ?final_segment,
            "first segment received"
        );

        let path = self.target.resolve(&qualified_name)?;
        let table = match self.early_table.take() {
            Some(table) => table,
            None => match SegmentTable::open(&path)? {
                Opened::Locked(table) => table,
                Opened::Conflict => {
                    self.qualified_name = Some(qualified_name);
                    self.enter_watching(&path);
                    return Ok(());
                }
            },
        };

        let download = Download::prepare(
            &path,
            table,
            &qualified_name,
            self.opts.chunk_size,
            final_segment,
        )?;
        self.qualified_name = Some(qualified_name);
        self.final_segment = download.final_segment();
        self.frontier = 0;
        self.download = Some(download);
        self.state = FetchState::Fetching;

        if self.final_segment.map_or(true, |f| index <= f) {
            self.save(index, &data.content)?;
        }
        self.advance()
    }

    fn handle_timeout(&mut self, interest: &ContentName) -> Result<(), FetchError> {
        if !matches!(
            self.state,
            FetchState::AwaitingFirstSegment | FetchState::Fetching
        ) {
            return Ok(());
        }
        let Some(pending) = self.tracker.timeout(interest) else {
            return Ok(());
        };
        let decision = self.opts.retry.decide(pending.attempt, ErrorKind::Timeout);
        let try_again = decision != RetryDecision::NoRetry;
        tracing::debug!(name = %interest, attempt = pending.attempt, try_again, "interest timed out");
        self.emit(FetchEvent::InterestTimeout {
            name: interest.clone(),
            try_again,
        });
        match decision {
            RetryDecision::NoRetry => Err(FetchError::RetriesExhausted {
                name: interest.clone(),
                attempts: pending.attempt,
            }),
            RetryDecision::RetryAfter(delay) if delay.is_zero() => {
                let again = pending.interest.clone();
                self.tracker.retrack(pending, None);
                self.face.express_interest(&again)?;
                Ok(())
            }
            RetryDecision::RetryAfter(delay) => {
                self.tracker.retrack(pending, Some(Instant::now() + delay));
                Ok(())
            }
        }
    }

    fn handle_nack(&mut self, interest: &ContentName) -> Result<(), FetchError> {
        let Some(pending) = self.tracker.resolve(interest) else {
            return Ok(());
        };
        if self.state == FetchState::AwaitingFirstSegment {
            return Err(FetchError::NotFound(interest.clone()));
        }
        let index = pending.segment().unwrap_or(0);
        match self.final_segment {
            Some(f) if index > f => {
                tracing::debug!(segment = index, "nack past the end");
                Ok(())
            }
            Some(_) => Err(FetchError::NotFound(interest.clone())),
            None => {
                self.nacked.push(index);
                if self.tracker.is_empty() {
                    return self.settle_end();
                }
                Ok(())
            }
        }
    }

    /// Everything outstanding was nacked and no final marker ever came. The
    /// content ends just before the lowest nacked segment if everything below
    /// it is on disk and nothing past it is; otherwise a segment is missing.
    fn settle_end(&mut self) -> Result<(), FetchError> {
        let Some(&lowest) = self.nacked.iter().min() else {
            return Ok(());
        };
        let contiguous = self
            .download
            .as_ref()
            .is_some_and(|d| d.first_incomplete() == Some(lowest) && d.completed_count() == lowest);
        if lowest == 0 || !contiguous {
            return Err(FetchError::NotFound(self.qualified().append_segment(lowest)));
        }
        tracing::info!(final_segment = lowest - 1, "no final marker, content ends before first missing segment");
        self.learn_final(lowest - 1)?;
        self.advance()
    }

    fn handle_tick(&mut self, now: Instant) -> Result<(), FetchError> {
        match self.state {
            FetchState::Watching => self.check_watcher(),
            FetchState::AwaitingFirstSegment | FetchState::Fetching => {
                for interest in self.tracker.take_due(now) {
                    tracing::debug!(name = %interest.name, "expressing deferred retry");
                    self.face.express_interest(&interest)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn check_watcher(&mut self) -> Result<(), FetchError> {
        let Some(watcher) = &self.watcher else {
            return Ok(());
        };
        match watcher.poll()? {
            WatchStatus::Pending => Ok(()),
            WatchStatus::Released(reason) => {
                tracing::info!(?reason, name = %self.requested_name, "restarting after watch");
                self.watcher = None;
                self.restart_after_watch = true;
                self.final_segment = None;
                self.nacked.clear();
                self.state = FetchState::Idle;
                self.begin()
            }
        }
    }

    fn enter_watching(&mut self, path: &Path) {
        self.withdraw_all();
        self.watcher = Some(CompletionWatcher::watch(path));
        self.state = FetchState::Watching;
    }

    fn learn_final(&mut self, final_segment: u64) -> Result<(), FetchError> {
        if self.final_segment == Some(final_segment) {
            return Ok(());
        }
        tracing::debug!(final_segment, "final segment learned");
        self.final_segment = Some(final_segment);
        if let Some(d) = self.download.as_mut() {
            d.learn_final(final_segment)?;
        }
        for p in self.tracker.withdraw_beyond(final_segment) {
            self.face.remove_pending_interest(&p.interest.name);
        }
        if let Some(&missing) = self.nacked.iter().find(|&&i| i <= final_segment) {
            let name = self.qualified().append_segment(missing);
            return Err(FetchError::NotFound(name));
        }
        Ok(())
    }

    fn save(&mut self, index: u64, content: &[u8]) -> Result<(), FetchError> {
        let Some(download) = self.download.as_mut() else {
            return Ok(());
        };
        if download.store(index, content)? {
            let progress = download.progress();
            self.emit(FetchEvent::Progress(progress));
        }
        Ok(())
    }

    /// Finish if everything is on disk, otherwise top up the pipeline.
    fn advance(&mut self) -> Result<(), FetchError> {
        if self.download.as_ref().is_some_and(Download::is_full) {
            return self.finish();
        }
        self.fill_pipeline()
    }

    fn fill_pipeline(&mut self) -> Result<(), FetchError> {
        let Some(download) = self.download.as_ref() else {
            return Ok(());
        };
        let qualified = self.qualified();
        let mut batch = Vec::new();
        while self.tracker.len() + batch.len() < self.opts.pipeline_depth {
            let index = self.frontier;
            if self.final_segment.is_some_and(|f| index > f) {
                break;
            }
            self.frontier += 1;
            if download.is_complete(index) || self.nacked.contains(&index) {
                continue;
            }
            let name = qualified.clone().append_segment(index);
            if !self.tracker.contains(&name) {
                batch.push(name);
            }
        }
        for name in batch {
            self.express(name)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FetchError> {
        let Some(download) = self.download.take() else {
            return Ok(());
        };
        self.withdraw_all();
        let path: PathBuf = download.finalize()?;
        self.state = FetchState::Complete;
        self.emit(FetchEvent::Complete { path });
        Ok(())
    }

    fn express(&mut self, name: ContentName) -> Result<(), FetchError> {
        let interest = self.interest_for(name);
        if !self.tracker.track(interest.clone()) {
            return Ok(());
        }
        tracing::trace!(name = %interest.name, "expressing interest");
        self.face.express_interest(&interest)?;
        Ok(())
    }

    fn interest_for(&self, name: ContentName) -> Interest {
        Interest::new(name).with_lifetime(self.opts.interest_lifetime)
    }

    fn qualified(&self) -> ContentName {
        self.qualified_name
            .clone()
            .unwrap_or_else(|| self.requested_name.clone())
    }

    fn withdraw_all(&mut self) {
        for p in self.tracker.drain() {
            self.face.remove_pending_interest(&p.interest.name);
        }
    }

    fn release_storage(&mut self) {
        if let Some(download) = self.download.take() {
            download.abandon();
        }
        if let Some(table) = self.early_table.take() {
            table.release();
        }
    }

    fn guard(&mut self, r: Result<(), FetchError>) -> Result<(), FetchError> {
        if let Err(e) = &r {
            if !self.is_finished() {
                tracing::warn!(name = %self.requested_name, error = %e, "fetch failed");
                self.withdraw_all();
                self.release_storage();
                self.watcher = None;
                self.state = FetchState::Failed;
                self.emit(FetchEvent::Failed {
                    error: e.to_string(),
                });
            }
        }
        r
    }

    fn emit(&self, event: FetchEvent) {
        let _ = self.events.send(event);
    }
}
