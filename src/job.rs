//! The shared read state of one path.
//!
//! Lines of a file are not ordered with respect to the consumers reading them,
//! so a [`FileJob`] treats the file as a ring. It keeps accepting consumers and
//! keeps re-reading the file from the start until every attached consumer has
//! seen the whole ring exactly once, starting wherever it joined.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, trace};

use crate::config::{Config, FailurePolicy};
use crate::observer::{Handle, Observer};
use crate::service::Scheduler;
use crate::source::{LineSource, Opener};
use crate::{Error, Result};

/// Index of the line that follows `index`, where `None` means "before the
/// first line".
fn next_index(index: Option<u64>) -> u64 {
    index.map_or(0, |index| index + 1)
}

/// One consumer's progress around the ring.
struct Entry {
    handle: Handle,
    observer: Box<dyn Observer>,
    first_index: u64,
    last_index: Option<u64>,
}

impl Entry {
    fn new(observer: Box<dyn Observer>, first_index: u64) -> Self {
        Entry {
            handle: Handle::next(),
            observer,
            first_index,
            last_index: None,
        }
    }

    /// Called once per line read, and once with `None` at end-of-stream. The
    /// end-of-stream call is what completes an entry that joined at index 0.
    fn accept_line(&mut self, line: Option<(u64, &str)>) {
        match line {
            Some((index, line)) => {
                self.observer.on_next(self.handle, line);
                self.last_index = Some(index);
            }
            None => self.last_index = None,
        }
    }

    /// Complete once the next line would be the one this entry started at.
    fn is_complete(&self) -> bool {
        next_index(self.last_index) == self.first_index
    }
}

struct JobState {
    /// Index of the last line read in the current pass.
    cursor: Option<u64>,
    entries: Vec<Entry>,
    source: Option<Box<dyn LineSource>>,
}

impl JobState {
    /// Hands a line (or the end-of-stream marker) to every entry, detaching
    /// the ones that complete. Entry order is stable for the whole call.
    fn deliver(&mut self, path: &Path, line: Option<(u64, &str)>) {
        self.entries.retain_mut(|entry| {
            entry.accept_line(line);
            if !entry.is_complete() {
                return true;
            }
            debug!(
                path = %path.display(),
                handle = %entry.handle,
                first_index = entry.first_index,
                last_index = ?entry.last_index,
                "circular read complete"
            );
            entry.observer.on_close(entry.handle);
            false
        });
    }
}

pub(crate) struct FileJob {
    path: PathBuf,
    opener: Arc<dyn Opener>,
    scheduler: Scheduler,
    block_size: usize,
    failure_policy: FailurePolicy,
    state: Mutex<JobState>,
}

impl FileJob {
    pub(crate) fn new(
        path: PathBuf,
        opener: Arc<dyn Opener>,
        scheduler: Scheduler,
        config: &Config,
    ) -> Self {
        FileJob {
            path,
            opener,
            scheduler,
            block_size: config.block_size.max(1),
            failure_policy: config.failure_policy,
            state: Mutex::new(JobState {
                cursor: None,
                entries: Vec::new(),
                source: None,
            }),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Adds a consumer that will see every line once, starting with the next
    /// line this job reads. The first consumer of a dormant job starts a pass.
    pub(crate) async fn attach(self: &Arc<Self>, observer: Box<dyn Observer>) -> Handle {
        let mut state = self.state.lock().await;

        let entry = Entry::new(observer, next_index(state.cursor));
        let handle = entry.handle;
        if entry.first_index != 0 {
            debug!(
                path = %self.path.display(),
                %handle,
                first_index = entry.first_index,
                "circular read started mid-file"
            );
        }

        // Still locked, so no step can deliver a line before this.
        entry.observer.on_open(handle);
        state.entries.push(entry);

        if state.entries.len() == 1 {
            // First consumer: wrap around as if the previous pass just ended.
            if let Err(err) = self.end_of_stream(&mut state, None).await {
                self.handle_failure(&mut state, err);
            }
        }

        handle
    }

    /// Reads and delivers up to one block of lines, then either schedules the
    /// next step or wraps around. Runs with the job locked throughout.
    pub(crate) async fn run_step(self: Arc<Self>) {
        let mut state = self.state.lock().await;
        if let Err(err) = self.read_block(&mut state).await {
            self.handle_failure(&mut state, err);
        }
    }

    /// Dormant jobs hold no source and have nobody attached.
    pub(crate) fn is_dormant(&self) -> bool {
        self.state
            .try_lock()
            .map(|state| state.entries.is_empty() && state.source.is_none())
            .unwrap_or(false)
    }

    async fn read_block(self: &Arc<Self>, state: &mut JobState) -> Result<()> {
        let mut source = match state.source.take() {
            Some(source) => source,
            None => {
                let source = self.opener.open(&self.path).await.map_err(|source| Error::Open {
                    path: self.path.clone(),
                    source,
                })?;
                debug!(path = %self.path.display(), entries = state.entries.len(), "pass opened");
                source
            }
        };

        let mut read_count = 0;
        while read_count < self.block_size && !state.entries.is_empty() {
            let index = next_index(state.cursor);
            let line = source.read_line().await.map_err(|err| Error::Read {
                path: self.path.clone(),
                index,
                source: err,
            })?;

            match line {
                Some(line) => {
                    read_count += 1;
                    state.cursor = Some(index);
                    state.deliver(&self.path, Some((index, line.as_str())));
                }
                None => {
                    state.cursor = None;
                    state.deliver(&self.path, None);
                    return self.end_of_stream(state, Some(source)).await;
                }
            }
        }
        trace!(path = %self.path.display(), read_count, "block read");

        if state.entries.is_empty() {
            // Every ring ended mid-file; force the close-out.
            self.end_of_stream(state, Some(source)).await
        } else {
            state.source = Some(source);
            self.scheduler.schedule(Arc::clone(self));
            Ok(())
        }
    }

    /// Closes the current pass. If anyone is still attached, a step is
    /// scheduled that reopens the path from its first line; otherwise the job
    /// goes dormant.
    async fn end_of_stream(
        self: &Arc<Self>,
        state: &mut JobState,
        source: Option<Box<dyn LineSource>>,
    ) -> Result<()> {
        state.cursor = None;

        if let Some(source) = source.or_else(|| state.source.take()) {
            source.close().await.map_err(|source| Error::Close {
                path: self.path.clone(),
                source,
            })?;
            debug!(path = %self.path.display(), "pass closed");
        }

        if state.entries.is_empty() {
            debug!(path = %self.path.display(), "job dormant");
        } else {
            self.scheduler.schedule(Arc::clone(self));
        }

        Ok(())
    }

    fn handle_failure(&self, state: &mut JobState, err: Error) {
        error!(
            path = %self.path.display(),
            kind = err.as_label(),
            entries = state.entries.len(),
            "read step failed: {}",
            err
        );

        match self.failure_policy {
            FailurePolicy::Swallow => {}
            FailurePolicy::Notify => {
                state.cursor = None;
                state.source = None;
                for entry in state.entries.drain(..) {
                    entry.observer.on_error(entry.handle, &err);
                }
                debug!(path = %self.path.display(), "job dormant");
            }
        }
    }
}
