//! In-memory line sources and a recording observer for unit tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

use crate::observer::{Handle, Observer};
use crate::source::{LineSource, Opener};
use crate::Error;

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
}

/// Serves fixed files from memory, counting opens and closes and optionally
/// failing reads or closes.
#[derive(Default)]
pub(crate) struct MemoryOpener {
    files: HashMap<PathBuf, Vec<String>>,
    fail_read_at: Option<usize>,
    fail_close: bool,
    counters: Arc<Counters>,
}

impl MemoryOpener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_file(mut self, path: impl Into<PathBuf>, lines: &[&str]) -> Self {
        let lines = lines.iter().map(|line| line.to_string()).collect();
        self.files.insert(path.into(), lines);
        self
    }

    pub(crate) fn fail_read_at(mut self, index: usize) -> Self {
        self.fail_read_at = Some(index);
        self
    }

    pub(crate) fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

impl Opener for MemoryOpener {
    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Box<dyn LineSource>>> {
        async move {
            let lines = self
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
            self.counters.opens.fetch_add(1, Ordering::SeqCst);

            Ok(Box::new(MemorySource {
                lines,
                next: 0,
                fail_read_at: self.fail_read_at,
                fail_close: self.fail_close,
                counters: self.counters.clone(),
            }) as Box<dyn LineSource>)
        }
        .boxed()
    }
}

struct MemorySource {
    lines: Vec<String>,
    next: usize,
    fail_read_at: Option<usize>,
    fail_close: bool,
    counters: Arc<Counters>,
}

impl LineSource for MemorySource {
    fn read_line(&mut self) -> BoxFuture<'_, io::Result<Option<String>>> {
        async move {
            if self.fail_read_at == Some(self.next) {
                return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
            }
            let line = self.lines.get(self.next).cloned();
            self.next += 1;
            Ok(line)
        }
        .boxed()
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, io::Result<()>> {
        async move {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(io::Error::new(io::ErrorKind::Other, "injected close failure"));
            }
            Ok(())
        }
        .boxed()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Note {
    Open,
    Next(String),
    Close,
    Error(String),
}

/// Records every callback it receives.
#[derive(Default)]
pub(crate) struct Recorder {
    notes: Mutex<Vec<Note>>,
    done: Notify,
}

impl Recorder {
    pub(crate) fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.notes()
            .into_iter()
            .filter_map(|note| match note {
                Note::Next(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.notes().last() == Some(&Note::Close)
    }

    /// Waits for `on_close` or `on_error`, panicking after five seconds.
    pub(crate) async fn wait_done(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.done.notified())
            .await
            .expect("observer was never closed");
    }

    fn push(&self, note: Note) {
        self.notes.lock().unwrap().push(note);
    }
}

impl Observer for Recorder {
    fn on_open(&self, _handle: Handle) {
        self.push(Note::Open);
    }

    fn on_next(&self, _handle: Handle, line: &str) {
        self.push(Note::Next(line.to_string()));
    }

    fn on_close(&self, _handle: Handle) {
        self.push(Note::Close);
        self.done.notify_one();
    }

    fn on_error(&self, _handle: Handle, error: &Error) {
        self.push(Note::Error(error.to_string()));
        self.done.notify_one();
    }
}
