//! Everything related to opening a path and reading it line by line.

use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::{BoxFuture, FutureExt};
use tokio::fs::{metadata, File};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

type LineReader = Lines<BufReader<File>>;

async fn new_linereader(path: &Path) -> io::Result<LineReader> {
    if metadata(path).await?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "expected a file, found a directory",
        ));
    }
    let reader = File::open(path).await?;
    let reader = BufReader::new(reader).lines();

    Ok(reader)
}

/// An open, forward-only reader over the lines of one path.
pub trait LineSource: Send {
    /// Reads the next line, or `None` at end-of-stream. Line terminators
    /// (`\n` or `\r\n`) are stripped.
    fn read_line(&mut self) -> BoxFuture<'_, io::Result<Option<String>>>;

    /// Releases the source.
    fn close(self: Box<Self>) -> BoxFuture<'static, io::Result<()>>;
}

/// Opens line sources. Every successful `open` starts again from the first
/// line of the path.
pub trait Opener: Send + Sync + 'static {
    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Box<dyn LineSource>>>;
}

/// Reads text files from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileOpener;

impl Opener for FileOpener {
    fn open<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<Box<dyn LineSource>>> {
        async move {
            let lines = new_linereader(path).await?;
            Ok(Box::new(FileSource { lines }) as Box<dyn LineSource>)
        }
        .boxed()
    }
}

struct FileSource {
    lines: LineReader,
}

impl LineSource for FileSource {
    fn read_line(&mut self) -> BoxFuture<'_, io::Result<Option<String>>> {
        self.lines.next_line().boxed()
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, io::Result<()>> {
        // Dropping the tokio file hands the descriptor back to the blocking pool.
        async move {
            drop(self);
            Ok(())
        }
        .boxed()
    }
}

/// Normalizes a path into the key its job is registered under, so that
/// spellings of the same file share a job.
///
/// Existing paths are canonicalized. For missing files the parent directory is
/// canonicalized instead, and if that fails too the path is kept as given (the
/// open will then fail when the first step runs).
pub fn absolutify(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();

    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let path = if path.is_relative() {
        match std::env::current_dir() {
            Ok(dir) => dir.join(path),
            Err(_) => return path,
        }
    } else {
        path
    };

    let joined = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().ok().map(|dir| dir.join(name)),
        _ => None,
    };

    joined.unwrap_or(path)
}
