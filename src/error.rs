//! Errors raised while reading a shared file or driving the service.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The line source for a path could not be opened (or re-opened for a new pass).
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    /// Reading the line that would have carried `index` failed mid-pass.
    #[error("failed to read line {index} of {}: {source}", path.display())]
    Read {
        path: PathBuf,
        index: u64,
        source: io::Error,
    },
    /// Releasing the line source at end-of-stream failed.
    #[error("failed to close {}: {source}", path.display())]
    Close { path: PathBuf, source: io::Error },
    #[error("service is shut down")]
    Shutdown,
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    #[error("failed to start runtime: {0}")]
    RuntimeBuild(io::Error),
}

impl Error {
    /// Returns the `io::ErrorKind` of the underlying fault, or `Other` for
    /// service-level errors.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Error::Open { source, .. }
            | Error::Read { source, .. }
            | Error::Close { source, .. }
            | Error::RuntimeBuild(source) => source.kind(),
            Error::Shutdown | Error::NoRuntime(_) => io::ErrorKind::Other,
        }
    }

    /// Short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Open { .. } => "open_failure",
            Error::Read { .. } => "read_failure",
            Error::Close { .. } => "close_failure",
            Error::Shutdown => "shutdown",
            Error::NoRuntime(_) => "no_runtime",
            Error::RuntimeBuild(_) => "runtime_build",
        }
    }
}

impl From<&Error> for io::Error {
    fn from(err: &Error) -> Self {
        io::Error::new(err.kind(), err.to_string())
    }
}
