//! A library providing shared, circular line reads of a file for many
//! concurrent consumers.
//!
//! Every consumer attached to a path receives every line of the file exactly
//! once, in file order, no matter when it attached. Consumers that attach while
//! a read is under way join it: they start at the next line read and wrap
//! around through end-of-file back to where they joined. At most one read of a
//! path is in flight at a time, however many consumers are attached.
//!
//! ## Example
//!
//! ```no_run
//! use linering::Service;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), linering::Error> {
//!     let service = Service::new()?;
//!
//!     // Both subscriptions share a single read of the file.
//!     let mut first = service.subscribe("some/file.log").await?;
//!     let mut second = service.subscribe("some/file.log").await?;
//!
//!     while let Ok(Some(line)) = first.next_line().await {
//!         println!("first: {}", line);
//!     }
//!     while let Ok(Some(line)) = second.next_line().await {
//!         println!("second: {}", line);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Caveats
//!
//! Delivery is synchronous: callbacks run on the service's worker threads with
//! the file's job locked, and there is no back-pressure towards slow consumers.
//! If the file changes length between passes, a consumer that joined past the
//! new end never completes.

mod config;
mod error;
mod job;
mod observer;
mod service;
mod source;
mod subscription;

#[cfg(test)]
mod test_util;

pub use config::{Config, FailurePolicy, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CONCURRENT_STEPS};
pub use error::{Error, Result};
pub use observer::{Handle, Observer};
pub use service::Service;
pub use source::{absolutify, FileOpener, LineSource, Opener};
pub use subscription::Subscription;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
