//! Attaches several consumers to one file and reports how long each took to
//! see every line.
//!
//! Usage:
//!     share /path/to/file [consumers]
//!
//! Set `RUST_LOG=linering=debug` to watch consumers join and complete.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use linering::{Handle, Observer, Service};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

struct Timed {
    start: Instant,
    lines: AtomicUsize,
    done: Arc<Notify>,
}

impl Observer for Timed {
    fn on_open(&self, handle: Handle) {
        println!("[{}] open", handle);
    }

    fn on_next(&self, _handle: Handle, _line: &str) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    fn on_close(&self, handle: Handle) {
        println!(
            "[{}] close: {} lines in {:?}",
            handle,
            self.lines.load(Ordering::Relaxed),
            self.start.elapsed()
        );
        self.done.notify_one();
    }
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: share /path/to/file [consumers]")?;
    let consumers: usize = args.next().map(|n| n.parse::<usize>()).transpose()?.unwrap_or(20);

    let service = Service::new()?;
    let start = Instant::now();

    let mut waits = Vec::with_capacity(consumers);
    for _ in 0..consumers {
        let done = Arc::new(Notify::new());
        let observer = Timed {
            start: Instant::now(),
            lines: AtomicUsize::new(0),
            done: done.clone(),
        };
        service.attach(&path, observer).await?;
        waits.push(done);
    }

    for done in waits {
        done.notified().await;
    }
    println!("all {} consumers done in {:?}", consumers, start.elapsed());

    service.shutdown();
    Ok(())
}
