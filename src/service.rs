//! The path registry and the worker pool that runs read steps.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::runtime::{self, Runtime};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::Config;
use crate::job::FileJob;
use crate::observer::{Handle, Observer};
use crate::source::{absolutify, FileOpener, Opener};
use crate::subscription::{self, Subscription};
use crate::{Error, Result};

/// Runs read steps on the service's runtime, at most one per permit.
///
/// A job only ever schedules its next step at the end of the current one, so
/// steps of one job never overlap while steps of different jobs run in
/// parallel.
#[derive(Clone)]
pub(crate) enum Scheduler {
    Pool {
        runtime: runtime::Handle,
        permits: Arc<Semaphore>,
    },
    #[cfg(test)]
    Manual(Arc<Mutex<std::collections::VecDeque<Arc<FileJob>>>>),
}

impl Scheduler {
    pub(crate) fn schedule(&self, job: Arc<FileJob>) {
        match self {
            Scheduler::Pool { runtime, permits } => {
                let permits = Arc::clone(permits);
                runtime.spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        debug!(path = %job.path().display(), "service shut down, read step rejected");
                        return;
                    };
                    job.run_step().await;
                });
            }
            #[cfg(test)]
            Scheduler::Manual(queue) => queue.lock().unwrap().push_back(job),
        }
    }

    /// Rejects every step that has not started yet.
    fn close(&self) {
        match self {
            Scheduler::Pool { permits, .. } => permits.close(),
            #[cfg(test)]
            Scheduler::Manual(queue) => queue.lock().unwrap().clear(),
        }
    }
}

#[cfg(test)]
impl Scheduler {
    pub(crate) fn manual() -> Self {
        Scheduler::Manual(Arc::default())
    }

    pub(crate) fn pending(&self) -> usize {
        match self {
            Scheduler::Manual(queue) => queue.lock().unwrap().len(),
            Scheduler::Pool { .. } => unreachable!("not a manual scheduler"),
        }
    }

    /// Runs the oldest scheduled step, returning `false` if there was none.
    pub(crate) async fn run_next(&self) -> bool {
        let job = match self {
            Scheduler::Manual(queue) => queue.lock().unwrap().pop_front(),
            Scheduler::Pool { .. } => unreachable!("not a manual scheduler"),
        };
        match job {
            Some(job) => {
                job.run_step().await;
                true
            }
            None => false,
        }
    }

    pub(crate) async fn run_until_idle(&self) {
        while self.run_next().await {}
    }
}

struct Inner {
    jobs: Mutex<HashMap<PathBuf, Arc<FileJob>>>,
    opener: Arc<dyn Opener>,
    scheduler: Scheduler,
    runtime: runtime::Handle,
    config: Config,
    shut_down: AtomicBool,
}

/// Shares one read of a file among every consumer attached to it.
///
/// Each consumer receives every line of the file exactly once, in file order,
/// starting at whichever line the shared read reaches next and wrapping around
/// at end-of-file. Callbacks run on the service's runtime.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

impl Service {
    /// Creates a service on the current tokio runtime with the default config.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let runtime = runtime::Handle::try_current()?;
        Ok(Self::with_runtime(runtime, config))
    }

    pub fn with_runtime(runtime: runtime::Handle, config: Config) -> Self {
        Self::with_opener(runtime, config, FileOpener)
    }

    /// Creates a service reading paths through `opener` instead of the local
    /// filesystem.
    pub fn with_opener(runtime: runtime::Handle, config: Config, opener: impl Opener) -> Self {
        let config = config.normalized();
        let scheduler = Scheduler::Pool {
            runtime: runtime.clone(),
            permits: Arc::new(Semaphore::new(config.max_concurrent_steps)),
        };

        Service::from_parts(runtime, config, Arc::new(opener), scheduler)
    }

    fn from_parts(
        runtime: runtime::Handle,
        config: Config,
        opener: Arc<dyn Opener>,
        scheduler: Scheduler,
    ) -> Self {
        Service {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                opener,
                scheduler,
                runtime,
                config,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// The process-wide service, running on its own multi-threaded runtime
    /// with one worker thread per concurrent step.
    pub fn global() -> Result<&'static Service> {
        static GLOBAL: OnceLock<io::Result<Global>> = OnceLock::new();

        match GLOBAL.get_or_init(Global::start) {
            Ok(global) => Ok(&global.service),
            Err(err) => Err(Error::RuntimeBuild(io::Error::new(err.kind(), err.to_string()))),
        }
    }

    /// Attaches `observer` to the shared read of `path`.
    ///
    /// The returned handle is also passed to every callback. The observer is
    /// opened before this returns; lines and the close follow asynchronously.
    pub async fn attach(
        &self,
        path: impl Into<PathBuf>,
        observer: impl Observer,
    ) -> Result<Handle> {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }
        let job = self.job_for(absolutify(path));

        Ok(job.attach(Box::new(observer)).await)
    }

    /// Blocking variant of [`attach`](Self::attach) for threads outside the
    /// service's runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn attach_blocking(
        &self,
        path: impl Into<PathBuf>,
        observer: impl Observer,
    ) -> Result<Handle> {
        self.inner.runtime.block_on(self.attach(path, observer))
    }

    /// Attaches a channel-backed observer and returns it as a stream of lines.
    pub async fn subscribe(&self, path: impl Into<PathBuf>) -> Result<Subscription> {
        let (observer, receiver) = subscription::channel();
        let handle = self.attach(path, observer).await?;

        Ok(Subscription::new(handle, receiver))
    }

    /// Stops accepting read steps. Steps already executing run to completion;
    /// observers still attached are never closed. Calling this again is a no-op.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.scheduler.close();
        info!(jobs = self.job_count(), "service shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Number of paths with a registered job, dormant or not.
    pub fn job_count(&self) -> usize {
        self.jobs().len()
    }

    /// Drops dormant jobs that no attach or scheduled step refers to, and
    /// returns how many were dropped.
    pub fn prune_dormant(&self) -> usize {
        let mut jobs = self.jobs();
        let before = jobs.len();
        // With the registry locked, a job held only by the map cannot gain an
        // attach or a step.
        jobs.retain(|_, job| Arc::strong_count(job) > 1 || !job.is_dormant());
        let pruned = before - jobs.len();
        if pruned > 0 {
            debug!(pruned, remaining = jobs.len(), "pruned dormant jobs");
        }
        pruned
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<FileJob>>> {
        self.inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Finds or creates the job for `path` under one lock, so concurrent
    /// attaches to a new path agree on a single job.
    fn job_for(&self, path: PathBuf) -> Arc<FileJob> {
        let mut jobs = self.jobs();
        let job = jobs.entry(path).or_insert_with_key(|path| {
            debug!(path = %path.display(), "job created");
            Arc::new(FileJob::new(
                path.clone(),
                Arc::clone(&self.inner.opener),
                self.inner.scheduler.clone(),
                &self.inner.config,
            ))
        });

        Arc::clone(job)
    }
}

struct Global {
    // Keeps the workers alive for the life of the process.
    _runtime: Runtime,
    service: Service,
}

impl Global {
    fn start() -> io::Result<Global> {
        let config = Config::default();
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(config.max_concurrent_steps)
            .thread_name("linering-worker")
            .build()?;
        let service = Service::with_runtime(runtime.handle().clone(), config);

        Ok(Global {
            _runtime: runtime,
            service,
        })
    }
}
