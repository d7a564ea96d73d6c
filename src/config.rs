//! Service configuration.
//!
//! ```
//! use linering::{Config, FailurePolicy};
//!
//! let config = Config::default()
//!     .with_block_size(512)
//!     .with_failure_policy(FailurePolicy::Notify);
//!
//! assert_eq!(config.block_size, 512);
//! assert_eq!(config.max_concurrent_steps, 8);
//! ```

/// Lines read per step when not configured otherwise.
pub const DEFAULT_BLOCK_SIZE: usize = 10_000;

/// Steps allowed to execute at once, across all paths.
pub const DEFAULT_MAX_CONCURRENT_STEPS: usize = 8;

/// What a job does when opening, reading or closing its line source fails.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Log the fault and stop scheduling steps for the job. Attached observers
    /// are left open and never notified.
    #[default]
    Swallow,
    /// Log the fault, hand it to every attached observer through
    /// [`Observer::on_error`](crate::Observer::on_error), detach them, and put
    /// the job back to dormant.
    Notify,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of lines read and delivered by a single step.
    pub block_size: usize,
    /// Maximum number of steps executing concurrently across all jobs.
    pub max_concurrent_steps: usize,
    pub failure_policy: FailurePolicy,
}

impl Config {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_concurrent_steps(mut self, max_concurrent_steps: usize) -> Self {
        self.max_concurrent_steps = max_concurrent_steps;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Zero sizes would stall every job, so both limits are raised to at least one.
    pub(crate) fn normalized(self) -> Self {
        Config {
            block_size: self.block_size.max(1),
            max_concurrent_steps: self.max_concurrent_steps.max(1),
            failure_policy: self.failure_policy,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_size: DEFAULT_BLOCK_SIZE,
            max_concurrent_steps: DEFAULT_MAX_CONCURRENT_STEPS,
            failure_policy: FailurePolicy::default(),
        }
    }
}
