//! Progress tracking for parallel operations

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, trace};

use crate::config::{ProgressConfig, MIN_POLL_INTERVAL_MS};

/// Count of images fully transcoded, shared by all workers of one run.
///
/// Only ever incremented. The pool closes it once every unit has stopped,
/// whether or not the count reached the total.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    completed: AtomicUsize,
    closed: AtomicBool,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished image, returning the new count
    pub fn increment(&self) -> usize {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn get(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Mark that no further increments will happen
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Closes a counter when dropped, including during unwinding
pub(crate) struct CloseOnDrop<'a>(pub(crate) &'a ProgressCounter);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Renders progress by polling a [`ProgressCounter`], and times the run
pub struct ProgressReporter {
    bar: ProgressBar,
    poll_interval: Duration,
    started: Instant,
}

impl ProgressReporter {
    /// Start the run clock. The bar length is set when observation begins.
    pub fn start(config: &ProgressConfig) -> Self {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        if !config.enabled {
            return Self::hidden(poll_interval);
        }

        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        Self {
            bar,
            poll_interval: poll_interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS)),
            started: Instant::now(),
        }
    }

    /// Reporter that draws nothing
    pub fn hidden(poll_interval: Duration) -> Self {
        Self {
            bar: ProgressBar::hidden(),
            poll_interval: poll_interval.max(Duration::from_millis(MIN_POLL_INTERVAL_MS)),
            started: Instant::now(),
        }
    }

    /// Block until `counter` reaches `total` or is closed.
    ///
    /// Reads the counter once per poll interval and sleeps in between.
    /// Returns the last value read.
    pub fn observe(&self, counter: &ProgressCounter, total: usize) -> usize {
        self.bar.set_length(total as u64);
        debug!("Observing {} images every {:?}", total, self.poll_interval());
        let mut last = 0;

        loop {
            // Read closed before the count, so a close seen here covers every increment
            let closed = counter.is_closed();
            let current = counter.get();
            debug_assert!(current >= last, "progress counter went backwards");

            if current != last {
                trace!("Progress {}/{}", current, total);
                self.bar.set_position(current as u64);
                last = current;
            }

            if current >= total || closed {
                break;
            }

            thread::sleep(self.poll_interval);
        }

        self.bar.finish();
        debug!("Progress observation finished at {}/{}", last, total);
        last
    }

    /// Time since [`ProgressReporter::start`]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
