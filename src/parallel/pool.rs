//! Fixed-size worker pool running one unit per chunk

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crossbeam::channel::{self, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::error::{HalfsizeError, Result, TranscodeError};
use crate::parallel::chunk::Chunk;
use crate::parallel::progress::{CloseOnDrop, ProgressCounter};
use crate::processing::ImageRef;

/// An image whose transcode failed, and why
#[derive(Debug)]
pub struct TranscodeFailure {
    pub image: ImageRef,
    pub error: TranscodeError,
}

/// Aggregate result once every unit has terminated.
///
/// Both lists are sorted by image name, so the outcome does not depend on
/// which worker finished first.
#[derive(Debug)]
pub struct PoolOutcome<O = ()> {
    /// Units (chunks) dispatched
    pub units: usize,
    /// Output of every image transcoded successfully
    pub completed: Vec<(ImageRef, O)>,
    pub failures: Vec<TranscodeFailure>,
}

impl<O> PoolOutcome<O> {
    pub fn succeeded(&self) -> usize {
        self.completed.len()
    }

    pub fn attempted(&self) -> usize {
        self.completed.len() + self.failures.len()
    }
}

/// What a unit reports back for one image
enum UnitEvent<O> {
    Completed(ImageRef, O),
    Failed(TranscodeFailure),
}

enum Executor {
    /// Runs its single unit on the calling thread
    Inline,
    Threads(ThreadPool),
}

/// Runs chunks in parallel, one unit per chunk, up to `workers` at a time.
///
/// Every unit is attempted to the end of its chunk: a failing image is
/// recorded and the unit moves on. [`WorkerPool::run`] returns only after all
/// units have terminated.
pub struct WorkerPool {
    workers: usize,
    executor: Executor,
}

impl WorkerPool {
    /// Thread pool with `workers` threads
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(HalfsizeError::invalid_configuration(
                "Worker count must be greater than 0",
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("halfsize-worker-{}", index))
            .build()
            .map_err(|e| HalfsizeError::parallel(format!("Failed to build thread pool: {}", e)))?;

        info!("Initializing worker pool with {} threads", workers);

        Ok(Self {
            workers,
            executor: Executor::Threads(pool),
        })
    }

    /// Single worker that runs on the caller's thread
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            executor: Executor::Inline,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every chunk to completion.
    ///
    /// `transcode` is called once per image, never while a lock is held. Each
    /// success increments `counter`. The counter is closed on return, also on
    /// error or panic.
    pub fn run<F, O>(
        &self,
        chunks: &[Chunk<ImageRef>],
        counter: &ProgressCounter,
        transcode: F,
    ) -> Result<PoolOutcome<O>>
    where
        F: Fn(&ImageRef) -> std::result::Result<O, TranscodeError> + Sync,
        O: Send,
    {
        let _close = CloseOnDrop(counter);

        if chunks.len() > self.workers {
            return Err(HalfsizeError::invalid_configuration(format!(
                "{} chunks planned for {} workers",
                chunks.len(),
                self.workers
            )));
        }

        let start_time = Instant::now();
        let (event_tx, event_rx) = channel::unbounded();

        match &self.executor {
            Executor::Inline => {
                for chunk in chunks {
                    run_unit(chunk, &transcode, counter, &event_tx);
                }
            }
            Executor::Threads(pool) => {
                let transcode = &transcode;
                pool.scope(|scope| {
                    for chunk in chunks {
                        let event_tx = event_tx.clone();
                        scope.spawn(move |_| run_unit(chunk, transcode, counter, &event_tx));
                    }
                });
            }
        }

        drop(event_tx);
        let mut completed = Vec::new();
        let mut failures = Vec::new();
        for event in event_rx {
            match event {
                UnitEvent::Completed(image, output) => completed.push((image, output)),
                UnitEvent::Failed(failure) => failures.push(failure),
            }
        }
        completed.sort_by(|a, b| a.0.name().cmp(b.0.name()));
        failures.sort_by(|a, b| a.image.name().cmp(b.image.name()));

        let outcome = PoolOutcome {
            units: chunks.len(),
            completed,
            failures,
        };

        info!(
            "Worker pool finished {} units in {:.2}s ({} attempted, {} succeeded, {} failed)",
            outcome.units,
            start_time.elapsed().as_secs_f64(),
            outcome.attempted(),
            outcome.succeeded(),
            outcome.failures.len()
        );

        Ok(outcome)
    }
}

/// Transcode one chunk in order, isolating failures per image
fn run_unit<F, O>(
    chunk: &Chunk<ImageRef>,
    transcode: &F,
    counter: &ProgressCounter,
    events: &Sender<UnitEvent<O>>,
) where
    F: Fn(&ImageRef) -> std::result::Result<O, TranscodeError> + Sync,
{
    let start_time = Instant::now();
    let mut failed = 0usize;

    debug!("Unit {} starting ({} images)", chunk.index(), chunk.len());

    for image in chunk.items() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| transcode(image)))
            .unwrap_or_else(|payload| {
                Err(TranscodeError::Panicked {
                    path: image.input_path().to_path_buf(),
                    message: panic_message(payload.as_ref()),
                })
            });

        // Receiver outlives every unit
        match result {
            Ok(output) => {
                counter.increment();
                let _ = events.send(UnitEvent::Completed(image.clone(), output));
            }
            Err(error) => {
                failed += 1;
                warn!("Failed to process {}: {}", image.name(), error);
                let _ = events.send(UnitEvent::Failed(TranscodeFailure {
                    image: image.clone(),
                    error,
                }));
            }
        }
    }

    debug!(
        "Unit {} finished in {:.2}s ({} images, {} failed)",
        chunk.index(),
        start_time.elapsed().as_secs_f64(),
        chunk.len(),
        failed
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::chunk::ChunkPlanner;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    fn images(count: usize) -> Vec<ImageRef> {
        (0..count)
            .map(|i| {
                let name = format!("img{:02}.png", i);
                ImageRef::new(name.clone(), PathBuf::from("in").join(&name), PathBuf::from("out").join(&name))
            })
            .collect()
    }

    fn plan(count: usize, workers: usize) -> Vec<Chunk<ImageRef>> {
        ChunkPlanner::new(workers).unwrap().plan(images(count))
    }

    fn fail_on(name: &str, image: &ImageRef) -> std::result::Result<(), TranscodeError> {
        if image.name() == name {
            Err(TranscodeError::TooSmall {
                path: image.input_path().to_path_buf(),
                width: 1,
                height: 1,
            })
        } else {
            Ok(())
        }
    }

    #[test]
    fn test_pool_creation() {
        assert_eq!(WorkerPool::new(4).unwrap().workers(), 4);
        assert_eq!(WorkerPool::sequential().workers(), 1);
        assert!(matches!(
            WorkerPool::new(0),
            Err(HalfsizeError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_every_image_transcoded_once() {
        let pool = WorkerPool::new(8).unwrap();
        let counter = ProgressCounter::new();
        let seen = Mutex::new(Vec::new());

        let outcome = pool
            .run(&plan(20, 8), &counter, |image| {
                seen.lock().unwrap().push(image.name().to_string());
                Ok(())
            })
            .unwrap();

        let seen = seen.into_inner().unwrap();
        let unique: HashSet<_> = seen.iter().cloned().collect();
        assert_eq!(seen.len(), 20);
        assert_eq!(unique.len(), 20);
        assert_eq!(outcome.succeeded(), 20);
        assert_eq!(outcome.units, 7);
        assert!(outcome.failures.is_empty());
        assert_eq!(counter.get(), 20);
        assert!(counter.is_closed());
    }

    #[test]
    fn test_failure_is_isolated_to_its_file() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = ProgressCounter::new();

        let outcome = pool
            .run(&plan(10, 2), &counter, |image| fail_on("img02.png", image))
            .unwrap();

        assert_eq!(outcome.succeeded(), 9);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].image.name(), "img02.png");
        assert_eq!(outcome.attempted(), 10);
        assert_eq!(counter.get(), 9);
    }

    #[test]
    fn test_panic_is_recorded_not_propagated() {
        let pool = WorkerPool::new(3).unwrap();
        let counter = ProgressCounter::new();

        let outcome = pool
            .run(&plan(9, 3), &counter, |image| {
                if image.name() == "img04.png" {
                    panic!("decoder exploded");
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(outcome.succeeded(), 8);
        assert_eq!(outcome.failures.len(), 1);
        match &outcome.failures[0].error {
            TranscodeError::Panicked { message, .. } => assert!(message.contains("decoder exploded")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sequential_runs_in_input_order_on_caller_thread() {
        let pool = WorkerPool::sequential();
        let counter = ProgressCounter::new();
        let caller = thread::current().id();
        let order = Mutex::new(Vec::new());

        pool.run(&plan(6, 1), &counter, |image| {
            assert_eq!(thread::current().id(), caller);
            order.lock().unwrap().push(image.name().to_string());
            Ok(())
        })
        .unwrap();

        let expected: Vec<_> = images(6).iter().map(|image| image.name().to_string()).collect();
        assert_eq!(order.into_inner().unwrap(), expected);
    }

    #[test]
    fn test_too_many_chunks_rejected_and_counter_closed() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = ProgressCounter::new();

        let result = pool.run(&plan(8, 4), &counter, |_| Ok(()));

        assert!(matches!(result, Err(HalfsizeError::InvalidConfiguration { .. })));
        assert!(counter.is_closed());
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_units_run_concurrently() {
        let pool = WorkerPool::new(4).unwrap();
        let counter = ProgressCounter::new();
        let start = Instant::now();

        pool.run(&plan(4, 4), &counter, |_| {
            thread::sleep(Duration::from_millis(100));
            Ok(())
        })
        .unwrap();

        // Four 100ms units back to back would take 400ms
        assert!(start.elapsed() < Duration::from_millis(350));
    }

    #[test]
    fn test_failures_sorted_regardless_of_finish_order() {
        let pool = WorkerPool::new(4).unwrap();
        let counter = ProgressCounter::new();

        // Later chunks fail first
        let outcome = pool
            .run(&plan(8, 4), &counter, |image| -> std::result::Result<(), TranscodeError> {
                let index: u64 = image.name()[3..5].parse().unwrap();
                thread::sleep(Duration::from_millis(80 - index * 10));
                Err(TranscodeError::TooSmall {
                    path: image.input_path().to_path_buf(),
                    width: 1,
                    height: 1,
                })
            })
            .unwrap();

        let names: Vec<_> = outcome.failures.iter().map(|failure| failure.image.name()).collect();
        let expected: Vec<_> = images(8).iter().map(|image| image.name().to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_outputs_carried_per_image() {
        let pool = WorkerPool::new(3).unwrap();
        let counter = ProgressCounter::new();

        let outcome = pool
            .run(&plan(7, 3), &counter, |image| {
                fail_on("img05.png", image).map(|()| image.name().len())
            })
            .unwrap();

        assert_eq!(outcome.succeeded(), 6);
        assert_eq!(outcome.attempted(), 7);
        let names: Vec<_> = outcome.completed.iter().map(|(image, _)| image.name()).collect();
        assert_eq!(names, vec!["img00.png", "img01.png", "img02.png", "img03.png", "img04.png", "img06.png"]);
        assert!(outcome.completed.iter().all(|(_, len)| *len == 9));
    }

    #[test]
    fn test_empty_plan() {
        let outcome = WorkerPool::new(2)
            .unwrap()
            .run(&[], &ProgressCounter::new(), |_| Ok(()))
            .unwrap();
        assert!(outcome.completed.is_empty());
        assert_eq!(outcome.units, 0);
        assert_eq!(outcome.attempted(), 0);
    }
}
