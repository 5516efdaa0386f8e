// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Pool configuration, and the coordinator launching the producer and the
//! workers of a pipeline.

use super::producer::Producer;
use super::sync::SharedContext;
use super::worker::Worker;
use crate::envelope::OutputEnvelope;
use crate::macros::{log_debug, log_error, log_info, log_warn};
use crate::{Error, OutputStream, ResultsMap, Signal};
use crossbeam_channel::Sender;
// Platforms that support `libc::sched_setaffinity()`.
#[cfg(all(
    not(miri),
    any(
        target_os = "android",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "linux"
    )
))]
use nix::{
    sched::{sched_setaffinity, CpuSet},
    unistd::Pid,
};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Number of worker threads to spawn for a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl ThreadCount {
    /// Resolves the number of threads to spawn.
    pub fn count(self) -> Result<NonZeroUsize, Error> {
        match self {
            ThreadCount::AvailableParallelism => {
                std::thread::available_parallelism().map_err(Error::AvailableParallelism)
            }
            ThreadCount::Count(count) => Ok(count),
        }
    }
}

impl TryFrom<usize> for ThreadCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(thread_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(thread_count)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Policy to pin worker threads to CPUs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuPinningPolicy {
    /// Don't pin worker threads to CPUs.
    No,
    /// Pin each worker thread to a CPU, if CPU pinning is supported and
    /// implemented on this platform.
    IfSupported,
    /// Pin each worker thread to a CPU. If CPU pinning isn't supported on this
    /// platform (or not implemented), starting a pipeline fails with
    /// [`Error::CpuPinningUnsupported`], and a worker that fails to pin itself
    /// panics.
    Always,
}

/// Configuration of the worker pool running a pipeline.
///
/// Each call to [`parallel_map()`](Self::parallel_map) or
/// [`stream_map()`](Self::stream_map) spawns a fresh set of threads, which
/// all exit by the time the output has been fully consumed.
///
/// ```
/// # use stopmap::{CpuPinningPolicy, PoolBuilder, Signal, ThreadCount};
/// let pool_builder = PoolBuilder {
///     concurrency: ThreadCount::try_from(4).unwrap(),
///     cpu_pinning: CpuPinningPolicy::No,
///     name: "doubler",
/// };
///
/// let results = pool_builder
///     .parallel_map(vec![1, 2, 3, 4, 5], |x: &i32| (2 * x, Signal::Continue, None::<()>))
///     .unwrap()
///     .into_results();
/// assert_eq!(results.results, [2, 4, 6, 8, 10]);
/// assert_eq!(results.signal, Signal::Continue);
/// ```
#[derive(Clone, Debug)]
pub struct PoolBuilder {
    /// Number of worker threads to spawn.
    pub concurrency: ThreadCount,
    /// Policy to pin worker threads to CPUs.
    pub cpu_pinning: CpuPinningPolicy,
    /// Prefix of the spawned threads' names.
    pub name: &'static str,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self {
            concurrency: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::No,
            name: "stopmap",
        }
    }
}

impl PoolBuilder {
    /// Transforms all the given inputs in parallel, and collects the outputs
    /// keyed by input index.
    ///
    /// No more workers than inputs are spawned. If a transformation returns
    /// [`Signal::Stop`], the remaining inputs are abandoned: the returned
    /// map only contains the elements that were dispatched to a worker
    /// before the stop propagated.
    ///
    /// # Panics
    ///
    /// Panics if any worker thread or the producer thread panicked, once all
    /// the other workers have exited.
    pub fn parallel_map<I, T, R, E, F>(
        &self,
        inputs: I,
        transform: F,
    ) -> Result<ResultsMap<T, R, E>, Error>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator + Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(&T) -> (R, Signal, Option<E>) + Send + Sync + 'static,
    {
        Ok(match self.start_bounded(inputs.into_iter(), transform)? {
            Some(stream) => stream.collect_results(),
            None => ResultsMap::new(),
        })
    }

    /// Transforms elements from a live source in parallel, returning the
    /// outputs in completion order.
    ///
    /// Elements are tagged with indices `start_index + 1`, `start_index + 2`,
    /// and so on. The source can be any iterator, for example a
    /// [`crossbeam_channel::Receiver`]. The source is never closed by the
    /// pipeline: once stopped, the pipeline drops the next element pulled
    /// from it and stops relaying.
    ///
    /// Fails with [`Error::StartIndexOverflow`] if `start_index` is
    /// [`i64::MAX`]. Otherwise relaying ends after the element tagged with
    /// [`i64::MAX`].
    pub fn stream_map<S, T, R, E, F>(
        &self,
        start_index: i64,
        source: S,
        transform: F,
    ) -> Result<OutputStream<T, R, E>, Error>
    where
        S: IntoIterator<Item = T>,
        S::IntoIter: Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(&T) -> (R, Signal, Option<E>) + Send + Sync + 'static,
    {
        let first_index = start_index
            .checked_add(1)
            .ok_or(Error::StartIndexOverflow)?;
        let num_workers = self.concurrency.count()?.get();
        self.start(num_workers, source.into_iter(), first_index, transform)
    }

    /// Starts a pipeline over a finite input, with no more workers than
    /// input elements. Returns `None` without spawning anything if the input
    /// is empty.
    fn start_bounded<I, T, R, E, F>(
        &self,
        source: I,
        transform: F,
    ) -> Result<Option<OutputStream<T, R, E>>, Error>
    where
        I: ExactSizeIterator<Item = T> + Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(&T) -> (R, Signal, Option<E>) + Send + Sync + 'static,
    {
        let input_len = source.len();
        if input_len == 0 {
            log_debug!("[{}] Empty input, nothing to do.", self.name);
            return Ok(None);
        }

        let num_workers = self.concurrency.count()?.get().min(input_len);
        self.start(num_workers, source, 0, transform).map(Some)
    }

    /// Spawns the workers, the coordinator and the producer of a pipeline.
    ///
    /// If a thread fails to spawn, the pipeline is stopped so that the threads
    /// already spawned exit on their own.
    fn start<I, T, R, E, F>(
        &self,
        num_workers: usize,
        source: I,
        first_index: i64,
        transform: F,
    ) -> Result<OutputStream<T, R, E>, Error>
    where
        I: Iterator<Item = T> + Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(&T) -> (R, Signal, Option<E>) + Send + Sync + 'static,
    {
        self.check_cpu_pinning()?;

        let shared_context = Arc::new(SharedContext::new());
        let (input_sender, input_receiver) = crossbeam_channel::bounded(num_workers);
        let (output_sender, output_receiver) = crossbeam_channel::bounded(num_workers);
        let transform = Arc::new(transform);

        let mut workers = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let worker = Worker {
                id,
                inputs: input_receiver.clone(),
                outputs: output_sender.clone(),
                shared_context: shared_context.clone(),
                transform: transform.clone(),
            };
            let cpu_pinning = self.cpu_pinning;
            let handle = spawn(format!("{}-worker-{id}", self.name), "worker", move || {
                pin_to_cpu(id, cpu_pinning);
                worker.run()
            })
            .inspect_err(|_| {
                shared_context.stop();
            })?;
            workers.push(handle);
        }
        drop(input_receiver);
        log_debug!("[{}] Spawned {num_workers} worker(s).", self.name);

        let coordinator = Coordinator {
            name: self.name,
            workers,
            outputs: output_sender,
            shared_context: shared_context.clone(),
        };
        spawn(format!("{}-coordinator", self.name), "coordinator", move || {
            coordinator.run()
        })
        .inspect_err(|_| {
            shared_context.stop();
        })?;

        let producer = Producer {
            source,
            first_index,
            inputs: input_sender,
            shared_context: shared_context.clone(),
        };
        spawn(format!("{}-producer", self.name), "producer", move || {
            producer.run()
        })
        .inspect_err(|_| {
            shared_context.stop();
        })?;

        Ok(OutputStream::new(output_receiver, num_workers, shared_context))
    }

    /// Rejects [`CpuPinningPolicy::Always`] on platforms without CPU pinning.
    fn check_cpu_pinning(&self) -> Result<(), Error> {
        #[cfg(any(
            miri,
            not(any(
                target_os = "android",
                target_os = "dragonfly",
                target_os = "freebsd",
                target_os = "linux"
            ))
        ))]
        match self.cpu_pinning {
            CpuPinningPolicy::No => (),
            CpuPinningPolicy::IfSupported => {
                log_warn!("Pinning threads to CPUs is not implemented on this platform.")
            }
            CpuPinningPolicy::Always => return Err(Error::CpuPinningUnsupported),
        }
        Ok(())
    }
}

/// Spawns a named thread.
fn spawn<Ret: Send + 'static>(
    name: String,
    role: &'static str,
    f: impl FnOnce() -> Ret + Send + 'static,
) -> Result<JoinHandle<Ret>, Error> {
    std::thread::Builder::new()
        .name(name)
        .spawn(f)
        .map_err(|source| {
            log_error!("Failed to spawn the {role} thread: {source}");
            Error::Spawn { role, source }
        })
}

/// Pins the current worker thread to the CPU with the same index, according
/// to the given policy.
#[cfg_attr(
    any(
        miri,
        not(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        ))
    ),
    allow(unused_variables)
)]
fn pin_to_cpu(id: usize, cpu_pinning: CpuPinningPolicy) {
    #[cfg(all(
        not(miri),
        any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        )
    ))]
    match cpu_pinning {
        CpuPinningPolicy::No => (),
        CpuPinningPolicy::IfSupported => {
            let mut cpu_set = CpuSet::new();
            if let Err(_e) = cpu_set.set(id) {
                log_warn!("Failed to set CPU affinity for worker #{id}: {_e}");
            } else if let Err(_e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                log_warn!("Failed to set CPU affinity for worker #{id}: {_e}");
            } else {
                log_debug!("Pinned worker #{id} to CPU #{id}");
            }
        }
        CpuPinningPolicy::Always => {
            let mut cpu_set = CpuSet::new();
            if let Err(e) = cpu_set.set(id) {
                panic!("Failed to set CPU affinity for worker #{id}: {e}");
            } else if let Err(e) = sched_setaffinity(Pid::from_raw(0), &cpu_set) {
                panic!("Failed to set CPU affinity for worker #{id}: {e}");
            } else {
                log_debug!("Pinned worker #{id} to CPU #{id}");
            }
        }
    }
}

/// Context object owned by the coordinator thread, which closes the output
/// queue once all the workers have exited.
struct Coordinator<T, R, E> {
    /// Prefix of the pipeline's thread names.
    name: &'static str,
    /// Handles to all the worker threads, returning how many elements each
    /// worker transformed.
    workers: Vec<JoinHandle<usize>>,
    /// The coordinator's handle to the output queue. The queue is closed when
    /// the last handle is dropped, and the workers drop theirs before
    /// exiting, so this one is the last.
    outputs: Sender<OutputEnvelope<T, R, E>>,
    /// Context shared with the rest of the pipeline.
    shared_context: Arc<SharedContext>,
}

impl<T, R, E> Coordinator<T, R, E> {
    /// Main function run by this thread.
    #[allow(clippy::unused_enumerate_index)]
    fn run(self) {
        let Coordinator {
            name: _name,
            workers,
            outputs,
            shared_context: _shared_context,
        } = self;

        log_debug!("[{_name}] Waiting for {} worker(s) to exit...", workers.len());
        let mut _num_processed = 0;
        for (_id, worker) in workers.into_iter().enumerate() {
            match worker.join() {
                Ok(count) => {
                    log_debug!("[{_name}] Worker {_id} exited after {count} element(s).");
                    _num_processed += count;
                }
                Err(_) => log_error!("[{_name}] Worker {_id} panicked."),
            }
        }
        log_info!(
            "[{_name}] All workers exited after {_num_processed} element(s), stopped early: {}.",
            _shared_context.is_stopped()
        );

        drop(outputs);
        log_debug!("[{_name}] Closed the output queue.");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn test_thread_count_try_from_usize() {
        assert!(ThreadCount::try_from(0).is_err());
        assert_eq!(
            ThreadCount::try_from(1),
            Ok(ThreadCount::Count(NonZeroUsize::try_from(1).unwrap()))
        );
    }

    #[test]
    fn test_thread_count_available_parallelism() {
        assert_eq!(
            ThreadCount::AvailableParallelism.count().unwrap(),
            std::thread::available_parallelism().unwrap()
        );
        assert_eq!(
            ThreadCount::try_from(4).unwrap().count().unwrap(),
            NonZeroUsize::try_from(4).unwrap()
        );
    }

    /// Runs a pipeline recording the names of the worker threads that
    /// transformed at least one element.
    fn worker_names(pool_builder: &PoolBuilder, input_len: usize) -> HashSet<String> {
        let names = Arc::new(Mutex::new(HashSet::new()));
        let results = pool_builder
            .parallel_map(0..input_len, {
                let names = names.clone();
                move |x: &usize| {
                    let name = std::thread::current().name().unwrap().to_owned();
                    names.lock().unwrap().insert(name);
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    (*x, Signal::Continue, None::<()>)
                }
            })
            .unwrap();
        assert_eq!(results.len(), input_len);

        // All the workers have exited, so this is the last reference.
        Arc::into_inner(names).unwrap().into_inner().unwrap()
    }

    #[test]
    fn test_concurrency_clamped_to_input_len() {
        let pool_builder = PoolBuilder {
            concurrency: ThreadCount::try_from(16).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
            name: "clamped",
        };
        let names = worker_names(&pool_builder, 3);
        assert!(!names.is_empty());
        assert!(names.len() <= 3);
        for name in names {
            let id: usize = name.strip_prefix("clamped-worker-").unwrap().parse().unwrap();
            assert!(id < 3, "unexpected worker {name}");
        }
    }

    #[test]
    fn test_bounded_spawns_at_most_input_len_workers() {
        let pool_builder = PoolBuilder {
            concurrency: ThreadCount::try_from(16).unwrap(),
            cpu_pinning: CpuPinningPolicy::No,
            name: "clamped",
        };
        let stream = pool_builder
            .start_bounded(0..3usize, |x: &usize| (*x, Signal::Continue, None::<()>))
            .unwrap()
            .unwrap();
        assert_eq!(stream.num_workers(), 3);
        assert_eq!(stream.collect_results().len(), 3);

        let stream = pool_builder
            .start_bounded(0..100usize, |x: &usize| (*x, Signal::Continue, None::<()>))
            .unwrap()
            .unwrap();
        assert_eq!(stream.num_workers(), 16);
        assert_eq!(stream.collect_results().len(), 100);

        let stream = pool_builder
            .start_bounded(Vec::<usize>::new().into_iter(), |x: &usize| {
                (*x, Signal::Continue, None::<()>)
            })
            .unwrap();
        assert!(stream.is_none());
    }

    #[test]
    fn test_stream_map_start_index_overflow() {
        let result = PoolBuilder::default().stream_map(i64::MAX, 0..5u32, |x: &u32| {
            (*x, Signal::Continue, None::<()>)
        });
        assert!(matches!(result, Err(Error::StartIndexOverflow)));
    }

    #[test]
    fn test_stream_map_ends_at_last_index() {
        let stream = PoolBuilder::default()
            .stream_map(i64::MAX - 2, 0..5u32, |x: &u32| {
                (*x, Signal::Continue, None::<()>)
            })
            .unwrap();
        let mut indices: Vec<_> = stream.map(|output| output.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, [i64::MAX - 1, i64::MAX]);
    }

    #[test]
    fn test_empty_input_spawns_nothing() {
        let results = PoolBuilder::default()
            .parallel_map(Vec::<u8>::new(), |_: &u8| -> (u8, Signal, Option<()>) {
                unreachable!()
            })
            .unwrap();
        assert!(results.is_empty());

        let results = results.into_results();
        assert!(results.results.is_empty());
        assert!(results.errors.is_empty());
        assert_eq!(results.signal, Signal::Continue);
    }

    #[test]
    fn test_build_pool_cpu_pinning_if_supported() {
        let pool_builder = PoolBuilder {
            concurrency: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::IfSupported,
            name: "pinned",
        };
        let results = pool_builder
            .parallel_map((1..=10).collect::<Vec<i32>>(), |x: &i32| {
                (*x, Signal::Continue, None::<()>)
            })
            .unwrap()
            .into_results();
        assert_eq!(results.results.iter().sum::<i32>(), 5 * 11);
    }

    #[cfg(all(
        not(miri),
        any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        )
    ))]
    #[test]
    fn test_build_pool_cpu_pinning_always() {
        let pool_builder = PoolBuilder {
            concurrency: ThreadCount::try_from(1).unwrap(),
            cpu_pinning: CpuPinningPolicy::Always,
            name: "pinned",
        };
        let results = pool_builder
            .parallel_map((1..=10).collect::<Vec<i32>>(), |x: &i32| {
                (*x, Signal::Continue, None::<()>)
            })
            .unwrap()
            .into_results();
        assert_eq!(results.results.iter().sum::<i32>(), 5 * 11);
    }

    #[cfg(any(
        miri,
        not(any(
            target_os = "android",
            target_os = "dragonfly",
            target_os = "freebsd",
            target_os = "linux"
        ))
    ))]
    #[test]
    fn test_build_pool_cpu_pinning_always_not_supported() {
        let pool_builder = PoolBuilder {
            concurrency: ThreadCount::AvailableParallelism,
            cpu_pinning: CpuPinningPolicy::Always,
            name: "pinned",
        };
        let result = pool_builder.parallel_map((1..=10).collect::<Vec<i32>>(), |x: &i32| {
            (*x, Signal::Continue, None::<()>)
        });
        assert!(matches!(result, Err(Error::CpuPinningUnsupported)));
    }
}
