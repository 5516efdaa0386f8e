// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::core::sync::SharedContext;
use crate::macros::log_error;
use crate::{OutputEnvelope, ResultsMap};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Live stream of the outputs of a pipeline, in completion order.
///
/// The stream ends once all the workers have exited, which happens when the
/// input is exhausted or when the pipeline is stopped. Dropping the stream
/// stops the pipeline.
///
/// ```
/// # use stopmap::{PoolBuilder, Signal};
/// let (sender, receiver) = crossbeam_channel::unbounded();
/// let stream = PoolBuilder::default()
///     .stream_map(0, receiver, |x: &u64| (x * x, Signal::Continue, None::<()>))
///     .unwrap();
///
/// for x in 1..=4 {
///     sender.send(x).unwrap();
/// }
/// drop(sender);
///
/// let mut squares: Vec<u64> = stream.map(|output| output.result).collect();
/// squares.sort();
/// assert_eq!(squares, [1, 4, 9, 16]);
/// ```
#[must_use = "a pipeline stops when its output stream is dropped"]
pub struct OutputStream<T, R, E> {
    /// Queue of outputs, closed by the coordinator after all workers exited.
    outputs: Receiver<OutputEnvelope<T, R, E>>,
    /// Number of worker threads spawned for this pipeline.
    num_workers: usize,
    /// Context shared with the pipeline threads.
    shared_context: Arc<SharedContext>,
}

impl<T, R, E> OutputStream<T, R, E> {
    pub(crate) fn new(
        outputs: Receiver<OutputEnvelope<T, R, E>>,
        num_workers: usize,
        shared_context: Arc<SharedContext>,
    ) -> Self {
        Self {
            outputs,
            num_workers,
            shared_context,
        }
    }

    /// Number of worker threads spawned for this pipeline.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Requests the pipeline to stop.
    ///
    /// Elements that are already being transformed still produce an output,
    /// so the stream should be drained to observe them.
    pub fn stop(&self) {
        self.shared_context.stop();
    }

    /// Returns true once the pipeline is stopped, either by a transformation
    /// or by [`stop()`](Self::stop).
    pub fn is_stopped(&self) -> bool {
        self.shared_context.is_stopped()
    }

    /// Drains the stream into a collection keyed by input index.
    ///
    /// # Panics
    ///
    /// Panics if any worker thread or the producer thread panicked.
    pub fn collect_results(self) -> ResultsMap<T, R, E> {
        self.collect()
    }
}

impl<T, R, E> Iterator for OutputStream<T, R, E> {
    type Item = OutputEnvelope<T, R, E>;

    /// Waits for the next output.
    ///
    /// # Panics
    ///
    /// Panics at the end of the stream if any worker thread or the producer
    /// thread panicked.
    fn next(&mut self) -> Option<Self::Item> {
        match self.outputs.recv() {
            Ok(output) => Some(output),
            Err(_) => {
                if let Some(message) = self.shared_context.panic_message() {
                    log_error!("{message}");
                    panic!("{message}");
                }
                None
            }
        }
    }
}

impl<T, R, E> Drop for OutputStream<T, R, E> {
    fn drop(&mut self) {
        self.shared_context.stop();
    }
}
