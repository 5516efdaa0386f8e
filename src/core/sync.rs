// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Synchronization primitives shared by the producer, the workers and the
//! coordinator of one pipeline invocation.

use crate::macros::{log_debug, log_error};
use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Context shared between all the threads of a pipeline.
///
/// A fresh context is created for each invocation, so the stop flag never
/// needs to be reset.
pub struct SharedContext {
    /// Whether the pipeline must stop accepting new work.
    stopped: CachePadded<AtomicBool>,
    /// Number of worker threads that panicked.
    num_panicking_workers: CachePadded<AtomicUsize>,
    /// Whether the producer thread panicked.
    producer_panicked: CachePadded<AtomicBool>,
    /// Sending half of the "done" channel. Nothing is ever sent on it: it is
    /// dropped when the pipeline stops, which disconnects
    /// [`done`](Self::done).
    done_sender: Mutex<Option<Sender<()>>>,
    /// Receiving half of the "done" channel, ready as soon as the pipeline
    /// stops.
    done: Receiver<()>,
}

impl SharedContext {
    /// Creates a context in the running state.
    pub fn new() -> Self {
        let (done_sender, done) = crossbeam_channel::bounded(0);
        Self {
            stopped: CachePadded::new(AtomicBool::new(false)),
            num_panicking_workers: CachePadded::new(AtomicUsize::new(0)),
            producer_panicked: CachePadded::new(AtomicBool::new(false)),
            done_sender: Mutex::new(Some(done_sender)),
            done,
        }
    }

    /// Returns true once [`stop()`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Raises the stop flag, waking up any thread blocked on
    /// [`done()`](Self::done).
    ///
    /// Returns true if this call is the one that raised the flag.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        log_debug!("Stop flag raised, notifying the pipeline threads.");
        // A poisoned mutex still holds a valid `Option`.
        self.done_sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        true
    }

    /// A channel that never receives any message but disconnects once the
    /// pipeline is stopped. Meant to be used in a
    /// [`select!`](crossbeam_channel::select) next to a blocking operation.
    pub fn done(&self) -> &Receiver<()> {
        &self.done
    }

    /// Returns the number of worker threads that panicked so far.
    pub fn num_panicking_workers(&self) -> usize {
        self.num_panicking_workers.load(Ordering::SeqCst)
    }

    /// Returns true if the producer thread panicked.
    pub fn producer_panicked(&self) -> bool {
        self.producer_panicked.load(Ordering::SeqCst)
    }

    /// Returns the message to re-raise on the consumer side, if any pipeline
    /// thread panicked.
    pub fn panic_message(&self) -> Option<String> {
        let num_panicking_workers = self.num_panicking_workers();
        if num_panicking_workers != 0 {
            Some(format!("{num_panicking_workers} worker thread(s) panicked!"))
        } else if self.producer_panicked() {
            Some("The producer thread panicked!".to_owned())
        } else {
            None
        }
    }
}

/// Role of a pipeline thread watched by a [`PanicNotifier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadRole {
    /// The producer thread.
    Producer,
    /// The worker thread with the given index.
    Worker(usize),
}

impl fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadRole::Producer => write!(f, "producer"),
            ThreadRole::Worker(id) => write!(f, "worker {id}"),
        }
    }
}

/// Object whose destructor records that a pipeline thread panicked, and stops
/// the pipeline in that case.
///
/// The panic is recorded before the stop flag is raised, so any thread woken
/// up by the stop observes it.
pub struct PanicNotifier<'a> {
    /// Role of the thread holding this notifier.
    pub role: ThreadRole,
    /// Context of the pipeline this thread belongs to.
    pub shared_context: &'a SharedContext,
}

impl Drop for PanicNotifier<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log_error!(
                "[{}] Detected panic in this thread, stopping the pipeline",
                self.role
            );
            match self.role {
                ThreadRole::Producer => self
                    .shared_context
                    .producer_panicked
                    .store(true, Ordering::SeqCst),
                ThreadRole::Worker(_) => {
                    self.shared_context
                        .num_panicking_workers
                        .fetch_add(1, Ordering::SeqCst);
                }
            }
            self.shared_context.stop();
        }
    }
}
