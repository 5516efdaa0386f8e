// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Worker threads, applying the transformation to input envelopes.

use super::sync::{PanicNotifier, SharedContext, ThreadRole};
use crate::envelope::{InputEnvelope, OutputEnvelope};
use crate::macros::{log_debug, log_info, log_trace};
use crate::Signal;
use crossbeam_channel::{select, Receiver, Sender};
use std::sync::Arc;

/// Context object owned by a worker thread.
pub struct Worker<T, R, E, F> {
    /// Worker index.
    pub id: usize,
    /// Queue of input envelopes, shared with the other workers.
    pub inputs: Receiver<InputEnvelope<T>>,
    /// Queue of output envelopes, shared with the other workers.
    pub outputs: Sender<OutputEnvelope<T, R, E>>,
    /// Context shared with the rest of the pipeline.
    pub shared_context: Arc<SharedContext>,
    /// Transformation to apply to each element.
    pub transform: Arc<F>,
}

impl<T, R, E, F> Worker<T, R, E, F>
where
    F: Fn(&T) -> (R, Signal, Option<E>),
{
    /// Main function run by this thread. Returns the number of elements that
    /// this worker transformed.
    ///
    /// The loop exits once the input queue is closed and drained, once the
    /// pipeline is stopped, or right after the transformation returned a
    /// non-[`Continue`](Signal::Continue) signal.
    pub fn run(self) -> usize {
        let id = self.id;
        let _notifier = PanicNotifier {
            role: ThreadRole::Worker(id),
            shared_context: &self.shared_context,
        };

        let mut num_processed = 0;
        loop {
            if self.shared_context.is_stopped() {
                log_debug!("[worker {id}] Pipeline stopped, exiting.");
                break;
            }

            let input = select! {
                recv(self.inputs) -> input => match input {
                    Ok(input) => input,
                    Err(_) => {
                        log_debug!("[worker {id}] Input queue closed, exiting.");
                        break;
                    }
                },
                recv(self.shared_context.done()) -> _ => {
                    log_debug!("[worker {id}] Pipeline stopped while waiting for input, exiting.");
                    break;
                }
            };
            // The flag may have been raised while this envelope was in flight.
            if self.shared_context.is_stopped() {
                log_debug!(
                    "[worker {id}] Pipeline stopped, dropping element #{}.",
                    input.index
                );
                break;
            }

            let (result, signal, error) = (self.transform)(&input.payload);
            num_processed += 1;
            log_trace!(
                "[worker {id}] Transformed element #{} (signal: {signal}, error: {}).",
                input.index,
                error.is_some()
            );

            let output = OutputEnvelope {
                index: input.index,
                payload: input.payload,
                signal,
                result,
                error,
            };
            if self.outputs.send(output).is_err() {
                log_debug!("[worker {id}] Output queue has no consumer anymore, stopping.");
                self.shared_context.stop();
                break;
            }

            if !signal.is_continue() {
                log_debug!("[worker {id}] Received the {signal} signal, stopping the pipeline.");
                self.shared_context.stop();
                break;
            }
        }

        log_info!("[worker {id}] Transformed {num_processed} element(s).");
        num_processed
    }
}
