// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Producer thread, tagging input elements with their index and feeding them
//! to the workers.

use super::sync::{PanicNotifier, SharedContext, ThreadRole};
use crate::envelope::InputEnvelope;
use crate::macros::{log_debug, log_info, log_warn};
use crossbeam_channel::{select, Sender};
use std::sync::Arc;

/// Context object owned by the producer thread.
///
/// The same producer serves both input modes: a finite sequence starts at
/// index 0, a live source starts right after the caller's start index. In
/// both cases the source is read strictly in order, so the envelopes sent
/// always carry consecutive indices starting at `first_index`.
pub struct Producer<I: Iterator> {
    /// Elements to feed to the workers.
    pub source: I,
    /// Index of the first element of the source.
    pub first_index: i64,
    /// Queue of input envelopes. Dropping it signals the workers that the
    /// input is exhausted.
    pub inputs: Sender<InputEnvelope<I::Item>>,
    /// Context shared with the rest of the pipeline.
    pub shared_context: Arc<SharedContext>,
}

impl<I: Iterator> Producer<I> {
    /// Main function run by this thread. Returns the number of envelopes sent
    /// to the workers.
    ///
    /// Once the pipeline is stopped, the remaining elements are never sent.
    /// An element pulled from the source after the stop is simply dropped.
    /// Relaying also ends after the element tagged with [`i64::MAX`], as no
    /// index is left for the next one.
    pub fn run(self) -> usize {
        let Producer {
            source,
            first_index,
            inputs,
            shared_context,
        } = self;
        // Declared after `inputs`, so that a panic is recorded before the
        // input queue closes.
        let _notifier = PanicNotifier {
            role: ThreadRole::Producer,
            shared_context: &shared_context,
        };

        let mut index = first_index;
        let mut num_sent = 0;
        for payload in source {
            if shared_context.is_stopped() {
                log_debug!("[producer] Pipeline stopped, dropping element #{index} and the rest.");
                break;
            }

            let input = InputEnvelope { index, payload };
            select! {
                send(inputs, input) -> result => if result.is_err() {
                    log_debug!("[producer] All workers exited, stopping.");
                    break;
                },
                recv(shared_context.done()) -> _ => {
                    log_debug!("[producer] Pipeline stopped while sending element #{index}.");
                    break;
                }
            }
            num_sent += 1;

            index = match index.checked_add(1) {
                Some(next_index) => next_index,
                None => {
                    log_warn!("[producer] Reached the last representable index, closing the input.");
                    break;
                }
            };
        }

        log_info!("[producer] Sent {num_sent} element(s).");
        // Dropping `inputs` closes the input queue.
        num_sent
    }
}
