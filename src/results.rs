// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Index-keyed collection of outputs, reordered into the input order once
//! complete.

use crate::{OutputEnvelope, Signal};
use std::collections::HashMap;

/// Outputs of a pipeline, keyed by the index of their input element.
///
/// Workers complete in an arbitrary order, so outputs are inserted in any
/// order. The input order is only restored when converting the collection
/// with [`into_results()`](Self::into_results) or
/// [`into_sorted_vec()`](Self::into_sorted_vec).
#[derive(Clone, Debug)]
pub struct ResultsMap<T, R, E> {
    outputs: HashMap<i64, OutputEnvelope<T, R, E>>,
}

/// Results of a pipeline, in input order.
///
/// The vectors contain one entry per element that was transformed. If the
/// pipeline was stopped early, elements that were never dispatched to a
/// worker have no entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapResults<R, E> {
    /// Result of each transformed element.
    pub results: Vec<R>,
    /// Error of each transformed element.
    pub errors: Vec<Option<E>>,
    /// [`Signal::Stop`] if any element returned it, [`Signal::Continue`]
    /// otherwise.
    pub signal: Signal,
}

impl<T, R, E> Default for ResultsMap<T, R, E> {
    fn default() -> Self {
        Self {
            outputs: HashMap::new(),
        }
    }
}

impl<T, R, E> ResultsMap<T, R, E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outputs in this collection.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns true if this collection contains no output.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Inserts an output, keyed by its index.
    ///
    /// Each input element is transformed at most once, so an index is never
    /// inserted twice by a pipeline.
    pub fn insert(&mut self, output: OutputEnvelope<T, R, E>) {
        let index = output.index;
        let previous = self.outputs.insert(index, output);
        debug_assert!(previous.is_none(), "Duplicate output for index {index}");
    }

    /// Returns the output for the element at the given index, if it was
    /// transformed.
    pub fn get(&self, index: i64) -> Option<&OutputEnvelope<T, R, E>> {
        self.outputs.get(&index)
    }

    /// Returns the overall signal of the collection: [`Signal::Stop`] if any
    /// output signaled it.
    pub fn signal(&self) -> Signal {
        if self.outputs.values().any(|output| output.signal.is_stop()) {
            Signal::Stop
        } else {
            Signal::Continue
        }
    }

    /// Converts this collection into a vector of outputs sorted by index.
    pub fn into_sorted_vec(self) -> Vec<OutputEnvelope<T, R, E>> {
        let mut outputs: Vec<_> = self.outputs.into_values().collect();
        outputs.sort_unstable_by_key(|output| output.index);
        outputs
    }

    /// Converts this collection into results and errors in input order, along
    /// with the overall signal.
    ///
    /// ```
    /// # use stopmap::{OutputEnvelope, ResultsMap, Signal};
    /// let mut map = ResultsMap::new();
    /// map.insert(OutputEnvelope {
    ///     index: 1,
    ///     payload: "x",
    ///     signal: Signal::Stop,
    ///     result: 0,
    ///     error: Some("not a number"),
    /// });
    /// map.insert(OutputEnvelope {
    ///     index: 0,
    ///     payload: "7",
    ///     signal: Signal::Continue,
    ///     result: 7,
    ///     error: None,
    /// });
    ///
    /// let results = map.into_results();
    /// assert_eq!(results.results, [7, 0]);
    /// assert_eq!(results.errors, [None, Some("not a number")]);
    /// assert_eq!(results.signal, Signal::Stop);
    /// ```
    pub fn into_results(self) -> MapResults<R, E> {
        let outputs = self.into_sorted_vec();

        let mut results = Vec::with_capacity(outputs.len());
        let mut errors = Vec::with_capacity(outputs.len());
        let mut signal = Signal::Continue;
        for output in outputs {
            if output.signal.is_stop() {
                signal = Signal::Stop;
            }
            results.push(output.result);
            errors.push(output.error);
        }

        MapResults {
            results,
            errors,
            signal,
        }
    }
}

impl<T, R, E> Extend<OutputEnvelope<T, R, E>> for ResultsMap<T, R, E> {
    fn extend<I: IntoIterator<Item = OutputEnvelope<T, R, E>>>(&mut self, iter: I) {
        for output in iter {
            self.insert(output);
        }
    }
}

impl<T, R, E> FromIterator<OutputEnvelope<T, R, E>> for ResultsMap<T, R, E> {
    fn from_iter<I: IntoIterator<Item = OutputEnvelope<T, R, E>>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}
