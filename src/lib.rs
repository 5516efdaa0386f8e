// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]

mod core;
mod envelope;
mod error;
mod macros;
mod results;
pub mod serial;
mod signal;
mod stream;

pub use crate::core::{CpuPinningPolicy, PoolBuilder, ThreadCount};
pub use envelope::OutputEnvelope;
pub use error::Error;
pub use results::{MapResults, ResultsMap};
pub use signal::Signal;
use std::num::NonZeroUsize;
pub use stream::OutputStream;

/// Transforms all the given inputs on `concurrency` worker threads, and
/// collects the outputs keyed by input index.
///
/// This is a shortcut for [`PoolBuilder::parallel_map()`] with the default
/// configuration and the given concurrency.
///
/// ```
/// # use stopmap::Signal;
/// # use std::num::NonZeroUsize;
/// let inputs = vec!["1", "2", "x", "4"];
/// let results = stopmap::parallel_map(inputs, NonZeroUsize::try_from(2).unwrap(), |s: &&str| {
///     match s.parse::<i32>() {
///         Ok(x) => (x, Signal::Continue, None),
///         Err(e) => (-1, Signal::Continue, Some(e)),
///     }
/// })
/// .unwrap()
/// .into_results();
///
/// assert_eq!(results.results, [1, 2, -1, 4]);
/// assert!(results.errors[2].is_some());
/// assert_eq!(results.signal, Signal::Continue);
/// ```
pub fn parallel_map<I, T, R, E, F>(
    inputs: I,
    concurrency: NonZeroUsize,
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
    PoolBuilder {
        concurrency: ThreadCount::Count(concurrency),
        ..PoolBuilder::default()
    }
    .parallel_map(inputs, transform)
}

/// Transforms elements from a live source on `concurrency` worker threads,
/// returning the outputs in completion order. Elements are indexed from
/// `start_index + 1`.
///
/// This is a shortcut for [`PoolBuilder::stream_map()`] with the default
/// configuration and the given concurrency.
pub fn stream_map<S, T, R, E, F>(
    concurrency: NonZeroUsize,
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
    PoolBuilder {
        concurrency: ThreadCount::Count(concurrency),
        ..PoolBuilder::default()
    }
    .stream_map(start_index, source, transform)
}
