// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Sequential counterparts of the parallel pipelines, running on the calling
//! thread.

use crate::{OutputEnvelope, ResultsMap, Signal};

/// Transforms the inputs one after the other, stopping right after the first
/// element whose transformation doesn't return [`Signal::Continue`].
///
/// The output has the same shape as
/// [`PoolBuilder::parallel_map()`](crate::PoolBuilder::parallel_map), which
/// makes this a drop-in baseline for the parallel version.
///
/// ```
/// # use stopmap::{serial, Signal};
/// let results = serial::map(["1", "x", "3"], |s: &&str| match s.parse::<i32>() {
///     Ok(x) => (x, Signal::Continue, None),
///     Err(e) => (0, Signal::Stop, Some(e)),
/// })
/// .into_results();
/// assert_eq!(results.results, [1, 0]);
/// assert_eq!(results.signal, Signal::Stop);
/// ```
pub fn map<I, R, E, F>(inputs: I, mut transform: F) -> ResultsMap<I::Item, R, E>
where
    I: IntoIterator,
    F: FnMut(&I::Item) -> (R, Signal, Option<E>),
{
    let mut outputs = ResultsMap::new();
    for (index, payload) in (0..).zip(inputs) {
        let (result, signal, error) = transform(&payload);
        outputs.insert(OutputEnvelope {
            index,
            payload,
            signal,
            result,
            error,
        });
        if !signal.is_continue() {
            break;
        }
    }
    outputs
}

/// Folds the inputs into an accumulator, starting from `identity`.
///
/// Folding stops at the first call to `accumulator` that doesn't return
/// [`Signal::Continue`]. The returned signal and error are those of the last
/// call to `accumulator`, or [`Signal::Continue`] and no error if the input is
/// empty.
///
/// ```
/// # use stopmap::{serial, Signal};
/// let (sum, signal, error) = serial::reduce(0, 1..=10, |a, b| (a + b, Signal::Continue, None::<()>));
/// assert_eq!(sum, 55);
/// assert_eq!(signal, Signal::Continue);
/// assert_eq!(error, None);
/// ```
pub fn reduce<T, E, I, F>(identity: T, inputs: I, mut accumulator: F) -> (T, Signal, Option<E>)
where
    I: IntoIterator<Item = T>,
    F: FnMut(T, T) -> (T, Signal, Option<E>),
{
    let mut result = identity;
    let mut signal = Signal::Continue;
    let mut error = None;
    for input in inputs {
        (result, signal, error) = accumulator(result, input);
        if !signal.is_continue() {
            break;
        }
    }
    (result, signal, error)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::num::ParseIntError;

    fn parse(s: &&str, signal_on_error: Signal) -> (i32, Signal, Option<ParseIntError>) {
        match s.parse() {
            Ok(x) => (x, Signal::Continue, None),
            Err(e) => (0, signal_on_error, Some(e)),
        }
    }

    fn parse_error(s: &str) -> ParseIntError {
        s.parse::<i32>().unwrap_err()
    }

    #[test]
    fn test_map_all_successful() {
        let inputs = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        let results = map(inputs, |s| parse(s, Signal::Stop)).into_results();
        assert_eq!(results.results, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(results.errors.iter().all(Option::is_none));
        assert_eq!(results.signal, Signal::Continue);
    }

    #[test]
    fn test_map_error_with_continue() {
        let results = map(["1", "not", "3"], |s| parse(s, Signal::Continue)).into_results();
        assert_eq!(results.results, [1, 0, 3]);
        assert_eq!(results.errors, [None, Some(parse_error("not")), None]);
        assert_eq!(results.signal, Signal::Continue);
    }

    #[test]
    fn test_map_error_with_stop() {
        let inputs = ["1", "2", "3", "not_exist", "4", "5", "6"];
        let results = map(inputs, |s| parse(s, Signal::Stop)).into_results();
        assert_eq!(results.results, [1, 2, 3, 0]);
        assert_eq!(
            results.errors,
            [None, None, None, Some(parse_error("not_exist"))]
        );
        assert_eq!(results.signal, Signal::Stop);
    }

    #[test]
    fn test_map_error_at_last() {
        let results = map(["1", "2", "3", "not_exist"], |s| parse(s, Signal::Stop)).into_results();
        assert_eq!(results.results, [1, 2, 3, 0]);
        assert_eq!(results.signal, Signal::Stop);
    }

    #[test]
    fn test_map_keeps_payloads() {
        let outputs = map(["4", "2"], |s| parse(s, Signal::Stop)).into_sorted_vec();
        assert_eq!(outputs[0].payload, "4");
        assert_eq!(outputs[1].index, 1);
        assert_eq!(outputs[1].payload, "2");
    }

    #[test]
    fn test_reduce_sum() {
        let (sum, signal, error) =
            reduce(0, 1..=10, |a, b| (a + b, Signal::Continue, None::<()>));
        assert_eq!(sum, 55);
        assert_eq!(signal, Signal::Continue);
        assert!(error.is_none());
    }

    #[test]
    fn test_reduce_concat() {
        let (sentence, signal, error) = reduce(
            String::new(),
            ["hello", "go", "study"].map(String::from),
            |a, b| {
                if a.is_empty() {
                    (b, Signal::Continue, None::<()>)
                } else {
                    (a + " " + &b, Signal::Continue, None)
                }
            },
        );
        assert_eq!(sentence, "hello go study");
        assert_eq!(signal, Signal::Continue);
        assert!(error.is_none());
    }

    #[test]
    fn test_reduce_stop() {
        // Sums until the running total would overflow a byte.
        let (sum, signal, error) = reduce(0u8, [100, 100, 100, 1], |a, b| match a.checked_add(b) {
            Some(sum) => (sum, Signal::Continue, None),
            None => (a, Signal::Stop, Some("overflow")),
        });
        assert_eq!(sum, 200);
        assert_eq!(signal, Signal::Stop);
        assert_eq!(error, Some("overflow"));
    }

    #[test]
    fn test_reduce_empty() {
        let (sum, signal, error) = reduce(7, Vec::new(), |a: i32, b| (a + b, Signal::Stop, Some(())));
        assert_eq!(sum, 7);
        assert_eq!(signal, Signal::Continue);
        assert!(error.is_none());
    }
}
