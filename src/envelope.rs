// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Index-tagged wrappers correlating a dispatched element with its result.

use crate::Signal;
use std::fmt;

/// An element read from the input source, tagged with its position.
pub(crate) struct InputEnvelope<T> {
    /// Position of the element in the input.
    pub(crate) index: i64,
    /// The element itself.
    pub(crate) payload: T,
}

/// The outcome of transforming one input element.
///
/// The [`index`](Self::index) always equals the index of the input element
/// this was produced from, which allows reconstructing the input order
/// regardless of the order in which workers complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputEnvelope<T, R, E> {
    /// Position of the originating element in the input.
    pub index: i64,
    /// The originating element.
    pub payload: T,
    /// Signal returned by the transformation.
    pub signal: Signal,
    /// Result returned by the transformation.
    pub result: R,
    /// Error returned by the transformation, if any.
    pub error: Option<E>,
}

impl<T, R, E> OutputEnvelope<T, R, E> {
    /// Returns true if the transformation reported an error for this element.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<T: fmt::Debug, R: fmt::Debug, E: fmt::Debug> fmt::Display for OutputEnvelope<T, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index:{}, err:{:?}, signal:{}, item:{:?}, result:{:?}",
            self.index, self.error, self.signal, self.payload, self.result
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let output = OutputEnvelope {
            index: 3,
            payload: "not",
            signal: Signal::Stop,
            result: 0,
            error: Some("invalid digit"),
        };
        assert!(output.is_error());
        assert_eq!(
            output.to_string(),
            r#"index:3, err:Some("invalid digit"), signal:stop, item:"not", result:0"#
        );
    }

    #[test]
    fn test_display_without_error() {
        let output = OutputEnvelope::<_, _, ()> {
            index: 0,
            payload: "42",
            signal: Signal::Continue,
            result: 42,
            error: None,
        };
        assert!(!output.is_error());
        assert_eq!(
            output.to_string(),
            r#"index:0, err:None, signal:continue, item:"42", result:42"#
        );
    }
}
