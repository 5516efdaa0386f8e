// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;

/// Directive returned by a transformation alongside its result, deciding
/// whether the pipeline keeps accepting new work.
///
/// A [`Signal`] is independent of the element's error: an element can fail
/// and still return [`Signal::Continue`], or succeed and return
/// [`Signal::Stop`] (e.g. once the item being searched for has been found).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Keep processing subsequent elements, even if this one failed.
    #[default]
    Continue,
    /// Halt the whole pipeline after this element.
    Stop,
}

impl Signal {
    /// Returns true if this is [`Signal::Continue`].
    pub fn is_continue(self) -> bool {
        self == Signal::Continue
    }

    /// Returns true if this is [`Signal::Stop`].
    pub fn is_stop(self) -> bool {
        self == Signal::Stop
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Continue => f.write_str("continue"),
            Signal::Stop => f.write_str("stop"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Continue.to_string(), "continue");
        assert_eq!(Signal::Stop.to_string(), "stop");
    }

    #[test]
    fn test_signal_default_is_continue() {
        assert_eq!(Signal::default(), Signal::Continue);
        assert!(Signal::default().is_continue());
        assert!(!Signal::default().is_stop());
        assert!(Signal::Stop.is_stop());
    }
}
