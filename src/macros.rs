// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Internal logging macros, forwarding to the [`log`](https://docs.rs/log)
//! crate when the `log` feature is enabled and expanding to nothing
//! otherwise.
//!
//! Per-item and per-worker statistics are only logged with the
//! `log_parallelism` feature, as they are too verbose for general debugging.

macro_rules! log_debug {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log")]
        log::debug!( $($args)* );
    }};
}

macro_rules! log_error {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log")]
        log::error!( $($args)* );
    }};
}

macro_rules! log_warn {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log")]
        log::warn!( $($args)* );
    }};
}

macro_rules! log_info {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log_parallelism")]
        log::info!( $($args)* );
    }};
}

macro_rules! log_trace {
    ( $($args:tt)* ) => {{
        #[cfg(feature = "log_parallelism")]
        log::trace!( $($args)* );
    }};
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_trace;
pub(crate) use log_warn;
