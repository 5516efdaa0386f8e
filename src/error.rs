// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::io;
use thiserror::Error;

/// Errors that prevent a pipeline from starting.
///
/// Errors returned by the transformation itself are never reported here:
/// they are carried in each element's
/// [`OutputEnvelope`](crate::OutputEnvelope).
#[derive(Debug, Error)]
pub enum Error {
    /// The operating system refused to spawn a pipeline thread. Threads that
    /// were already spawned for this pipeline exit on their own.
    #[error("failed to spawn the {role} thread")]
    Spawn {
        /// Role of the thread that failed to spawn.
        role: &'static str,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Getting the available parallelism failed.
    #[error("failed to get the available parallelism")]
    AvailableParallelism(#[source] io::Error),
    /// [`CpuPinningPolicy::Always`](crate::CpuPinningPolicy::Always) was
    /// requested on a platform where pinning threads to CPUs isn't
    /// implemented.
    #[error("pinning threads to CPUs is not implemented on this platform")]
    CpuPinningUnsupported,
    /// A live stream was requested with [`i64::MAX`] as its start index,
    /// leaving no index for its first element.
    #[error("no index is available after the start index")]
    StartIndexOverflow,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let error = Error::Spawn {
            role: "worker",
            source: io::Error::new(io::ErrorKind::OutOfMemory, "no more threads"),
        };
        assert_eq!(error.to_string(), "failed to spawn the worker thread");
        assert_eq!(error.source().unwrap().to_string(), "no more threads");

        assert_eq!(
            Error::CpuPinningUnsupported.to_string(),
            "pinning threads to CPUs is not implemented on this platform"
        );
        assert_eq!(
            Error::StartIndexOverflow.to_string(),
            "no index is available after the start index"
        );
    }
}
