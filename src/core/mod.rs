// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Core engine: producer, workers, coordinator and the stop flag they share.

mod pool;
mod producer;
pub(crate) mod sync;
mod worker;

pub use pool::{CpuPinningPolicy, PoolBuilder, ThreadCount};
