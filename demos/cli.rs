// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to run example pipelines.

use clap::{Parser, ValueEnum};
use std::num::{NonZeroUsize, ParseIntError};
use std::time::Duration;
use stopmap::{CpuPinningPolicy, PoolBuilder, Signal, ThreadCount};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let pool_builder = PoolBuilder {
        concurrency: match cli.num_threads {
            Some(num_threads) => ThreadCount::Count(num_threads),
            None => ThreadCount::AvailableParallelism,
        },
        cpu_pinning: if cli.pin_cpus {
            CpuPinningPolicy::IfSupported
        } else {
            CpuPinningPolicy::No
        },
        name: "cli",
    };

    // Every `error_every`-th input isn't a number.
    let error_every = cli.error_every;
    let inputs = (1..=cli.input_size).map(move |i| {
        if error_every != 0 && i % error_every == 0 {
            format!("bad{i}")
        } else {
            i.to_string()
        }
    });

    let delay = Duration::from_millis(cli.delay_ms);
    let signal_on_error = match cli.on_error {
        OnError::Continue => Signal::Continue,
        OnError::Stop => Signal::Stop,
    };
    let transform = move |s: &String| -> (u64, Signal, Option<ParseIntError>) {
        std::thread::sleep(delay);
        match s.parse::<u64>() {
            Ok(x) => (x * x, Signal::Continue, None),
            Err(e) => (0, signal_on_error, Some(e)),
        }
    };

    match cli.mode {
        Mode::Bounded => {
            let results = match pool_builder.parallel_map(inputs.collect::<Vec<_>>(), transform) {
                Ok(results) => results.into_results(),
                Err(e) => {
                    eprintln!("Failed to run the pipeline: {e}");
                    std::process::exit(1);
                }
            };
            let num_errors = results.errors.iter().filter(|e| e.is_some()).count();
            println!(
                "processed {} of {} inputs, {num_errors} error(s), signal = {}",
                results.results.len(),
                cli.input_size,
                results.signal
            );
            println!("sum of squares = {}", results.results.iter().sum::<u64>());
        }
        Mode::Streaming => {
            let stream = match pool_builder.stream_map(0, inputs, transform) {
                Ok(stream) => stream,
                Err(e) => {
                    eprintln!("Failed to run the pipeline: {e}");
                    std::process::exit(1);
                }
            };
            for output in stream {
                println!("{output}");
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Whether to collect all the results or print them as they complete.
    #[arg(long, value_enum, default_value_t = Mode::Bounded)]
    mode: Mode,

    /// What to do when an input isn't a number.
    #[arg(long, value_enum, default_value_t = OnError::Continue)]
    on_error: OnError,

    /// Number of worker threads (defaults to the available parallelism).
    #[arg(long)]
    num_threads: Option<NonZeroUsize>,

    /// Whether to pin worker threads to CPUs.
    #[arg(long)]
    pin_cpus: bool,

    /// Number of inputs.
    #[arg(long, default_value_t = 100)]
    input_size: u64,

    /// Make every N-th input invalid (0 to disable).
    #[arg(long, default_value_t = 0)]
    error_every: u64,

    /// Simulated processing time of each input, in milliseconds.
    #[arg(long, default_value_t = 10)]
    delay_ms: u64,
}

#[derive(Clone, Debug, ValueEnum)]
enum Mode {
    Bounded,
    Streaming,
}

#[derive(Clone, Debug, ValueEnum)]
enum OnError {
    Continue,
    Stop,
}
