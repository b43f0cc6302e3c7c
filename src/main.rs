// SPDX-License-Identifier: Apache-2.0

//! `writev-probe` checks that `writev(2)` fails with `EFAULT` when the first
//! iovec points at an inaccessible page, and that the file it was aimed at
//! keeps exactly the data written before the call.

#![deny(clippy::all)]
#![warn(rust_2018_idioms)]

mod cli;
mod harness;
mod probe;
mod signal;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let app = cli::Options::parse();
    app.execute().exit_code()
}
