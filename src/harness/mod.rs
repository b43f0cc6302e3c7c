// SPDX-License-Identifier: Apache-2.0

//! Test harness plumbing: result reporting, loop control, the temporary
//! working directory and syscall timing.

mod looping;
mod report;
mod timing;
mod workdir;

pub use looping::Looping;
pub use report::{Reporter, Summary, Verdict};
pub use timing::SyscallTimer;
pub use workdir::WorkDir;
