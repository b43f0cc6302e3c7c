// SPDX-License-Identifier: Apache-2.0

use crate::cli::LoopOptions;

use std::thread::sleep;
use std::time::{Duration, Instant};

use log::{debug, info};

/// Decides how many times the test body runs.
///
/// A duration takes precedence over the iteration count. An iteration count
/// of zero loops until the process is interrupted.
#[derive(Debug, Clone, Copy)]
pub struct Looping {
    iterations: u64,
    duration: Option<Duration>,
    pause: Option<Duration>,
}

impl Looping {
    pub fn new(iterations: u64, duration: Option<Duration>, pause: Option<Duration>) -> Self {
        Self {
            iterations,
            duration,
            pause,
        }
    }
}

impl From<&LoopOptions> for Looping {
    fn from(opts: &LoopOptions) -> Self {
        Self::new(opts.iterations, opts.duration, opts.pause)
    }
}

impl IntoIterator for Looping {
    type Item = u64;
    type IntoIter = Iterations;

    fn into_iter(self) -> Iterations {
        Iterations {
            looping: self,
            lc: 0,
            started: None,
        }
    }
}

/// Yields the loop counter, pausing between consecutive iterations.
#[derive(Debug)]
pub struct Iterations {
    looping: Looping,
    lc: u64,
    started: Option<Instant>,
}

impl Iterations {
    fn more(&mut self) -> bool {
        let started = *self.started.get_or_insert_with(Instant::now);
        match self.looping.duration {
            Some(duration) => started.elapsed() < duration,
            None => self.looping.iterations == 0 || self.lc < self.looping.iterations,
        }
    }
}

impl Iterator for Iterations {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if !self.more() {
            info!("finished after {} iteration(s)", self.lc);
            return None;
        }

        if self.lc > 0 {
            if let Some(pause) = self.looping.pause.filter(|p| !p.is_zero()) {
                debug!("pausing {:?} before iteration {}", pause, self.lc);
                sleep(pause);
            }
        }

        let lc = self.lc;
        self.lc += 1;
        Some(lc)
    }
}
