// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display};
use std::time::{Duration, Instant};

/// Accumulates wall-clock durations of repeated calls.
#[derive(Debug, Default)]
pub struct SyscallTimer {
    count: u32,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

impl SyscallTimer {
    pub fn time<T>(&mut self, call: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let ret = call();
        self.record(start.elapsed());
        ret
    }

    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |min| min.min(elapsed)));
        self.max = self.max.max(elapsed);
    }

    pub fn stats(&self) -> Option<Stats> {
        Some(Stats {
            count: self.count,
            min: self.min?,
            max: self.max,
            mean: self.total / self.count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub count: u32,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
}

impl Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} call(s), min {:?}, max {:?}, mean {:?}",
            self.count, self.min, self.max, self.mean
        )
    }
}
