// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::io::{self, Write};
use std::process::ExitCode;

use log::{debug, warn};

/// The outcome attached to one result line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Broken,
    Info,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "TPASS",
            Self::Fail => "TFAIL",
            Self::Broken => "TBROK",
            Self::Info => "TINFO",
        })
    }
}

/// Writes result lines and keeps the tallies that decide the exit status.
pub struct Reporter<W: Write> {
    tcid: String,
    out: W,
    count: usize,
    summary: Summary,
    errno_log: bool,
    errnos: BTreeMap<i32, usize>,
}

impl<W: Write> Reporter<W> {
    pub fn new(tcid: impl Into<String>, out: W) -> Self {
        Self {
            tcid: tcid.into(),
            out,
            count: 0,
            summary: Summary::default(),
            errno_log: false,
            errnos: BTreeMap::new(),
        }
    }

    /// Enable the errno tally printed by [`Reporter::finish`].
    pub fn log_errnos(&mut self, enable: bool) {
        self.errno_log = enable;
    }

    /// Restart result numbering; called at the top of every iteration.
    pub fn reset_count(&mut self) {
        self.count = 0;
    }

    pub fn result(&mut self, verdict: Verdict, message: impl Display) {
        self.count += 1;
        match verdict {
            Verdict::Pass => self.summary.passed += 1,
            Verdict::Fail => self.summary.failed += 1,
            Verdict::Broken => self.summary.broken += 1,
            Verdict::Info => (),
        }

        debug!("{} #{}: {} {}", self.tcid, self.count, verdict, message);
        if let Err(e) = writeln!(
            self.out,
            "{:<12}{:>4}  {}  :  {}",
            self.tcid, self.count, verdict, message
        ) {
            warn!("failed to write result line: {}", e);
        }
    }

    /// Record an errno returned by the call under test.
    pub fn errno(&mut self, code: i32) {
        if self.errno_log {
            *self.errnos.entry(code).or_default() += 1;
        }
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Print the errno tally (if enabled), flush and hand back the totals.
    pub fn finish(mut self) -> Summary {
        let errnos = std::mem::take(&mut self.errnos);
        for (code, times) in errnos {
            let msg = format!(
                "errno {} ({}) returned {} time(s)",
                code,
                io::Error::from_raw_os_error(code),
                times
            );
            self.result(Verdict::Info, msg);
        }

        if let Err(e) = self.out.flush() {
            warn!("failed to flush results: {}", e);
        }

        self.summary
    }
}

/// Totals of a run.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub broken: usize,
}

impl Summary {
    /// Bit 0 is set when anything failed, bit 1 when anything broke.
    pub fn status(&self) -> u8 {
        let mut status = 0;
        if self.failed > 0 {
            status |= 1;
        }
        if self.broken > 0 {
            status |= 2;
        }
        status
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }
}
