// SPDX-License-Identifier: Apache-2.0

use crate::harness::{Looping, Reporter, Summary, Verdict};
use crate::probe::{self, Config, TCID};

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Args, Parser};
use log::{error, info};

/// Probe `writev(2)` with an inaccessible first iovec
///
/// The probe fills a fresh file with one 8 KiB chunk of zeros, rewinds it and
/// calls `writev()` with a first segment pointing at a `PROT_NONE` page. The
/// call must fail with `EFAULT` and must not extend the file.
#[derive(Parser, Debug)]
#[clap(version)]
pub struct Options {
    /// Logging options
    #[clap(flatten)]
    logger: LogOptions,

    /// Loop control
    #[clap(flatten)]
    looping: LoopOptions,

    /// Print a tally of every errno the probed call returned.
    #[clap(short = 'e', long)]
    errno_log: bool,

    /// Time each `writev()` call and print statistics at the end.
    #[clap(short = 't', long)]
    timing: bool,

    /// Base name of the target file; the process id is appended.
    #[clap(long, default_value = "writev_data_file")]
    base_name: String,

    /// Directory in which the per-run working directory is created.
    #[clap(long, env = "TMPDIR")]
    tmpdir: Option<PathBuf>,

    /// Keep going with the all-ones address if the inaccessible page
    /// cannot be mapped.
    #[clap(long)]
    tolerate_map_failure: bool,
}

impl Options {
    pub fn execute(self) -> Summary {
        self.logger.init();

        info!("logging initialized!");
        info!("CLI opts: {:?}", self);

        let mut reporter = Reporter::new(TCID, std::io::stdout());
        reporter.log_errnos(self.errno_log);

        let config = Config {
            base_name: self.base_name,
            tmpdir: self.tmpdir,
            tolerate_map_failure: self.tolerate_map_failure,
            timing: self.timing,
        };

        if let Err(e) = probe::run(config, Looping::from(&self.looping), &mut reporter) {
            error!("{:#}", e);
            reporter.result(Verdict::Broken, format!("{:#}", e));
        }

        reporter.finish()
    }
}

/// Iteration count, duration and pause
#[derive(Args, Debug)]
pub struct LoopOptions {
    /// Execute the test N times; 0 loops until interrupted.
    #[clap(short = 'i', long, default_value = "1")]
    pub iterations: u64,

    /// Execute the test for SECS seconds instead of a fixed count.
    #[clap(short = 'I', long, parse(try_from_str = parse_secs))]
    pub duration: Option<Duration>,

    /// Pause SECS seconds between iterations.
    #[clap(short = 'P', long, parse(try_from_str = parse_secs))]
    pub pause: Option<Duration>,
}

fn parse_secs(s: &str) -> anyhow::Result<Duration> {
    let secs = f64::from_str(s).map_err(|e| anyhow!("invalid number of seconds {:?}: {}", s, e))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(anyhow!("number of seconds must be finite and positive: {:?}", s));
    }

    Duration::try_from_secs_f64(secs)
        .map_err(|e| anyhow!("number of seconds out of range {:?}: {}", s, e))
}

/// Common logging / output options
#[derive(Args, Debug)]
pub struct LogOptions {
    /// Increase log verbosity. Pass multiple times for more log output.
    ///
    /// By default we only show error messages. Passing `-v` will show warnings,
    /// `-vv` adds info, `-vvv` for debug, and `-vvvv` for trace.
    #[clap(long = "verbose", short = 'v', parse(from_occurrences))]
    verbosity: u8,

    /// Set fancier logging filters.
    ///
    /// This is equivalent to the `RUST_LOG` environment variable.
    /// For more info, see the `env_logger` crate documentation.
    #[clap(long = "log-filter", env = "WRITEV_PROBE_LOG")]
    log_filter: Option<String>,

    /// Set log output target ("stderr", "stdout")
    #[clap(long, default_value = "stderr")]
    log_target: LogTarget,
}

impl LogOptions {
    /// Build & initialize a global logger using env_logger::Builder.
    pub fn init(&self) {
        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(self.verbosity_level())
            .parse_filters(self.log_filter.as_deref().unwrap_or_default())
            .target(self.log_target.into())
            .init();
    }

    /// Convert the -vvv.. count into a log level.
    fn verbosity_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Represents targets for debug logging.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
enum LogTarget {
    Stdout,
    Stderr,
}

/// Convert a str to a LogTarget. This is how Clap parses CLI args.
impl FromStr for LogTarget {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            _ => Err(anyhow!("unknown log target {:?}", s)),
        }
    }
}

/// Convert our LogTarget to env_logger's Target
impl From<LogTarget> for env_logger::Target {
    fn from(t: LogTarget) -> Self {
        match t {
            LogTarget::Stdout => Self::Stdout,
            LogTarget::Stderr => Self::Stderr,
        }
    }
}
