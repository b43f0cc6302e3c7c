// SPDX-License-Identifier: Apache-2.0

//! Scattered-write fault probe.
//!
//! Every iteration writes one chunk of zeros with a plain `write(2)`, reopens
//! the file read-write, rewinds it and calls `writev(2)` with
//! `[(inaccessible, CHUNK), (NULL, 0)]`. The call has to fail with `EFAULT`,
//! and a read at offset `CHUNK` afterwards has to return nothing.

mod fault;
mod segment;
mod sys;
mod target;

pub use fault::FaultRegion;
pub use segment::Segment;
pub use target::TargetFile;

use crate::harness::{Looping, Reporter, SyscallTimer, Verdict, WorkDir};
use crate::signal::{self, SignalGuard};

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

/// Test identifier printed in front of every result line.
pub const TCID: &str = "writev-fault";

/// Size of the valid data written before the probe, and of the faulting segment.
pub const CHUNK: usize = 8192;

#[derive(Debug, Clone)]
pub struct Config {
    pub base_name: String,
    pub tmpdir: Option<PathBuf>,
    pub tolerate_map_failure: bool,
    pub timing: bool,
}

/// Set up, loop, and clean up.
///
/// Returns `Err` for setup failures and for the first I/O precondition that
/// does not hold; cleanup has already run by then. Assertion failures are
/// reported as `TFAIL` and do not stop the loop.
pub fn run<W: Write>(config: Config, looping: Looping, reporter: &mut Reporter<W>) -> Result<()> {
    let mut probe = Probe::setup(&config)?;
    info!("probing {:?}", probe.target().path());

    let mut outcome = Ok(());
    for lc in looping {
        reporter.reset_count();
        info!("iteration {}", lc);

        if let Err(e) = probe.iteration(reporter) {
            outcome = Err(e.context(format!("iteration {}", lc)));
            break;
        }
    }

    probe.report_stats(reporter);
    probe.cleanup(reporter);
    debug!("{:?}", reporter.summary());
    outcome
}

pub struct Probe {
    workdir: Option<WorkDir>,
    target: TargetFile,
    // Kept alive so the segment base stays inaccessible.
    fault: FaultRegion,
    segments: [Segment; 2],
    timer: Option<SyscallTimer>,
    signals: Option<SignalGuard>,
    cleaned: bool,
}

impl Probe {
    pub fn setup(config: &Config) -> Result<Self> {
        let workdir = WorkDir::create(TCID, config.tmpdir.as_deref())?;
        let target = TargetFile::new(workdir.path(), &config.base_name);
        let signals = SignalGuard::install(target.path(), workdir.path())?;

        let fault = match FaultRegion::map() {
            Ok(fault) => fault,
            Err(e) if config.tolerate_map_failure => {
                warn!("{:#}; falling back to the all-ones address", e);
                FaultRegion::fallback()
            }
            Err(e) => return Err(e),
        };

        let segments = [Segment::new(fault.addr(), CHUNK), Segment::null()];
        info!("target {:?}, segments {:x?}", target.path(), segments);

        Ok(Self {
            workdir: Some(workdir),
            target,
            fault,
            segments,
            timer: config.timing.then(SyscallTimer::default),
            signals: Some(signals),
            cleaned: false,
        })
    }

    pub fn target(&self) -> &TargetFile {
        &self.target
    }

    /// One pass of the test body. `Err` means a precondition failed and the
    /// run must stop.
    pub fn iteration<W: Write>(&mut self, reporter: &mut Reporter<W>) -> Result<()> {
        let path = self.target.path();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .mode(0o666)
            .open(path)
            .with_context(|| format!("open({:?}, O_WRONLY | O_CREAT) failed", path))?;

        let zeros = [0u8; CHUNK];
        let written = file
            .write(&zeros)
            .with_context(|| format!("write() of {} bytes failed", CHUNK))?;
        if written != CHUNK {
            bail!("write() transferred {} bytes, expected {}", written, CHUNK);
        }

        sys::close(file).context("close() failed")?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open({:?}, O_RDWR) failed", path))?;
        debug!("file length before writev(): {:?}", file.metadata().map(|m| m.len()));

        seek(&mut file, 0, reporter);
        match self.writev(&file) {
            Ok(n) => reporter.result(
                Verdict::Fail,
                format!("writev() returned {} instead of failing", n),
            ),

            Err(e) => {
                if let Some(code) = e.raw_os_error() {
                    reporter.errno(code);
                }

                if e.raw_os_error() == Some(libc::EFAULT) {
                    reporter.result(Verdict::Pass, "writev() failed with EFAULT as expected");
                } else {
                    reporter.result(Verdict::Fail, format!("expected EFAULT, got {}", e));
                }

                seek(&mut file, CHUNK as u64, reporter);
                let mut buf = [0u8; CHUNK];
                match file.read(&mut buf) {
                    Ok(0) => (),
                    Ok(n) => reporter.result(
                        Verdict::Fail,
                        format!("expected 0 bytes at offset {}, read {}", CHUNK, n),
                    ),
                    Err(e) => reporter.result(
                        Verdict::Fail,
                        format!("read() at offset {} failed: {}", CHUNK, e),
                    ),
                }
            }
        }

        if let Some(sig) = signal::take_stray_signal() {
            reporter.result(
                Verdict::Fail,
                format!("signal handler received unexpected signal {}", sig),
            );
        }

        sys::close(file).context("close() failed")
    }

    fn writev(&mut self, file: &File) -> io::Result<usize> {
        let segments = &self.segments;
        debug!("writev({:?}, {:x?})", file, segments);

        let ret = match self.timer.as_mut() {
            Some(timer) => timer.time(|| sys::writev(file, segments)),
            None => sys::writev(file, segments),
        };

        debug!("writev() = {:?}", ret);
        ret
    }

    fn report_stats<W: Write>(&self, reporter: &mut Reporter<W>) {
        if let Some(stats) = self.timer.as_ref().and_then(SyscallTimer::stats) {
            reporter.result(Verdict::Info, format!("writev() timing: {}", stats));
        }

        let pipes = signal::broken_pipes();
        if pipes > 0 {
            warn!("ignored {} SIGPIPE(s)", pipes);
        }

        if !self.fault.is_mapped() {
            warn!("the first segment used the fallback address {:#x}", self.fault.addr());
        }
    }

    /// Remove the target file, then the working directory. Only the first
    /// call does anything.
    pub fn cleanup<W: Write>(&mut self, reporter: &mut Reporter<W>) {
        if std::mem::replace(&mut self.cleaned, true) {
            return;
        }
        info!("cleaning up");

        if let Err(e) = self.target.remove_if_exists() {
            reporter.result(
                Verdict::Fail,
                format!("unlink({:?}) failed: {}", self.target.path(), e),
            );
        }

        if let Some(workdir) = self.workdir.take() {
            let path = workdir.path().to_path_buf();
            if let Err(e) = workdir.remove() {
                reporter.result(
                    Verdict::Fail,
                    format!("failed to remove working directory {:?}: {}", path, e),
                );
            }
        }

        self.signals.take();
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        if !self.cleaned {
            if let Err(e) = self.target.remove_if_exists() {
                warn!("unlink({:?}) failed: {}", self.target.path(), e);
            }
        }
    }
}

/// `lseek()` whose failure is a test failure, not a reason to stop.
fn seek<W: Write>(file: &mut File, offset: u64, reporter: &mut Reporter<W>) {
    if let Err(e) = file.seek(SeekFrom::Start(offset)) {
        reporter.result(Verdict::Fail, format!("lseek() to {} failed: {}", offset, e));
    }
}
