// SPDX-License-Identifier: Apache-2.0

//! Termination and broken-pipe handling.
//!
//! The handler only touches atomics and calls `unlink(2)`, `rmdir(2)`,
//! `write(2)` and `_exit(2)`, all of which are async-signal-safe. Result
//! reporting stays on the main flow.

use std::ffi::CString;
use std::io;
use std::mem::{zeroed, MaybeUninit};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicI32, AtomicPtr, AtomicUsize, Ordering};

use anyhow::{anyhow, Context, Result};
use libc::{c_char, c_int};
use log::{debug, warn};

const SIGNALS: [c_int; 2] = [libc::SIGTERM, libc::SIGPIPE];
const UNLINK_FAILED: &[u8] = b"signal handler: failed to remove the target file\n";
const RMDIR_FAILED: &[u8] = b"signal handler: failed to remove the working directory\n";

/// NUL-terminated paths, owned by the live [`SignalGuard`].
static TARGET: AtomicPtr<c_char> = AtomicPtr::new(null_mut());
static WORKDIR: AtomicPtr<c_char> = AtomicPtr::new(null_mut());
static BROKEN_PIPES: AtomicUsize = AtomicUsize::new(0);
static STRAY_SIGNAL: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_signal(sig: c_int) {
    match sig {
        libc::SIGPIPE => {
            BROKEN_PIPES.fetch_add(1, Ordering::SeqCst);
        }

        libc::SIGTERM => {
            remove(TARGET.load(Ordering::SeqCst), libc::unlink, UNLINK_FAILED);
            remove(WORKDIR.load(Ordering::SeqCst), libc::rmdir, RMDIR_FAILED);
            unsafe { libc::_exit(sig) }
        }

        _ => STRAY_SIGNAL.store(sig, Ordering::SeqCst),
    }
}

/// Runs `op` on `path` from signal context; a missing path is not an error.
fn remove(path: *const c_char, op: unsafe extern "C" fn(*const c_char) -> c_int, msg: &[u8]) {
    if path.is_null() || unsafe { op(path) } == 0 {
        return;
    }

    if io::Error::last_os_error().raw_os_error() != Some(libc::ENOENT) {
        unsafe {
            libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
        }
    }
}

fn set_action(sig: c_int, action: &libc::sigaction) -> io::Result<libc::sigaction> {
    let mut old = MaybeUninit::<libc::sigaction>::uninit();
    if unsafe { libc::sigaction(sig, action, old.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(unsafe { old.assume_init() })
}

fn handler_action() -> libc::sigaction {
    let mut action: libc::sigaction = unsafe { zeroed() };
    action.sa_sigaction = on_signal as extern "C" fn(c_int) as libc::sighandler_t;
    action.sa_flags = libc::SA_RESTART;
    unsafe { libc::sigemptyset(&mut action.sa_mask) };
    action
}

/// Number of `SIGPIPE`s received since the last [`SignalGuard::install`].
pub fn broken_pipes() -> usize {
    BROKEN_PIPES.load(Ordering::SeqCst)
}

/// A signal other than `SIGTERM`/`SIGPIPE` that reached the handler, if any.
pub fn take_stray_signal() -> Option<c_int> {
    match STRAY_SIGNAL.swap(0, Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

/// Keeps the handlers installed for `SIGTERM` and `SIGPIPE`.
///
/// On `SIGTERM` the handler removes the target file, then the (by then empty)
/// working directory. Only one guard can be live at a time. Dropping it
/// restores the previous actions before releasing the paths.
pub struct SignalGuard {
    target: *mut c_char,
    workdir: *mut c_char,
    previous: Vec<(c_int, libc::sigaction)>,
}

fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("path {:?} contains a NUL byte", path))
}

impl SignalGuard {
    pub fn install(target: &Path, workdir: &Path) -> Result<Self> {
        let target_c = c_path(target)?;
        let workdir = c_path(workdir)?.into_raw();
        let target_c = target_c.into_raw();

        if TARGET
            .compare_exchange(null_mut(), target_c, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            drop(unsafe { CString::from_raw(target_c) });
            drop(unsafe { CString::from_raw(workdir) });
            return Err(anyhow!("signal handlers are already installed"));
        }
        WORKDIR.store(workdir, Ordering::SeqCst);

        BROKEN_PIPES.store(0, Ordering::SeqCst);
        STRAY_SIGNAL.store(0, Ordering::SeqCst);

        let mut guard = Self {
            target: target_c,
            workdir,
            previous: Vec::with_capacity(SIGNALS.len()),
        };

        let action = handler_action();
        for sig in SIGNALS {
            let old = set_action(sig, &action)
                .with_context(|| format!("failed to install handler for signal {}", sig))?;
            guard.previous.push((sig, old));
        }

        debug!("signal handlers installed for {:?}", target);
        Ok(guard)
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        for (sig, old) in self.previous.drain(..).rev() {
            if let Err(e) = set_action(sig, &old) {
                warn!("failed to restore action for signal {}: {}", sig, e);
            }
        }

        WORKDIR.store(null_mut(), Ordering::SeqCst);
        TARGET.store(null_mut(), Ordering::SeqCst);
        drop(unsafe { CString::from_raw(self.workdir) });
        drop(unsafe { CString::from_raw(self.target) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;

    use serial_test::serial;
    use tempfile::tempdir;

    fn current_action(sig: c_int) -> libc::sighandler_t {
        let mut old = MaybeUninit::<libc::sigaction>::uninit();
        assert_eq!(
            unsafe { libc::sigaction(sig, std::ptr::null(), old.as_mut_ptr()) },
            0
        );
        unsafe { old.assume_init() }.sa_sigaction
    }

    #[test]
    #[serial]
    fn broken_pipe_is_counted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target");
        File::create(&path).unwrap();

        let guard = SignalGuard::install(&path, dir.path()).unwrap();
        assert_eq!(broken_pipes(), 0);

        assert_eq!(unsafe { libc::raise(libc::SIGPIPE) }, 0);
        assert_eq!(unsafe { libc::raise(libc::SIGPIPE) }, 0);

        assert_eq!(broken_pipes(), 2);
        assert!(path.exists());
        drop(guard);
    }

    #[test]
    #[serial]
    fn single_guard() {
        let dir = tempdir().unwrap();
        let guard = SignalGuard::install(&dir.path().join("a"), dir.path()).unwrap();
        assert!(SignalGuard::install(&dir.path().join("b"), dir.path()).is_err());

        drop(guard);
        let again = SignalGuard::install(&dir.path().join("b"), dir.path()).unwrap();
        drop(again);
    }

    #[test]
    #[serial]
    fn drop_restores_previous_actions() {
        let before = [current_action(libc::SIGTERM), current_action(libc::SIGPIPE)];

        let dir = tempdir().unwrap();
        let guard = SignalGuard::install(&dir.path().join("target"), dir.path()).unwrap();
        let ours = on_signal as extern "C" fn(c_int) as libc::sighandler_t;
        assert_eq!(current_action(libc::SIGTERM), ours);
        assert_eq!(current_action(libc::SIGPIPE), ours);
        drop(guard);

        let after = [current_action(libc::SIGTERM), current_action(libc::SIGPIPE)];
        assert_eq!(before, after);
        assert!(TARGET.load(Ordering::SeqCst).is_null());
        assert!(WORKDIR.load(Ordering::SeqCst).is_null());
    }

    #[test]
    fn remove_tolerates_missing_paths() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("target");
        let sub = dir.path().join("work");
        File::create(&file).unwrap();
        std::fs::create_dir(&sub).unwrap();

        let file_c = c_path(&file).unwrap();
        let sub_c = c_path(&sub).unwrap();
        remove(file_c.as_ptr(), libc::unlink, UNLINK_FAILED);
        remove(sub_c.as_ptr(), libc::rmdir, RMDIR_FAILED);
        assert!(!file.exists());
        assert!(!sub.exists());

        // Second time round both are gone already.
        remove(file_c.as_ptr(), libc::unlink, UNLINK_FAILED);
        remove(sub_c.as_ptr(), libc::rmdir, RMDIR_FAILED);
        remove(std::ptr::null(), libc::rmdir, RMDIR_FAILED);
    }

    #[test]
    #[serial]
    fn stray_signal_is_recorded() {
        assert_eq!(take_stray_signal(), None);
        on_signal(libc::SIGUSR1);
        assert_eq!(take_stray_signal(), Some(libc::SIGUSR1));
        assert_eq!(take_stray_signal(), None);
    }

    #[test]
    fn nul_in_path() {
        let path = Path::new(std::ffi::OsStr::from_bytes(b"bad\0path"));
        assert!(SignalGuard::install(path, Path::new("/tmp")).is_err());
        assert!(SignalGuard::install(Path::new("/tmp/target"), path).is_err());
    }
}
