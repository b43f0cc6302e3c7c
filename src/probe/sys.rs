// SPDX-License-Identifier: Apache-2.0

//! Thin wrappers for the calls `std` does not expose directly.

use super::Segment;

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd};

use libc::{c_int, iovec};

/// `writev(2)` with the segments exactly as given.
pub fn writev(fd: &impl AsRawFd, segments: &[Segment]) -> io::Result<usize> {
    let iov: Vec<iovec> = segments.iter().copied().map(iovec::from).collect();

    let ret = unsafe { libc::writev(fd.as_raw_fd(), iov.as_ptr(), iov.len() as c_int) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(ret as usize)
}

/// `close(2)` that reports the error `File`'s destructor would swallow.
pub fn close(file: File) -> io::Result<()> {
    if unsafe { libc::close(file.into_raw_fd()) } < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
