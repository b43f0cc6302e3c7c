// SPDX-License-Identifier: Apache-2.0

use libc::iovec;

/// One `(base, len)` entry of a scattered write.
///
/// The base is a plain address: the probe deliberately builds segments that
/// point at memory the process cannot read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Segment {
    pub base: usize,
    pub len: usize,
}

impl Segment {
    pub const fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    /// The `(NULL, 0)` segment.
    pub const fn null() -> Self {
        Self::new(0, 0)
    }
}

impl From<Segment> for iovec {
    fn from(segment: Segment) -> Self {
        iovec {
            iov_base: segment.base as _,
            iov_len: segment.len,
        }
    }
}
