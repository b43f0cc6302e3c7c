// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use log::debug;
use mmarinus::{perms, Kind, Map};

/// Memory the process is not allowed to touch.
///
/// Normally a private anonymous `PROT_NONE` mapping; the fallback is the
/// all-ones address, which can never be mapped either.
pub struct FaultRegion {
    map: Option<Map<perms::None>>,
    addr: usize,
}

impl FaultRegion {
    pub fn map() -> Result<Self> {
        let map = Map::map(1)
            .anywhere()
            .anonymously()
            .known::<perms::None>(Kind::Private)
            .context("failed to map an inaccessible page")?;

        let addr = map.addr();
        debug!("inaccessible page at {:#x}", addr);
        Ok(Self {
            map: Some(map),
            addr,
        })
    }

    pub fn fallback() -> Self {
        Self {
            map: None,
            addr: usize::MAX,
        }
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn is_mapped(&self) -> bool {
        self.map.is_some()
    }
}
