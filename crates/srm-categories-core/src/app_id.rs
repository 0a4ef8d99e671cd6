//! Shortcut app ids
//!
//! Steam identifies a non-Steam shortcut by a CRC32 of its executable
//! location followed by its title, with the top bit forced on. The same id
//! is what the UI cache and `localconfig.vdf` use to refer to the shortcut,
//! so it has to be reproduced exactly.
//!
//! Two shortcuts with the same executable and title always share an id, so
//! re-scanning a library never creates a second entry. Distinct inputs can
//! collide on the CRC; colliding shortcuts then share category membership.

use std::fmt;

use serde::{Deserialize, Serialize};

const HIGH_BIT: u32 = 0x8000_0000;
const LEGACY_LOW_BITS: u64 = 0x0200_0000;

/// 32-bit shortcut id as stored in category records and collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u32);

impl AppId {
    /// Derive the id for an executable location and title.
    ///
    /// `executable` is used verbatim, including any surrounding quotes the
    /// shortcut carries.
    pub fn generate(executable: &str, title: &str) -> Self {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(executable.as_bytes());
        hasher.update(title.as_bytes());
        Self(hasher.finalize() | HIGH_BIT)
    }

    /// 64-bit id used by older clients for grid artwork file names.
    pub fn legacy(self) -> u64 {
        (u64::from(self.0) << 32) | LEGACY_LOW_BITS
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AppId> for u32 {
    fn from(id: AppId) -> Self {
        id.0
    }
}
