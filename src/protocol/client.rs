//! Client variants
//!
//! Each connected client belongs to one variant. Variants differ in how
//! extended info blocks are byte-encoded and in how much of the build area
//! border they render.

use serde::{Deserialize, Serialize};

/// Dense client variant enum, usable as an array index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ClientVariant {
    /// Legacy (java) desktop client
    Legacy = 0,
    /// Native desktop client
    Native = 1,
    /// Native mobile client
    Mobile = 2,
}

impl ClientVariant {
    /// Number of variants, the length of every per-variant table
    pub const COUNT: usize = 3;

    /// All variants in index order
    pub const ALL: [ClientVariant; Self::COUNT] =
        [ClientVariant::Legacy, ClientVariant::Native, ClientVariant::Mobile];

    /// Table index for this variant
    #[inline]
    pub fn id(self) -> usize {
        self as usize
    }

    /// Convert from a table index
    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    /// Width in tiles of the build area rim this client does not draw.
    ///
    /// The legacy client skips one tile, native clients skip two. Entities in
    /// the rim must be sent with absolute coordinates.
    #[inline]
    pub fn build_area_border(self) -> u32 {
        match self {
            ClientVariant::Legacy => 1,
            ClientVariant::Native | ClientVariant::Mobile => 2,
        }
    }
}

impl std::fmt::Display for ClientVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClientVariant::Legacy => "legacy",
            ClientVariant::Native => "native",
            ClientVariant::Mobile => "mobile",
        };
        f.write_str(name)
    }
}
