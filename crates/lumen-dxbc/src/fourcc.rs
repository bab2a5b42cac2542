//! Four-character part tags.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A four-byte tag such as `DXBC` or `RDEF`, stored in file order.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const DXBC: Self = Self(*b"DXBC");
    pub const RDEF: Self = Self(*b"RDEF");
    pub const ISGN: Self = Self(*b"ISGN");
    pub const OSGN: Self = Self(*b"OSGN");
    pub const PCSG: Self = Self(*b"PCSG");
    pub const IFCE: Self = Self(*b"IFCE");
    pub const SHDR: Self = Self(*b"SHDR");
    pub const SHEX: Self = Self(*b"SHEX");
    pub const STAT: Self = Self(*b"STAT");
    pub const RD11: Self = Self(*b"RD11");

    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            self.0.iter().try_for_each(|&b| write!(f, "{}", b as char))
        } else {
            write!(f, "0x{:08X}", u32::from_le_bytes(self.0))
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}
