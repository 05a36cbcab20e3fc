use core::fmt;

use dataview::Pod;

use opandos_types::WORD_LEN;

/// A word-aligned physical address on the machine bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct MemAddr(u32);

unsafe impl Pod for MemAddr {}

impl MemAddr {
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    #[must_use]
    pub const fn addr(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn byte_add(self, offset: u32) -> Self {
        Self(self.0 + offset)
    }

    /// Address of the `index`-th word from this one.
    #[must_use]
    pub const fn word_add(self, index: usize) -> Self {
        Self(self.0 + (index * WORD_LEN) as u32)
    }
}

impl fmt::Display for MemAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for MemAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
