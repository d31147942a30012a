use std::fmt;
use std::ops::{Add, Sub};

/// Index into the section table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SectionIndex(pub u16);

/// Index into a string table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct StringIndex(pub u32);

/// An index into a byte within an ELF file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Offset(pub u64);

/// The address of a byte in the process that cored. These are normally associated with
/// one of the load segments in the core file.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddr(pub u64);

/// A range of bytes that can be addressed using either offsets into an ELF file or
/// virtual addresses. In general bytes can always be addressed using offsets and bytes
/// within load segments can also be addressed using virtual addresses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Bytes<A>
where
    A: Add<u64, Output = A> + Copy + Ord,
{
    pub start: A,
    pub size: u64,
}

impl<A: Add<u64, Output = A> + Copy + Ord> Bytes<A> {
    pub fn new(start: A, size: u64) -> Self {
        Bytes { start, size }
    }

    pub fn contains(&self, addr: A) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// One past the last byte. Saturates so that garbage sizes in a corrupt file don't
    /// wrap around to small addresses.
    pub fn end(&self) -> A {
        self.start + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start < other.end()
            && other.start < self.end()
    }
}

impl Add<u64> for VirtualAddr {
    type Output = VirtualAddr;

    fn add(self, rhs: u64) -> Self::Output {
        VirtualAddr(self.0.saturating_add(rhs))
    }
}

impl Add<u64> for Offset {
    type Output = Offset;

    fn add(self, rhs: u64) -> Self::Output {
        Offset(self.0.saturating_add(rhs))
    }
}

/// Distance in bytes, only meaningful when rhs <= self.
impl Sub<VirtualAddr> for VirtualAddr {
    type Output = u64;

    fn sub(self, rhs: VirtualAddr) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Sub<Offset> for Offset {
    type Output = u64;

    fn sub(self, rhs: Offset) -> Self::Output {
        self.0 - rhs.0
    }
}

impl fmt::LowerHex for VirtualAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
