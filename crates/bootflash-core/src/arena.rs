//! Bump arena and packed bit vectors
//!
//! The smart erase planner needs one dirty bitmap per erase granularity but
//! runs without a heap. [`Arena`] hands out zeroed slices from a scratch
//! region lent by the caller; nothing is ever freed, the arena is simply
//! dropped and recreated for the next operation.

use core::ops::Range;

use crate::error::{Error, Result};

/// Value of a single bit in a [`BitVec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bit {
    /// Bit is 0
    #[default]
    Clear,
    /// Bit is 1
    Set,
}

impl Bit {
    /// Check if the bit is set
    pub fn is_set(self) -> bool {
        matches!(self, Self::Set)
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        if value {
            Self::Set
        } else {
            Self::Clear
        }
    }
}

impl TryFrom<u8> for Bit {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Clear),
            1 => Ok(Self::Set),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// Linear allocator over a borrowed byte region
pub struct Arena<'a> {
    free: &'a mut [u8],
    capacity: usize,
}

impl<'a> Arena<'a> {
    /// Create an arena covering the whole of `region`
    pub fn new(region: &'a mut [u8]) -> Self {
        let capacity = region.len();
        log::trace!("arena: {} bytes of scratch memory", capacity);
        Self {
            free: region,
            capacity,
        }
    }

    /// Total size of the backing region
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes handed out so far
    pub fn used(&self) -> usize {
        self.capacity - self.free.len()
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.free.len()
    }

    /// Take `len` zeroed bytes from the arena
    pub fn allocate(&mut self, len: usize) -> Result<&'a mut [u8]> {
        if len > self.free.len() {
            log::error!(
                "! arena exhausted: requested {} bytes, {} of {} left",
                len,
                self.free.len(),
                self.capacity
            );
            return Err(Error::OutOfMemory {
                requested: len,
                available: self.free.len(),
            });
        }

        let region = core::mem::take(&mut self.free);
        let (head, tail) = region.split_at_mut(len);
        self.free = tail;
        head.fill(0);
        Ok(head)
    }

    /// Allocate a cleared bit vector holding `bits` bits
    pub fn new_bit_vector(&mut self, bits: usize) -> Result<BitVec<'a>> {
        let bytes = self.allocate(bits.div_ceil(8))?;
        Ok(BitVec { bytes, len: bits })
    }
}

/// Packed, bounds-checked bit vector borrowed from an [`Arena`]
#[derive(Debug)]
pub struct BitVec<'a> {
    bytes: &'a mut [u8],
    len: usize,
}

impl BitVec<'_> {
    /// Number of bits
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the vector holds no bits
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.len {
            Ok(())
        } else {
            Err(Error::IndexOutOfBounds {
                index,
                len: self.len,
            })
        }
    }

    /// Read the bit at `index`
    pub fn get(&self, index: usize) -> Result<Bit> {
        self.check(index)?;
        Ok(Bit::from(self.bytes[index / 8] & (1 << (index % 8)) != 0))
    }

    /// Write the bit at `index`
    pub fn set(&mut self, index: usize, value: Bit) -> Result<()> {
        self.check(index)?;
        let mask = 1u8 << (index % 8);
        match value {
            Bit::Set => self.bytes[index / 8] |= mask,
            Bit::Clear => self.bytes[index / 8] &= !mask,
        }
        Ok(())
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.len {
            return Err(Error::IndexOutOfBounds {
                index: range.end,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Count the set bits inside `range`
    pub fn count_set(&self, range: Range<usize>) -> Result<usize> {
        self.check_range(&range)?;
        let mut count = 0;
        for index in range {
            if self.bytes[index / 8] & (1 << (index % 8)) != 0 {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Clear every bit inside `range`
    pub fn clear_range(&mut self, range: Range<usize>) -> Result<()> {
        self.check_range(&range)?;
        for index in range {
            self.bytes[index / 8] &= !(1 << (index % 8));
        }
        Ok(())
    }

    /// Number of set bits in the whole vector
    pub fn count_ones(&self) -> usize {
        // Padding bits past `len` are never set
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Iterate over the indices of all set bits, ascending
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.bytes[i / 8] & (1 << (i % 8)) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_advances_cursor() {
        let mut scratch = [0xAAu8; 64];
        let mut arena = Arena::new(&mut scratch);

        let a = arena.allocate(10).unwrap();
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|&b| b == 0), "allocations are zeroed");
        assert_eq!(arena.used(), 10);
        assert_eq!(arena.remaining(), 54);

        let b = arena.allocate(54).unwrap();
        assert_eq!(b.len(), 54);
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn test_allocate_exhausted() {
        let mut scratch = [0u8; 16];
        let mut arena = Arena::new(&mut scratch);
        arena.allocate(12).unwrap();

        let err = arena.allocate(8).unwrap_err();
        assert_eq!(
            err,
            Error::OutOfMemory {
                requested: 8,
                available: 4
            }
        );
        // A failed request does not consume anything
        assert_eq!(arena.remaining(), 4);
        assert!(arena.allocate(4).is_ok());
    }

    #[test]
    fn test_bit_vector_rounds_up_to_bytes() {
        let mut scratch = [0u8; 16];
        let mut arena = Arena::new(&mut scratch);

        let v = arena.new_bit_vector(9).unwrap();
        assert_eq!(v.len(), 9);
        assert_eq!(arena.used(), 2);

        let _ = arena.new_bit_vector(0).unwrap();
        assert_eq!(arena.used(), 2);
    }

    #[test]
    fn test_bit_get_set() {
        let mut scratch = [0u8; 4];
        let mut arena = Arena::new(&mut scratch);
        let mut v = arena.new_bit_vector(20).unwrap();

        v.set(0, Bit::Set).unwrap();
        v.set(7, Bit::Set).unwrap();
        v.set(8, Bit::Set).unwrap();
        v.set(19, Bit::Set).unwrap();
        assert_eq!(v.get(0).unwrap(), Bit::Set);
        assert_eq!(v.get(1).unwrap(), Bit::Clear);
        assert_eq!(v.get(19).unwrap(), Bit::Set);
        assert_eq!(v.count_ones(), 4);

        v.set(7, Bit::Clear).unwrap();
        assert_eq!(v.get(7).unwrap(), Bit::Clear);
        assert_eq!(v.iter_set().collect::<Vec<_>>(), vec![0, 8, 19]);
    }

    #[test]
    fn test_bit_index_out_of_bounds() {
        let mut scratch = [0u8; 4];
        let mut arena = Arena::new(&mut scratch);
        let mut v = arena.new_bit_vector(10).unwrap();

        assert_eq!(
            v.get(10).unwrap_err(),
            Error::IndexOutOfBounds { index: 10, len: 10 }
        );
        assert!(v.set(12, Bit::Set).is_err());
        assert!(v.count_set(8..11).is_err());
    }

    #[test]
    fn test_bit_from_raw_value() {
        assert_eq!(Bit::try_from(0).unwrap(), Bit::Clear);
        assert_eq!(Bit::try_from(1).unwrap(), Bit::Set);
        assert_eq!(Bit::try_from(2).unwrap_err(), Error::InvalidArgument);
    }

    #[test]
    fn test_count_and_clear_range() {
        let mut scratch = [0u8; 4];
        let mut arena = Arena::new(&mut scratch);
        let mut v = arena.new_bit_vector(32).unwrap();
        for i in [1, 2, 3, 17, 30] {
            v.set(i, Bit::Set).unwrap();
        }

        assert_eq!(v.count_set(0..16).unwrap(), 3);
        assert_eq!(v.count_set(16..32).unwrap(), 2);

        v.clear_range(0..16).unwrap();
        assert_eq!(v.count_set(0..16).unwrap(), 0);
        assert_eq!(v.count_ones(), 2);
    }
}
