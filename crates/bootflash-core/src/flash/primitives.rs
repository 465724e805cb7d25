//! Flash I/O primitives

use crate::device::FlashDescriptor;
use crate::error::Result;

/// Address-keyed operations on one flash device
///
/// Each operation is atomic at the granularity it works on. Addresses are
/// linear byte offsets; translating them to what the device expects on the
/// wire is up to the implementor.
pub trait FlashPrimitives {
    /// Geometry of the device
    fn descriptor(&self) -> &FlashDescriptor;

    /// Read `buf.len()` bytes starting at `addr`
    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Program `data` into the page starting at `addr`
    ///
    /// `data` must not cross a page boundary.
    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase the page at `addr` with the device's page erase opcode
    fn erase_page(&mut self, addr: u32) -> Result<()>;

    /// Erase the sector at `addr` with the device's sector erase opcode
    fn erase_sector(&mut self, addr: u32) -> Result<()>;

    /// Erase the `size` byte block at `addr` with an explicit opcode
    fn erase_area(&mut self, addr: u32, opcode: u8, size: u32) -> Result<()>;
}

impl<F: FlashPrimitives + ?Sized> FlashPrimitives for &mut F {
    fn descriptor(&self) -> &FlashDescriptor {
        (**self).descriptor()
    }

    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(addr, buf)
    }

    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        (**self).write_page(addr, data)
    }

    fn erase_page(&mut self, addr: u32) -> Result<()> {
        (**self).erase_page(addr)
    }

    fn erase_sector(&mut self, addr: u32) -> Result<()> {
        (**self).erase_sector(addr)
    }

    fn erase_area(&mut self, addr: u32, opcode: u8, size: u32) -> Result<()> {
        (**self).erase_area(addr, opcode, size)
    }
}
