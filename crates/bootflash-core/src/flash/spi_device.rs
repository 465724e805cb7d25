//! SPI25 flash adapter
//!
//! This module provides `SpiFlash`, an adapter that implements
//! [`FlashPrimitives`] for a device reached through an [`SpiTransport`].

use crate::device::FlashDescriptor;
use crate::error::{Error, Result};
use crate::flash::primitives::FlashPrimitives;
use crate::protocol;
use crate::spi::SpiTransport;

/// Flash device adapter for SPI25 devices
///
/// Wraps a transport together with the descriptor produced by detection.
/// Transport failures are reported as `ReadError` / `WriteError` /
/// `EraseError` carrying the linear address of the failed operation.
///
/// # Example
///
/// ```ignore
/// use bootflash_core::{detect, flash::{FlashPrimitives, SpiFlash}};
///
/// let found = detect::detect(&mut transport, &config)?;
/// let mut device = SpiFlash::new(&mut transport, found.descriptor);
///
/// let mut buf = [0u8; 256];
/// device.read_block(0, &mut buf)?;
/// ```
pub struct SpiFlash<'a, T: SpiTransport + ?Sized> {
    transport: &'a mut T,
    descriptor: FlashDescriptor,
}

impl<'a, T: SpiTransport + ?Sized> SpiFlash<'a, T> {
    /// Create a new adapter
    ///
    /// # Arguments
    /// * `transport` - The transport the device is attached to
    /// * `descriptor` - Device geometry (from detection)
    pub fn new(transport: &'a mut T, descriptor: FlashDescriptor) -> Self {
        Self {
            transport,
            descriptor,
        }
    }

    fn erase_with(&mut self, opcode: u8, linear: u32, wire_addr: u32, size: u32) -> Result<()> {
        let (poll_us, timeout_us) = erase_timing(size);
        protocol::erase_block(self.transport, opcode, wire_addr, poll_us, timeout_us).map_err(|e| {
            log::debug!("erase 0x{:02X} at 0x{:08X}: {}", opcode, linear, e);
            Error::EraseError { addr: linear }
        })
    }
}

/// Poll interval and timeout for an erase of `size` bytes
fn erase_timing(size: u32) -> (u32, u32) {
    match size {
        s if s <= 4096 => (1_000, 1_000_000),   // 4KB: typical 45-400ms
        s if s <= 32768 => (10_000, 4_000_000), // 32KB: typical 120-1600ms
        s if s <= 65536 => (10_000, 4_000_000), // 64KB: typical 150-2000ms
        _ => (100_000, 120_000_000),            // larger blocks / chip
    }
}

impl<T: SpiTransport + ?Sized> FlashPrimitives for SpiFlash<'_, T> {
    fn descriptor(&self) -> &FlashDescriptor {
        &self.descriptor
    }

    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if !self.descriptor.is_valid_range(addr, buf.len()) {
            return Err(Error::AddressOutOfBounds);
        }

        if self.descriptor.page_addr_shift == 0 {
            return protocol::read(self.transport, addr, buf).map_err(|e| {
                log::debug!("read at 0x{:08X}: {}", addr, e);
                Error::ReadError { addr }
            });
        }

        // Split addressing: the page number moves on every page boundary
        let page_size = self.descriptor.page_size as usize;
        let mut offset = 0usize;
        while offset < buf.len() {
            let current = addr + offset as u32;
            let to_page_end = page_size - current as usize % page_size;
            let chunk = core::cmp::min(to_page_end, buf.len() - offset);
            let wire_addr = self.descriptor.device_address(current);
            protocol::read(self.transport, wire_addr, &mut buf[offset..offset + chunk]).map_err(
                |e| {
                    log::debug!("read at 0x{:08X}: {}", current, e);
                    Error::ReadError { addr: current }
                },
            )?;
            offset += chunk;
        }
        Ok(())
    }

    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let page_size = self.descriptor.page_size as usize;
        if addr as usize % page_size + data.len() > page_size {
            return Err(Error::InvalidArgument);
        }
        if !self.descriptor.is_valid_range(addr, data.len()) {
            return Err(Error::AddressOutOfBounds);
        }

        let wire_addr = self.descriptor.device_address(addr);
        protocol::program_page(self.transport, wire_addr, data).map_err(|e| {
            log::debug!("program at 0x{:08X}: {}", addr, e);
            Error::WriteError { addr }
        })
    }

    fn erase_page(&mut self, addr: u32) -> Result<()> {
        let opcode = self.descriptor.page_erase_opcode.ok_or(Error::Unsupported)?;
        let wire_addr = self.descriptor.device_address(addr);
        let size = self.descriptor.page_size;
        self.erase_with(opcode, addr, wire_addr, size)
    }

    fn erase_sector(&mut self, addr: u32) -> Result<()> {
        let opcode = self.descriptor.sector_erase_opcode;
        let wire_addr = self.descriptor.sector_address(addr);
        let size = self.descriptor.sector_size;
        self.erase_with(opcode, addr, wire_addr, size)
    }

    fn erase_area(&mut self, addr: u32, opcode: u8, size: u32) -> Result<()> {
        if size == 0 || addr % size != 0 {
            return Err(Error::InvalidArgument);
        }
        if !self.descriptor.is_valid_range(addr, size as usize) {
            return Err(Error::AddressOutOfBounds);
        }

        let wire_addr = self.descriptor.device_address(addr);
        self.erase_with(opcode, addr, wire_addr, size)
    }
}
