//! In-memory flash used by the engine tests

use std::vec::Vec;

use crate::device::{FlashDescriptor, ERASED_VALUE};
use crate::error::{Error, Result};
use crate::flash::primitives::FlashPrimitives;

/// Erase command seen by [`MockFlash`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockErase {
    Page(u32),
    Sector(u32),
    Area { addr: u32, opcode: u8 },
}

/// NOR flash model recording every primitive call
pub(crate) struct MockFlash {
    pub descriptor: FlashDescriptor,
    pub memory: Vec<u8>,
    pub reads: Vec<(u32, usize)>,
    pub writes: Vec<(u32, usize)>,
    pub erases: Vec<MockErase>,
    /// Block sizes for `erase_area`, keyed by opcode
    pub area_sizes: Vec<(u8, u32)>,
    pub fail_erase_at: Vec<u32>,
    pub fail_write_at: Option<u32>,
}

impl MockFlash {
    pub fn new(descriptor: FlashDescriptor) -> Self {
        let size = descriptor.size as usize;
        Self {
            descriptor,
            memory: vec![ERASED_VALUE; size],
            reads: Vec::new(),
            writes: Vec::new(),
            erases: Vec::new(),
            area_sizes: Vec::new(),
            fail_erase_at: Vec::new(),
            fail_write_at: None,
        }
    }

    pub fn with_page_erase_opcode(mut self) -> Self {
        self.descriptor.page_erase_opcode = Some(crate::spi::opcodes::PE_81);
        self
    }

    fn clear(&mut self, addr: u32, len: u32) {
        let start = addr as usize;
        self.memory[start..start + len as usize].fill(ERASED_VALUE);
    }

    fn check_erase(&self, addr: u32) -> Result<()> {
        if self.fail_erase_at.contains(&addr) {
            Err(Error::EraseError { addr })
        } else {
            Ok(())
        }
    }
}

impl FlashPrimitives for MockFlash {
    fn descriptor(&self) -> &FlashDescriptor {
        &self.descriptor
    }

    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if !self.descriptor.is_valid_range(addr, buf.len()) {
            return Err(Error::AddressOutOfBounds);
        }
        self.reads.push((addr, buf.len()));
        let start = addr as usize;
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
        Ok(())
    }

    fn write_page(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let page = self.descriptor.page_size as usize;
        assert!(
            addr as usize % page + data.len() <= page,
            "write at 0x{:x} crosses a page",
            addr
        );
        if self.fail_write_at == Some(addr) {
            return Err(Error::WriteError { addr });
        }
        self.writes.push((addr, data.len()));
        let start = addr as usize;
        for (cell, byte) in self.memory[start..start + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn erase_page(&mut self, addr: u32) -> Result<()> {
        if self.descriptor.page_erase_opcode.is_none() {
            return Err(Error::Unsupported);
        }
        self.check_erase(addr)?;
        self.erases.push(MockErase::Page(addr));
        let size = self.descriptor.page_size;
        self.clear(addr, size);
        Ok(())
    }

    fn erase_sector(&mut self, addr: u32) -> Result<()> {
        assert_eq!(addr % self.descriptor.sector_size, 0);
        self.check_erase(addr)?;
        self.erases.push(MockErase::Sector(addr));
        let size = self.descriptor.sector_size;
        self.clear(addr, size);
        Ok(())
    }

    fn erase_area(&mut self, addr: u32, opcode: u8, size: u32) -> Result<()> {
        let known = self
            .area_sizes
            .iter()
            .find(|(op, _)| *op == opcode)
            .map(|(_, size)| *size)
            .ok_or(Error::Unsupported)?;
        assert_eq!(known, size, "opcode 0x{:02x} used with wrong block size", opcode);
        assert_eq!(addr % size, 0, "misaligned block erase");
        self.check_erase(addr)?;
        self.erases.push(MockErase::Area { addr, opcode });
        self.clear(addr, size);
        Ok(())
    }
}

/// Progress sink recording every event
#[derive(Debug, Default)]
pub(crate) struct RecordingProgress {
    pub events: Vec<ProgressEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgressEvent {
    Init(u64),
    Set(u64),
    Finalize,
}

impl crate::flash::Progress for RecordingProgress {
    fn init(&mut self, total: u64) {
        self.events.push(ProgressEvent::Init(total));
    }

    fn set_position(&mut self, position: u64) {
        self.events.push(ProgressEvent::Set(position));
    }

    fn finalize(&mut self) {
        self.events.push(ProgressEvent::Finalize);
    }
}
