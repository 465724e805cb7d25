//! bootflash-dummy - Emulated SPI NOR flash for testing
//!
//! This crate provides an in-memory SPI NOR flash that speaks the SPI25
//! command set byte by byte through [`SpiTransport`]. It carries a status
//! register with write-enable latch, an SFDP table generated from its
//! configuration, the configured erase opcodes and fault injection for
//! erase failures. It's useful for testing and development without real
//! hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use bootflash_core::error::{Error, Result};
#[cfg(feature = "alloc")]
use bootflash_core::protocol::Status;
#[cfg(feature = "alloc")]
use bootflash_core::spi::{opcodes, SpiTransport};

/// Configuration for the emulated flash
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Erase types as (size exponent, opcode), exponent 0 = unused slot
    pub erase_types: [(u8, u8); 4],
    /// Page erase opcode, if the device has one
    pub page_erase_opcode: Option<u8>,
    /// Answer RDSFDP with a parameter table
    pub sfdp: bool,
    /// Status reads reporting WIP after each program or erase
    pub busy_polls: u32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xEF, // Winbond
            device_id: 0x4016,     // W25Q32
            size: 4 * 1024 * 1024,
            page_size: 256,
            erase_types: [
                (12, 0x20), // 4 KiB
                (15, 0x52), // 32 KiB
                (16, 0xD8), // 64 KiB
                (0, 0xFF),
            ],
            page_erase_opcode: None,
            sfdp: true,
            busy_polls: 0,
        }
    }
}

impl EmulatorConfig {
    /// Size of the block erased by `opcode`, if the device accepts it
    pub fn erase_size(&self, opcode: u8) -> Option<usize> {
        if Some(opcode) == self.page_erase_opcode {
            return Some(self.page_size);
        }
        self.erase_types
            .iter()
            .find(|(exp, op)| *exp != 0 && *op == opcode)
            .map(|(exp, _)| 1usize << exp)
    }
}

/// Build the SFDP table advertising `config`
#[cfg(feature = "alloc")]
fn build_sfdp(config: &EmulatorConfig) -> Vec<u8> {
    const BFPT_OFFSET: u8 = 0x10;
    const BFPT_DWORDS: u8 = 16;

    let mut table = vec![0xFFu8; BFPT_OFFSET as usize + BFPT_DWORDS as usize * 4];
    table[..8].copy_from_slice(&[b'S', b'F', b'D', b'P', 0x06, 0x01, 0x00, 0xFF]);
    table[8..16].copy_from_slice(&[0x00, 0x06, 0x01, BFPT_DWORDS, BFPT_OFFSET, 0x00, 0x00, 0xFF]);

    let erase_4k = config
        .erase_types
        .iter()
        .find(|(exp, _)| *exp == 12)
        .map(|(_, op)| *op);
    let dword1 = match erase_4k {
        Some(op) => 0xFFFF_00E5 | ((op as u32) << 8),
        None => 0xFFFF_FFE7,
    };
    let dword2 = (config.size as u64 * 8 - 1) as u32;
    let pair = |(exp, op): (u8, u8)| -> u32 {
        if exp == 0 {
            0xFF00
        } else {
            (exp as u32) | ((op as u32) << 8)
        }
    };
    let dword8 = pair(config.erase_types[0]) | (pair(config.erase_types[1]) << 16);
    let dword9 = pair(config.erase_types[2]) | (pair(config.erase_types[3]) << 16);
    let dword11 = 0xFFFF_FF00 | ((config.page_size.trailing_zeros() & 0x0F) << 4);

    let mut put = |index: usize, dword: u32| {
        let at = BFPT_OFFSET as usize + (index - 1) * 4;
        table[at..at + 4].copy_from_slice(&dword.to_le_bytes());
    };
    put(1, dword1);
    put(2, dword2);
    put(8, dword8);
    put(9, dword9);
    put(11, dword11);
    table
}

/// Emulated SPI NOR flash
///
/// Commands are collected while chip select is asserted. Read-type
/// commands answer byte by byte, program and erase commands take effect
/// when chip select is released.
#[cfg(feature = "alloc")]
pub struct EmulatedFlash {
    config: EmulatorConfig,
    data: Vec<u8>,
    sfdp: Vec<u8>,
    frame: Vec<u8>,
    selected: bool,
    write_enabled: bool,
    busy: u32,
    speed_khz: u32,
    idle_byte: u8,
    fail_erase: Vec<usize>,
    erase_log: Vec<(u8, u32)>,
}

#[cfg(feature = "alloc")]
impl EmulatedFlash {
    /// Create a new erased flash with the given configuration
    pub fn new(config: EmulatorConfig) -> Self {
        let data = vec![0xFF; config.size];
        let sfdp = if config.sfdp {
            build_sfdp(&config)
        } else {
            Vec::new()
        };
        Self {
            config,
            data,
            sfdp,
            frame: Vec::new(),
            selected: false,
            write_enabled: false,
            busy: 0,
            speed_khz: 0,
            idle_byte: 0xFF,
            fail_erase: Vec::new(),
            erase_log: Vec::new(),
        }
    }

    /// Create an emulated flash with pre-filled data
    pub fn with_data(config: EmulatorConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Current bus clock
    pub fn speed_khz(&self) -> u32 {
        self.speed_khz
    }

    /// Set the byte the bus master clocks out while receiving
    pub fn set_idle_byte(&mut self, idle: u8) {
        self.idle_byte = idle;
    }

    /// Erase commands executed so far as (opcode, block address)
    pub fn erase_log(&self) -> &[(u8, u32)] {
        &self.erase_log
    }

    /// Make every erase touching `addr` fail
    pub fn fail_erase_at(&mut self, addr: u32) {
        self.fail_erase.push(addr as usize);
    }

    fn frame_address(&self) -> usize {
        ((self.frame[1] as usize) << 16) | ((self.frame[2] as usize) << 8) | self.frame[3] as usize
    }

    fn status(&self) -> Status {
        let mut status = Status::empty();
        status.set(Status::WEL, self.write_enabled);
        status.set(Status::WIP, self.busy > 0);
        status
    }

    /// Byte clocked out for the byte at `position` of the current frame
    fn reply(&mut self, position: usize) -> u8 {
        let opcode = self.frame[0];
        match opcode {
            opcodes::RDID => match position {
                1 => self.config.manufacturer_id,
                2 => (self.config.device_id >> 8) as u8,
                3 => self.config.device_id as u8,
                _ => 0xFF,
            },
            opcodes::RDSR if position >= 1 => {
                let status = self.status();
                self.busy = self.busy.saturating_sub(1);
                status.bits()
            }
            opcodes::READ if position >= 4 => {
                let addr = self.frame_address() + position - 4;
                self.data[addr % self.data.len()]
            }
            opcodes::FAST_READ if position >= 5 => {
                let addr = self.frame_address() + position - 5;
                self.data[addr % self.data.len()]
            }
            opcodes::RDSFDP if position >= 5 => {
                let addr = self.frame_address() + position - 5;
                self.sfdp.get(addr).copied().unwrap_or(0xFF)
            }
            _ => 0xFF,
        }
    }

    fn handle_page_program(&mut self) {
        if self.frame.len() < 4 {
            return;
        }
        let page_size = self.config.page_size;
        let addr = self.frame_address() % self.data.len();
        let page_base = addr - addr % page_size;

        // Flash programming: can only change 1 -> 0, wraps within the page
        for (i, &byte) in self.frame[4..].iter().enumerate() {
            let at = page_base + (addr - page_base + i) % page_size;
            self.data[at] &= byte;
        }
    }

    fn handle_erase(&mut self, opcode: u8, erase_size: usize) -> Result<()> {
        let (start, len) = if erase_size >= self.data.len() || self.frame.len() < 4 {
            (0, self.data.len())
        } else {
            let addr = self.frame_address() % self.data.len();
            (addr - addr % erase_size, erase_size)
        };

        if self
            .fail_erase
            .iter()
            .any(|&bad| bad >= start && bad < start + len)
        {
            log::debug!("emulated erase failure at 0x{:08X}", start);
            return Err(Error::SpiTransferFailed);
        }

        self.data[start..start + len].fill(0xFF);
        self.erase_log.push((opcode, start as u32));
        Ok(())
    }

    /// Execute the command collected in the current frame
    fn execute(&mut self) -> Result<()> {
        let Some(&opcode) = self.frame.first() else {
            return Ok(());
        };

        match opcode {
            opcodes::RDID | opcodes::RDSR | opcodes::READ | opcodes::FAST_READ => Ok(()),
            opcodes::RDSFDP if self.config.sfdp => Ok(()),
            opcodes::WREN => {
                self.write_enabled = true;
                Ok(())
            }
            opcodes::WRDI => {
                self.write_enabled = false;
                Ok(())
            }
            _ if self.busy > 0 => {
                log::warn!("command 0x{:02X} while busy ignored", opcode);
                Ok(())
            }
            opcodes::PP => {
                if !self.write_enabled {
                    log::warn!("page program without write enable ignored");
                    return Ok(());
                }
                self.handle_page_program();
                self.write_enabled = false;
                self.busy = self.config.busy_polls;
                Ok(())
            }
            opcodes::CE_60 | opcodes::CE_C7 => self.erase_command(opcode, self.data.len()),
            _ => match self.config.erase_size(opcode) {
                Some(size) => self.erase_command(opcode, size),
                None => {
                    log::debug!("unsupported opcode 0x{:02X}", opcode);
                    Err(Error::Unsupported)
                }
            },
        }
    }

    fn erase_command(&mut self, opcode: u8, size: usize) -> Result<()> {
        if !self.write_enabled {
            log::warn!("erase without write enable ignored");
            return Ok(());
        }
        self.write_enabled = false;
        self.handle_erase(opcode, size)?;
        self.busy = self.config.busy_polls;
        Ok(())
    }
}

#[cfg(feature = "alloc")]
impl SpiTransport for EmulatedFlash {
    fn select(&mut self, selected: bool) -> Result<()> {
        if selected {
            self.frame.clear();
            self.selected = true;
            return Ok(());
        }
        if !self.selected {
            return Ok(());
        }
        self.selected = false;
        let result = self.execute();
        self.frame.clear();
        result
    }

    fn exchange_byte(&mut self, byte: u8) -> Result<u8> {
        if !self.selected {
            return Err(Error::SpiTransferFailed);
        }
        self.frame.push(byte);
        let position = self.frame.len() - 1;
        Ok(self.reply(position))
    }

    fn idle_byte(&self) -> u8 {
        self.idle_byte
    }

    fn set_speed_khz(&mut self, khz: u32) -> Result<u32> {
        self.speed_khz = khz;
        Ok(khz)
    }

    fn deactivate(&mut self) {
        self.selected = false;
        self.frame.clear();
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}
