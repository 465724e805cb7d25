//! Flash device descriptor and erase-capability table
//!
//! Both are produced once by detection and are read-only afterwards. They
//! are plain values: the descriptor travels inside the SPI flash adapter,
//! the erase table is handed to the smart erase planner explicitly.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::error::{Error, Result};
use crate::sfdp::SfdpEraseType;
use crate::spi::{opcodes, SpiConfig};

/// Maximum length of a device name
pub const NAME_LEN: usize = 32;

/// Maximum number of erase granularities a device advertises
pub const MAX_ERASE_LEVELS: usize = 4;

/// Erased value of a NOR flash byte
pub const ERASED_VALUE: u8 = 0xFF;

/// Geometry and addressing of one detected flash device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashDescriptor {
    /// Human readable name
    pub name: String<NAME_LEN>,
    /// JEDEC manufacturer ID
    pub jedec_manufacturer: u8,
    /// JEDEC device ID
    pub jedec_device: u16,
    /// Capacity in bytes
    pub size: u32,
    /// Program page size in bytes
    pub page_size: u32,
    /// Uniform sector (smallest erase block) size in bytes
    pub sector_size: u32,
    /// Opcode erasing one sector
    pub sector_erase_opcode: u8,
    /// Opcode erasing one page, for devices that have one
    pub page_erase_opcode: Option<u8>,
    /// Chip select the device answers on
    pub slave_id: u8,
    /// Bit position of the page number in device addresses (0 = linear)
    pub page_addr_shift: u8,
    /// Bit position of the sector number in erase addresses (0 = linear)
    pub sector_addr_shift: u8,
    /// Bus settings the device was detected with
    pub spi: SpiConfig,
}

impl FlashDescriptor {
    /// Describe a linearly addressed device with a uniform sector size
    pub fn new(size: u32, page_size: u32, sector_size: u32, sector_erase_opcode: u8) -> Self {
        Self {
            name: String::new(),
            jedec_manufacturer: 0,
            jedec_device: 0,
            size,
            page_size,
            sector_size,
            sector_erase_opcode,
            page_erase_opcode: None,
            slave_id: 0,
            page_addr_shift: 0,
            sector_addr_shift: 0,
            spi: SpiConfig::default(),
        }
    }

    /// Set the device name, truncating it to [`NAME_LEN`]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name.clear();
        for c in name.chars() {
            if self.name.push(c).is_err() {
                break;
            }
        }
        self
    }

    /// Set the page erase opcode
    pub fn with_page_erase(mut self, opcode: u8) -> Self {
        self.page_erase_opcode = Some(opcode);
        self
    }

    /// Set the page / sector address shifts of a split addressed device
    pub fn with_address_shift(mut self, page_shift: u8, sector_shift: u8) -> Self {
        self.page_addr_shift = page_shift;
        self.sector_addr_shift = sector_shift;
        self
    }

    /// Check the geometry is usable by the engine
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0
            || self.sector_size == 0
            || self.size == 0
            || self.sector_size % self.page_size != 0
            || self.size % self.sector_size != 0
        {
            log::error!(
                "invalid geometry: size {} page {} sector {}",
                self.size,
                self.page_size,
                self.sector_size
            );
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Check if `[addr, addr + len)` lies inside the device
    pub fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        addr as u64 + len as u64 <= self.size as u64
    }

    /// Translate a linear address into the address sent with read/program
    pub fn device_address(&self, linear: u32) -> u32 {
        if self.page_addr_shift == 0 {
            return linear;
        }
        let page = linear / self.page_size;
        let byte = linear % self.page_size;
        (page << self.page_addr_shift) | byte
    }

    /// Translate a linear address into the address sent with sector erase
    pub fn sector_address(&self, linear: u32) -> u32 {
        if self.sector_addr_shift == 0 {
            return self.device_address(linear);
        }
        (linear / self.sector_size) << self.sector_addr_shift
    }

    /// Build the device name from the JEDEC ID
    pub(crate) fn set_jedec_name(&mut self, manufacturer: u8, device: u16) {
        self.name.clear();
        // 17 characters always fit
        let _ = write!(self.name, "SFDP {:02X}:{:04X}", manufacturer, device);
    }
}

/// Size of the area one erase command clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// A power-of-two block
    Block(u32),
    /// The whole device
    Chip,
}

/// One erase command the device supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseLevel {
    /// Area erased by the command
    pub granularity: Granularity,
    /// Command opcode
    pub opcode: u8,
}

impl EraseLevel {
    /// A block erase command
    pub const fn block(size: u32, opcode: u8) -> Self {
        Self {
            granularity: Granularity::Block(size),
            opcode,
        }
    }

    /// A chip erase command
    pub const fn chip(opcode: u8) -> Self {
        Self {
            granularity: Granularity::Chip,
            opcode,
        }
    }

    /// Bytes erased by one command on a device of `device_size` bytes
    pub fn size(&self, device_size: u32) -> u32 {
        match self.granularity {
            Granularity::Block(size) => size,
            Granularity::Chip => device_size,
        }
    }

    /// Check if this is the chip erase level
    pub fn is_chip(&self) -> bool {
        matches!(self.granularity, Granularity::Chip)
    }
}

/// Erase granularities of a device, finest first
///
/// A table marked invalid carries no levels; smart erase then falls back
/// to plain sector erase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseCapabilityTable {
    valid: bool,
    levels: Vec<EraseLevel, MAX_ERASE_LEVELS>,
    device_size: u32,
}

impl EraseCapabilityTable {
    /// A table without usable erase information
    pub fn invalid(device_size: u32) -> Self {
        Self {
            valid: false,
            levels: Vec::new(),
            device_size,
        }
    }

    /// Build a valid table from explicit levels
    ///
    /// Block sizes must be powers of two, strictly increasing and no larger
    /// than the device. A chip level may only come last.
    pub fn new(levels: &[EraseLevel], device_size: u32) -> Result<Self> {
        if levels.is_empty() || levels.len() > MAX_ERASE_LEVELS || device_size == 0 {
            return Err(Error::InvalidArgument);
        }

        let mut previous = 0u32;
        for (i, level) in levels.iter().enumerate() {
            match level.granularity {
                Granularity::Block(size) => {
                    if !size.is_power_of_two() || size <= previous || size > device_size {
                        log::error!("erase level {}: bad granularity 0x{:X}", i + 1, size);
                        return Err(Error::InvalidArgument);
                    }
                    previous = size;
                }
                Granularity::Chip => {
                    if i + 1 != levels.len() {
                        log::error!("erase level {}: chip erase must be the last level", i + 1);
                        return Err(Error::InvalidArgument);
                    }
                }
            }
        }
        if levels[0].is_chip() {
            return Err(Error::InvalidArgument);
        }

        let mut table = Self::invalid(device_size);
        table.valid = true;
        for level in levels {
            // Capacity checked above
            let _ = table.levels.push(*level);
        }
        Ok(table)
    }

    /// Build a table from log2 block sizes
    ///
    /// Each entry is `(exponent, opcode)`; granularity is `1 << exponent` and
    /// an exponent of 0 marks the level as unused. A table flagged invalid
    /// ignores the entries.
    pub fn from_exponents(
        valid: bool,
        entries: [(u8, u8); MAX_ERASE_LEVELS],
        device_size: u32,
    ) -> Result<Self> {
        if !valid {
            log::debug!("erase capability table marked invalid");
            return Ok(Self::invalid(device_size));
        }

        let mut levels: Vec<EraseLevel, MAX_ERASE_LEVELS> = Vec::new();
        for (exponent, opcode) in entries {
            if exponent == 0 {
                continue;
            }
            if exponent >= 32 {
                return Err(Error::InvalidArgument);
            }
            let _ = levels.push(EraseLevel::block(1u32 << exponent, opcode));
        }
        Self::new(&levels, device_size)
    }

    /// Build a table from the SFDP erase types, sorted by size
    pub fn from_sfdp(types: &[SfdpEraseType], device_size: u32) -> Self {
        let mut levels: Vec<EraseLevel, MAX_ERASE_LEVELS> = Vec::new();
        for erase_type in types.iter().filter(|t| t.is_valid()) {
            let size = erase_type.size();
            if size == 0 || size > device_size || levels.is_full() {
                continue;
            }
            if levels.iter().any(|l| l.size(device_size) == size) {
                continue;
            }
            let _ = levels.push(EraseLevel::block(size, erase_type.opcode));
        }
        levels.sort_unstable_by_key(|l| l.size(device_size));

        match Self::new(&levels, device_size) {
            Ok(table) => table,
            Err(_) => {
                log::warn!("SFDP erase types unusable, smart erase disabled");
                Self::invalid(device_size)
            }
        }
    }

    /// Check if the table carries usable data
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// All levels, finest first
    pub fn levels(&self) -> &[EraseLevel] {
        &self.levels
    }

    /// Finest level, if any
    pub fn finest(&self) -> Option<&EraseLevel> {
        self.levels.first()
    }

    /// Capacity of the device the table describes
    pub fn device_size(&self) -> u32 {
        self.device_size
    }
}

impl Default for FlashDescriptor {
    fn default() -> Self {
        Self::new(4 * 1024 * 1024, 256, 4096, opcodes::SE_20)
    }
}
