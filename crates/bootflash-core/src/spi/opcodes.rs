//! Standard JEDEC SPI flash opcodes
//!
//! Only the single I/O, 3-byte address subset used by the flasher is listed.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status and identification
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read JEDEC ID (manufacturer + 2 byte device id)
pub const RDID: u8 = 0x9F;
/// Read SFDP (JEDEC JESD216), 3-byte address plus 8 dummy clocks
pub const RDSFDP: u8 = 0x5A;

// ============================================================================
// Read / program
// ============================================================================

/// Read Data (no dummy cycles)
pub const READ: u8 = 0x03;
/// Fast Read, 8 dummy clocks
pub const FAST_READ: u8 = 0x0B;
/// Page Program
pub const PP: u8 = 0x02;

// ============================================================================
// Erase
// ============================================================================

/// Sector Erase 4 KiB
pub const SE_20: u8 = 0x20;
/// Block Erase 32 KiB
pub const BE_52: u8 = 0x52;
/// Block Erase 64 KiB
pub const BE_D8: u8 = 0xD8;
/// Chip Erase
pub const CE_60: u8 = 0x60;
/// Chip Erase (alternate)
pub const CE_C7: u8 = 0xC7;
/// Page Erase on devices that support it (Atmel/Adesto, Micron M25PE)
pub const PE_81: u8 = 0x81;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
