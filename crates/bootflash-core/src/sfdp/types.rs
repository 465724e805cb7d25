//! SFDP type definitions

/// SFDP signature magic value ("SFDP" in little-endian)
pub const SFDP_SIGNATURE: u32 = 0x50444653;

/// Maximum number of parameter headers to walk
pub const MAX_PARAMETER_HEADERS: usize = 16;

/// Basic Flash Parameter Table ID
pub const PARAM_ID_BASIC: u16 = 0xFF00;

/// SFDP revision information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

impl core::fmt::Display for SfdpRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// SFDP header structure (first 8 bytes at address 0x00)
#[derive(Debug, Clone, Copy, Default)]
pub struct SfdpHeader {
    /// SFDP signature (should be 0x50444653)
    pub signature: u32,
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers (0-based, so actual count is nph + 1)
    pub nph: u8,
}

impl SfdpHeader {
    /// Parse SFDP header from raw bytes
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            signature: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            revision: SfdpRevision {
                minor: data[4],
                major: data[5],
            },
            nph: data[6],
        }
    }

    /// Check if the signature is valid
    pub fn is_valid(&self) -> bool {
        self.signature == SFDP_SIGNATURE
    }

    /// Get the number of parameter headers
    pub fn num_param_headers(&self) -> usize {
        (self.nph as usize) + 1
    }
}

/// Parameter header structure (8 bytes each, starting at address 0x08)
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterHeader {
    /// Parameter ID (MSB << 8 | LSB)
    pub id: u16,
    /// Parameter table revision
    pub revision: SfdpRevision,
    /// Parameter table length in DWORDs
    pub length_dwords: u8,
    /// Parameter table pointer (24-bit byte address)
    pub table_pointer: u32,
}

impl ParameterHeader {
    /// Parse a parameter header from raw bytes
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            id: ((data[7] as u16) << 8) | (data[0] as u16),
            revision: SfdpRevision {
                minor: data[1],
                major: data[2],
            },
            length_dwords: data[3],
            table_pointer: u32::from_le_bytes([data[4], data[5], data[6], 0]),
        }
    }

    /// Get the table length in bytes
    pub fn length_bytes(&self) -> usize {
        (self.length_dwords as usize) * 4
    }

    /// Check if this is the Basic Flash Parameter Table
    pub fn is_basic(&self) -> bool {
        self.id == PARAM_ID_BASIC
    }
}

/// Erase type from SFDP (up to 4 types supported)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpEraseType {
    /// Erase opcode
    pub opcode: u8,
    /// Size exponent, size = 2^N bytes (0 if not supported)
    pub size_exp: u8,
}

impl SfdpEraseType {
    /// Check if this erase type is valid/supported
    pub fn is_valid(&self) -> bool {
        self.size_exp > 0 && self.opcode != 0xFF
    }

    /// Erase size in bytes (0 if not supported)
    pub fn size(&self) -> u32 {
        if self.is_valid() && self.size_exp < 32 {
            1u32 << self.size_exp
        } else {
            0
        }
    }

    /// Parse from size exponent (N where size = 2^N) and opcode
    pub fn from_raw(size_exp: u8, opcode: u8) -> Self {
        if size_exp == 0 || opcode == 0xFF {
            Self::default()
        } else {
            Self { opcode, size_exp }
        }
    }
}

/// The Basic Flash Parameter Table fields the flasher consumes
#[derive(Debug, Clone, Default)]
pub struct BasicFlashParams {
    /// Table revision
    pub revision: SfdpRevision,
    /// Flash density in bytes
    pub density_bytes: u64,
    /// 4 KiB erase opcode from DWORD 1 (0xFF if unsupported)
    pub erase_4k_opcode: u8,
    /// Erase types from DWORDs 8-9
    pub erase_types: [SfdpEraseType; 4],
    /// Page size in bytes
    pub page_size: u32,
}

impl BasicFlashParams {
    /// Valid erase types sorted by ascending size
    pub fn sorted_erase_types(&self) -> heapless::Vec<SfdpEraseType, 4> {
        let mut types: heapless::Vec<SfdpEraseType, 4> = self
            .erase_types
            .iter()
            .copied()
            .filter(SfdpEraseType::is_valid)
            .collect();
        types.sort_unstable_by_key(|t| t.size_exp);
        types
    }
}

/// Result of an SFDP probe
#[derive(Debug, Clone, Default)]
pub struct SfdpInfo {
    /// SFDP header
    pub header: SfdpHeader,
    /// Parsed Basic Flash Parameter Table
    pub basic_params: BasicFlashParams,
}
