//! SFDP parsing implementation

use crate::error::{Error, Result};
use crate::protocol;
use crate::spi::SpiTransport;

use super::types::*;

/// Parse the SFDP header and verify signature
fn parse_header<T: SpiTransport + ?Sized>(transport: &mut T) -> Result<SfdpHeader> {
    let mut buf = [0u8; 8];
    protocol::read_sfdp(transport, 0x00, &mut buf)?;

    log::trace!("SFDP header bytes: {:02X?}", buf);

    let header = SfdpHeader::parse(&buf);

    if !header.is_valid() {
        log::debug!("SFDP signature invalid (expected 'SFDP')");
        return Err(Error::ChipNotSupported);
    }

    if header.revision.major != 1 {
        log::debug!("SFDP major version {} not supported", header.revision.major);
        return Err(Error::ChipNotSupported);
    }

    log::debug!("SFDP header valid: revision {}", header.revision);

    Ok(header)
}

/// Read and parse a parameter header
fn read_param_header<T: SpiTransport + ?Sized>(
    transport: &mut T,
    index: usize,
) -> Result<ParameterHeader> {
    let mut buf = [0u8; 8];
    let addr = 0x08 + (index as u32 * 8);
    protocol::read_sfdp(transport, addr, &mut buf)?;
    Ok(ParameterHeader::parse(&buf))
}

/// Parse Basic Flash Parameter Table DWORD 1
///
/// Only the 4 KiB erase opcode is of interest here.
fn parse_bfpt_dword1(dword: u32, params: &mut BasicFlashParams) {
    // Bits [1:0] - 4KB erase support (01 = supported)
    let erase_4k_support = (dword & 0x03) == 0x01;

    // Bits [15:8] - 4KB erase opcode
    params.erase_4k_opcode = if erase_4k_support {
        ((dword >> 8) & 0xFF) as u8
    } else {
        0xFF
    };
}

/// Parse Basic Flash Parameter Table DWORD 2
///
/// Contains flash density.
fn parse_bfpt_dword2(dword: u32, params: &mut BasicFlashParams) {
    // Bit 31: density format
    // 0 = bits 30:0 contain density in bits - 1
    // 1 = bits 30:0 contain N where density = 2^N bits
    if (dword & (1 << 31)) == 0 {
        let bits = dword & 0x7FFFFFFF;
        params.density_bytes = ((bits as u64) + 1) / 8;
    } else {
        let n = dword & 0x7FFFFFFF;
        if (3..64).contains(&n) {
            params.density_bytes = 1u64 << (n - 3);
        }
    }
}

/// Parse Basic Flash Parameter Table DWORDs 8-9
///
/// Each DWORD holds two (size exponent, opcode) byte pairs.
fn parse_bfpt_erase_types(dword8: u32, dword9: u32, params: &mut BasicFlashParams) {
    for (slot, dword) in [dword8, dword9].into_iter().enumerate() {
        let lo_size = (dword & 0xFF) as u8;
        let lo_opcode = ((dword >> 8) & 0xFF) as u8;
        let hi_size = ((dword >> 16) & 0xFF) as u8;
        let hi_opcode = ((dword >> 24) & 0xFF) as u8;

        params.erase_types[slot * 2] = SfdpEraseType::from_raw(lo_size, lo_opcode);
        params.erase_types[slot * 2 + 1] = SfdpEraseType::from_raw(hi_size, hi_opcode);
    }
}

/// Parse Basic Flash Parameter Table DWORD 11
///
/// Contains page size and timing information.
fn parse_bfpt_dword11(dword: u32, params: &mut BasicFlashParams) {
    // Bits [7:4] - Page size (N, size = 2^N bytes)
    let page_size_exp = ((dword >> 4) & 0x0F) as u8;
    params.page_size = if page_size_exp > 0 {
        1u32 << page_size_exp
    } else {
        256
    };
}

/// Parse the Basic Flash Parameter Table
fn parse_bfpt<T: SpiTransport + ?Sized>(
    transport: &mut T,
    header: &ParameterHeader,
) -> Result<BasicFlashParams> {
    let len = header.length_bytes();
    if len < 36 {
        // Minimum is 9 DWORDs (JESD216)
        return Err(Error::ChipNotSupported);
    }

    // DWORD 11 is the last one we look at
    let mut buf = [0u8; 44];
    let read_len = core::cmp::min(len, buf.len());
    protocol::read_sfdp(transport, header.table_pointer, &mut buf[..read_len])?;

    let mut params = BasicFlashParams {
        revision: header.revision,
        page_size: 256,
        ..Default::default()
    };

    let get_dword = |offset: usize| -> u32 {
        if offset + 4 <= read_len {
            u32::from_le_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ])
        } else {
            0
        }
    };

    parse_bfpt_dword1(get_dword(0), &mut params);
    parse_bfpt_dword2(get_dword(4), &mut params);
    parse_bfpt_erase_types(get_dword(28), get_dword(32), &mut params);

    // JESD216A+ tables are at least 16 DWORDs
    if len >= 44 {
        parse_bfpt_dword11(get_dword(40), &mut params);
    }

    if params.density_bytes == 0 {
        return Err(Error::ChipNotSupported);
    }

    Ok(params)
}

/// Probe SFDP and parse the Basic Flash Parameter Table
pub fn probe<T: SpiTransport + ?Sized>(transport: &mut T) -> Result<SfdpInfo> {
    let header = parse_header(transport)?;

    let mut info = SfdpInfo {
        header,
        ..Default::default()
    };
    let mut found_bfpt = false;

    for i in 0..header.num_param_headers().min(MAX_PARAMETER_HEADERS) {
        let param_header = read_param_header(transport, i)?;

        if param_header.is_basic() && !found_bfpt {
            info.basic_params = parse_bfpt(transport, &param_header)?;
            found_bfpt = true;
        } else {
            log::trace!(
                "Skipping parameter table ID 0x{:04X} (rev {})",
                param_header.id,
                param_header.revision
            );
        }
    }

    if !found_bfpt {
        return Err(Error::ChipNotSupported);
    }

    Ok(info)
}

/// Check if SFDP is supported without fully parsing
pub fn is_supported<T: SpiTransport + ?Sized>(transport: &mut T) -> bool {
    let mut buf = [0u8; 4];
    if protocol::read_sfdp(transport, 0x00, &mut buf).is_err() {
        return false;
    }
    u32::from_le_bytes(buf) == SFDP_SIGNATURE
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spi::opcodes;

    /// SFDP table of the MX25L6436E (rev. 1.8 datasheet), 8 MiB
    #[rustfmt::skip]
    pub(crate) const MX25L6436E_SFDP: [u8; 88] = [
        0x53, 0x46, 0x44, 0x50, // @0x00: SFDP signature "SFDP"
        0x00, 0x01, 0x01, 0xFF, // @0x04: revision 1.0, 2 headers (NPH=1)
        0x00, 0x00, 0x01, 0x09, // @0x08: JEDEC SFDP header rev. 1.0, 9 DW long
        0x1C, 0x00, 0x00, 0xFF, // @0x0C: PTP0 = 0x1C
        0xC2, 0x00, 0x01, 0x04, // @0x10: Macronix header rev. 1.0, 4 DW long
        0x48, 0x00, 0x00, 0xFF, // @0x14: PTP1 = 0x48
        0xFF, 0xFF, 0xFF, 0xFF, // @0x18: hole
        0xE5, 0x20, 0xC9, 0xFF, // @0x1C: DWORD 1
        0xFF, 0xFF, 0xFF, 0x03, // @0x20: DWORD 2 - density
        0x00, 0xFF, 0x08, 0x6B, // @0x24: DWORD 3
        0x08, 0x3B, 0x00, 0xFF, // @0x28: DWORD 4
        0xEE, 0xFF, 0xFF, 0xFF, // @0x2C: DWORD 5
        0xFF, 0xFF, 0x00, 0x00, // @0x30: DWORD 6
        0xFF, 0xFF, 0x00, 0xFF, // @0x34: DWORD 7
        0x0C, 0x20, 0x0F, 0x52, // @0x38: DWORD 8 - erase types
        0x10, 0xD8, 0x00, 0xFF, // @0x3C: DWORD 9 - erase types
        0xFF, 0xFF, 0xFF, 0xFF, // @0x40: hole
        0xFF, 0xFF, 0xFF, 0xFF, // @0x44: hole
        0x00, 0x36, 0x00, 0x27, // @0x48: Macronix parameter table start
        0xF4, 0x4F, 0xFF, 0xFF, // @0x4C
        0xD9, 0xC8, 0xFF, 0xFF, // @0x50
        0xFF, 0xFF, 0xFF, 0xFF, // @0x54: Macronix parameter table end
    ];

    /// Transport answering RDSFDP from a static table
    struct SfdpOnlyBus {
        table: &'static [u8],
        frame: std::vec::Vec<u8>,
        cursor: usize,
    }

    impl SfdpOnlyBus {
        fn new(table: &'static [u8]) -> Self {
            Self {
                table,
                frame: std::vec::Vec::new(),
                cursor: 0,
            }
        }
    }

    impl SpiTransport for SfdpOnlyBus {
        fn select(&mut self, selected: bool) -> Result<()> {
            self.frame.clear();
            if !selected {
                self.cursor = 0;
            }
            Ok(())
        }

        fn exchange_byte(&mut self, byte: u8) -> Result<u8> {
            self.frame.push(byte);
            // opcode, 3 address bytes, 1 dummy byte, then data
            if self.frame[0] != opcodes::RDSFDP || self.frame.len() <= 5 {
                return Ok(0xFF);
            }
            if self.frame.len() == 6 {
                self.cursor = ((self.frame[1] as usize) << 16)
                    | ((self.frame[2] as usize) << 8)
                    | self.frame[3] as usize;
            }
            let value = self.table.get(self.cursor).copied().unwrap_or(0xFF);
            self.cursor += 1;
            Ok(value)
        }

        fn set_speed_khz(&mut self, khz: u32) -> Result<u32> {
            Ok(khz)
        }

        fn deactivate(&mut self) {}

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_sfdp_header_parse() {
        let data = [0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x02, 0xFF];
        let header = SfdpHeader::parse(&data);
        assert!(header.is_valid());
        assert_eq!(header.revision.major, 1);
        assert_eq!(header.revision.minor, 6);
        assert_eq!(header.num_param_headers(), 3);
    }

    #[test]
    fn test_param_header_parse() {
        let data = [0x00, 0x06, 0x01, 0x10, 0x30, 0x00, 0x00, 0xFF];
        let header = ParameterHeader::parse(&data);
        assert!(header.is_basic());
        assert_eq!(header.length_dwords, 16);
        assert_eq!(header.length_bytes(), 64);
        assert_eq!(header.table_pointer, 0x30);
    }

    #[test]
    fn test_density_parsing() {
        let mut params = BasicFlashParams::default();

        // 16 Mbit = 2 MiB: stored as bits - 1
        parse_bfpt_dword2(0x00FF_FFFF, &mut params);
        assert_eq!(params.density_bytes, 2 * 1024 * 1024);

        // 2^30 bits = 128 MiB
        parse_bfpt_dword2(0x8000_001E, &mut params);
        assert_eq!(params.density_bytes, 128 * 1024 * 1024);
    }

    #[test]
    fn test_erase_type_parsing() {
        let mut params = BasicFlashParams::default();
        parse_bfpt_erase_types(0x520F_200C, 0xFF00_D810, &mut params);

        assert_eq!(params.erase_types[0], SfdpEraseType::from_raw(12, 0x20));
        assert_eq!(params.erase_types[1].size(), 32 * 1024);
        assert_eq!(params.erase_types[2].opcode, 0xD8);
        assert!(!params.erase_types[3].is_valid());
    }

    #[test]
    fn test_parse_mx25l6436e_sfdp() {
        let mut bus = SfdpOnlyBus::new(&MX25L6436E_SFDP);
        assert!(is_supported(&mut bus));

        let info = probe(&mut bus).expect("SFDP probe should succeed");
        assert_eq!(info.header.num_param_headers(), 2);

        let params = &info.basic_params;
        assert_eq!(params.density_bytes, 8 * 1024 * 1024);
        assert_eq!(params.erase_4k_opcode, 0x20);
        // 9 DWORD table, no DWORD 11: default page size
        assert_eq!(params.page_size, 256);

        let sorted = params.sorted_erase_types();
        let sizes: std::vec::Vec<u32> = sorted.iter().map(|t| t.size()).collect();
        assert_eq!(sizes, [4096, 32768, 65536]);
        assert_eq!(sorted[0].opcode, 0x20);
        assert_eq!(sorted[1].opcode, 0x52);
        assert_eq!(sorted[2].opcode, 0xD8);
    }

    #[test]
    fn test_probe_rejects_missing_signature() {
        static BLANK: [u8; 16] = [0xFF; 16];
        let mut bus = SfdpOnlyBus::new(&BLANK);
        assert!(!is_supported(&mut bus));
        assert_eq!(probe(&mut bus).unwrap_err(), Error::ChipNotSupported);
    }
}
