//! Flash detection
//!
//! Reads the JEDEC ID, then builds the device descriptor and the erase
//! capability table from the SFDP Basic Flash Parameter Table. Devices
//! without SFDP are not supported.

use crate::device::{EraseCapabilityTable, FlashDescriptor};
use crate::error::{Error, Result};
use crate::protocol;
use crate::sfdp::{self, SfdpEraseType};
use crate::spi::{SpiConfig, SpiTransport};

/// Largest device reachable with 3-byte addresses
const MAX_3B_SIZE: u64 = 16 * 1024 * 1024;

/// A detected flash device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    /// Geometry and addressing
    pub descriptor: FlashDescriptor,
    /// Erase granularities for smart erase
    pub erase_table: EraseCapabilityTable,
}

/// Detect the flash on the bus described by `config`
///
/// The bus runs at `initial_speed_khz` while probing and is raised to
/// `max_speed_khz` once a device was found.
pub fn detect<T: SpiTransport + ?Sized>(transport: &mut T, config: &SpiConfig) -> Result<Detected> {
    log::info!(
        ". Detecting SPI flash on unit {}, chip select {}...",
        config.unit,
        config.chip_select
    );

    let result = identify(transport, config);
    match &result {
        Ok(found) => log::info!(". OK, found {}", found.descriptor.name),
        Err(e) => {
            log::error!("! failed to detect flash! ({})", e);
            transport.deactivate();
        }
    }
    result
}

/// Detect the flash and log its geometry
pub fn detect_and_describe<T: SpiTransport + ?Sized>(
    transport: &mut T,
    config: &SpiConfig,
) -> Result<Detected> {
    let found = detect(transport, config)?;
    let desc = &found.descriptor;
    log::info!(
        "  size {} KiB, page {} bytes, sector {} bytes (erase 0x{:02X})",
        desc.size / 1024,
        desc.page_size,
        desc.sector_size,
        desc.sector_erase_opcode
    );
    for level in found.erase_table.levels() {
        log::info!(
            "  erase {} bytes with 0x{:02X}",
            level.size(desc.size),
            level.opcode
        );
    }
    Ok(found)
}

fn identify<T: SpiTransport + ?Sized>(transport: &mut T, config: &SpiConfig) -> Result<Detected> {
    let speed = transport.set_speed_khz(config.initial_speed_khz)?;
    log::debug!("probing at {} kHz, {:?}", speed, config.mode);

    let (manufacturer, device) = protocol::read_jedec_id(transport)?;
    log::debug!("JEDEC ID {:02X} {:04X}", manufacturer, device);
    if (manufacturer == 0x00 && device == 0x0000) || (manufacturer == 0xFF && device == 0xFFFF) {
        return Err(Error::ChipNotFound);
    }

    let info = sfdp::probe(transport).map_err(|e| {
        log::warn!("no usable SFDP table: {}", e);
        Error::ChipNotSupported
    })?;
    let params = info.basic_params;
    log::debug!(
        "SFDP {} BFPT {}, {} bytes",
        info.header.revision,
        params.revision,
        params.density_bytes
    );

    if params.density_bytes > MAX_3B_SIZE {
        log::warn!("devices above 16 MiB need 4-byte addressing");
        return Err(Error::ChipNotSupported);
    }
    let size = params.density_bytes as u32;

    let types = params.sorted_erase_types();
    let sector = match types.first() {
        Some(erase_type) => *erase_type,
        // Pre-JESD216 style: only the 4K opcode from DWORD 1
        None if params.erase_4k_opcode != 0xFF => SfdpEraseType::from_raw(12, params.erase_4k_opcode),
        None => return Err(Error::ChipNotSupported),
    };

    let mut descriptor = FlashDescriptor::new(size, params.page_size, sector.size(), sector.opcode);
    descriptor.jedec_manufacturer = manufacturer;
    descriptor.jedec_device = device;
    descriptor.slave_id = config.chip_select;
    descriptor.spi = *config;
    descriptor.set_jedec_name(manufacturer, device);
    descriptor.validate()?;

    let erase_table = if types.is_empty() {
        EraseCapabilityTable::invalid(size)
    } else {
        EraseCapabilityTable::from_sfdp(&types, size)
    };

    let speed = transport.set_speed_khz(config.max_speed_khz)?;
    log::debug!("bus raised to {} kHz", speed);

    Ok(Detected {
        descriptor,
        erase_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::EraseLevel;
    use crate::sfdp::MX25L6436E_SFDP;
    use crate::spi::opcodes;
    use std::vec::Vec;

    /// Answers RDID with a fixed ID and RDSFDP from a table
    struct ProbeBus {
        id: [u8; 3],
        sfdp: Option<&'static [u8]>,
        frame: Vec<u8>,
        speeds: Vec<u32>,
    }

    impl ProbeBus {
        fn new(id: [u8; 3], sfdp: Option<&'static [u8]>) -> Self {
            Self {
                id,
                sfdp,
                frame: Vec::new(),
                speeds: Vec::new(),
            }
        }
    }

    impl SpiTransport for ProbeBus {
        fn select(&mut self, _selected: bool) -> Result<()> {
            self.frame.clear();
            Ok(())
        }

        fn exchange_byte(&mut self, byte: u8) -> Result<u8> {
            self.frame.push(byte);
            let n = self.frame.len();
            let reply = match self.frame[0] {
                opcodes::RDID if (2..=4).contains(&n) => self.id[n - 2],
                opcodes::RDSFDP if n > 5 => {
                    let base = ((self.frame[1] as usize) << 16)
                        | ((self.frame[2] as usize) << 8)
                        | self.frame[3] as usize;
                    self.sfdp
                        .and_then(|t| t.get(base + n - 6).copied())
                        .unwrap_or(0xFF)
                }
                _ => 0xFF,
            };
            Ok(reply)
        }

        fn set_speed_khz(&mut self, khz: u32) -> Result<u32> {
            self.speeds.push(khz);
            Ok(khz)
        }

        fn deactivate(&mut self) {}

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_detect_from_sfdp() {
        let mut bus = ProbeBus::new([0xC2, 0x20, 0x17], Some(&MX25L6436E_SFDP));
        let config = SpiConfig {
            chip_select: 1,
            ..Default::default()
        };

        let found = detect(&mut bus, &config).unwrap();
        let desc = &found.descriptor;

        assert_eq!(desc.size, 8 * 1024 * 1024);
        assert_eq!(desc.page_size, 256);
        assert_eq!(desc.sector_size, 4096);
        assert_eq!(desc.sector_erase_opcode, opcodes::SE_20);
        assert_eq!(desc.jedec_manufacturer, 0xC2);
        assert_eq!(desc.jedec_device, 0x2017);
        assert_eq!(desc.slave_id, 1);
        assert_eq!(desc.name.as_str(), "SFDP C2:2017");

        assert!(found.erase_table.is_valid());
        assert_eq!(
            found.erase_table.levels(),
            &[
                EraseLevel::block(4096, opcodes::SE_20),
                EraseLevel::block(32768, opcodes::BE_52),
                EraseLevel::block(65536, opcodes::BE_D8),
            ]
        );

        assert_eq!(bus.speeds, vec![config.initial_speed_khz, config.max_speed_khz]);
    }

    #[test]
    fn test_no_device() {
        let mut bus = ProbeBus::new([0xFF, 0xFF, 0xFF], None);
        assert_eq!(
            detect(&mut bus, &SpiConfig::default()).unwrap_err(),
            Error::ChipNotFound
        );

        let mut bus = ProbeBus::new([0x00, 0x00, 0x00], None);
        assert_eq!(
            detect(&mut bus, &SpiConfig::default()).unwrap_err(),
            Error::ChipNotFound
        );
    }

    #[test]
    fn test_device_without_sfdp() {
        let mut bus = ProbeBus::new([0xEF, 0x40, 0x16], None);
        let err = detect(&mut bus, &SpiConfig::default()).unwrap_err();
        assert_eq!(err, Error::ChipNotSupported);
        assert_eq!(err.kind(), crate::ErrorKind::Detection);
        // Never raised to full speed
        assert_eq!(bus.speeds.len(), 1);
    }
}
