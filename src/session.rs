//! Emulated device setup
//!
//! Every command runs against an [`EmulatedFlash`] built from the device
//! options. With `--image`, the image file seeds the flash content and is
//! written back after commands that modify it.

use std::path::PathBuf;

use bootflash_core::detect::{self, Detected};
use bootflash_core::spi::{opcodes, SpiConfig, SpiMode};
use bootflash_dummy::{EmulatedFlash, EmulatorConfig};

use crate::cli::DeviceArgs;
use crate::error::{CliError, Result};

/// The emulated device plus the bus it is attached to
pub struct Session {
    flash: EmulatedFlash,
    image: Option<PathBuf>,
    spi: SpiConfig,
}

impl Session {
    /// Build the emulated device described by `args`
    pub fn open(args: &DeviceArgs) -> Result<Self> {
        if !args.page_size.is_power_of_two() || args.page_size > args.size {
            return Err(CliError::InvalidConfig(format!(
                "page size {} for a {} byte device",
                args.page_size, args.size
            )));
        }
        if args.size > 16 * 1024 * 1024 || args.size < 64 * 1024 || !args.size.is_power_of_two() {
            return Err(CliError::InvalidConfig(format!(
                "size {} must be a power of two between 64 KiB and 16 MiB",
                args.size
            )));
        }

        let mut config = EmulatorConfig {
            size: args.size as usize,
            page_size: args.page_size as usize,
            sfdp: !args.no_sfdp,
            ..Default::default()
        };
        if args.page_erase {
            config.page_erase_opcode = Some(opcodes::PE_81);
        }
        if args.sector_only {
            config.erase_types = [(12, opcodes::SE_20), (0, 0xFF), (0, 0xFF), (0, 0xFF)];
        }

        let mut flash = match &args.image {
            Some(path) if path.exists() => {
                let data = std::fs::read(path).map_err(|e| CliError::io(path, e))?;
                if data.len() > config.size {
                    return Err(CliError::TooLarge {
                        what: "Image",
                        len: data.len(),
                        address: 0,
                        size: args.size,
                    });
                }
                log::debug!("Loaded {} bytes from {}", data.len(), path.display());
                EmulatedFlash::with_data(config, &data)
            }
            _ => EmulatedFlash::new(config),
        };

        let mode = SpiMode::from_index(args.spi_mode)
            .ok_or_else(|| CliError::InvalidConfig(format!("SPI mode {}", args.spi_mode)))?;
        let spi = SpiConfig {
            unit: args.unit,
            chip_select: args.chip_select,
            initial_speed_khz: args.speed_khz,
            max_speed_khz: args.max_speed_khz,
            idle_byte: if args.idle_low { 0x00 } else { 0xFF },
            mode,
        };

        flash.set_idle_byte(spi.idle_byte);

        Ok(Self {
            flash,
            image: args.image.clone(),
            spi,
        })
    }

    /// Detect the flash, logging its geometry
    pub fn detect(&mut self) -> Result<Detected> {
        let mut found = detect::detect_and_describe(&mut self.flash, &self.spi)?;
        // SFDP has no field for it, the opcode is known from the options
        if let Some(opcode) = self.flash.config().page_erase_opcode {
            found.descriptor = found.descriptor.with_page_erase(opcode);
        }
        Ok(found)
    }

    /// The transport of the emulated device
    pub fn transport(&mut self) -> &mut EmulatedFlash {
        &mut self.flash
    }

    /// Write the flash content back to the image file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.image else {
            log::debug!("No image file, changes are discarded");
            return Ok(());
        };
        std::fs::write(path, self.flash.data()).map_err(|e| CliError::io(path, e))?;
        log::debug!("Saved {} bytes to {}", self.flash.data().len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn session(args: &[&str]) -> Result<Session> {
        let mut argv = vec!["bootflash"];
        argv.extend_from_slice(args);
        argv.push("detect");
        let cli = crate::cli::Cli::parse_from(argv);
        Session::open(&cli.device)
    }

    #[test]
    fn test_detect_default_device() {
        let mut session = session(&[]).unwrap();
        let found = session.detect().unwrap();
        assert_eq!(found.descriptor.size, 4 * 1024 * 1024);
        assert_eq!(found.descriptor.page_erase_opcode, None);
        assert_eq!(found.erase_table.levels().len(), 3);
    }

    #[test]
    fn test_page_erase_option() {
        let mut session = session(&["--page-erase", "--sector-only"]).unwrap();
        let found = session.detect().unwrap();
        assert_eq!(found.descriptor.page_erase_opcode, Some(opcodes::PE_81));
        assert_eq!(found.erase_table.levels().len(), 1);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(matches!(
            session(&["--size", "32M"]),
            Err(CliError::InvalidConfig(_))
        ));
        assert!(matches!(
            session(&["--page-size", "300"]),
            Err(CliError::InvalidConfig(_))
        ));
        assert!(matches!(
            session(&["--spi-mode", "4"]),
            Err(CliError::InvalidConfig(_))
        ));
    }
}
