//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a size such as "4M", "512K" or "0x400000"
fn parse_size(s: &str) -> Result<u32, String> {
    let (digits, shift) = match s.chars().last() {
        Some('K') | Some('k') => (&s[..s.len() - 1], 10),
        Some('M') | Some('m') => (&s[..s.len() - 1], 20),
        _ => (s, 0),
    };
    let value = parse_hex_u32(digits)?;
    value
        .checked_mul(1 << shift)
        .ok_or_else(|| format!("Size {} is too large", s))
}

#[derive(Parser)]
#[command(name = "bootflash")]
#[command(author, version, about = "Boot-stage SPI flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Emulated device and bus options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Flash image backing the emulated device, written back after changes
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    /// Device size (e.g. 4M, 512K, 0x400000)
    #[arg(long, value_parser = parse_size, default_value = "4M", global = true)]
    pub size: u32,

    /// Program page size in bytes
    #[arg(long, default_value_t = 256, global = true)]
    pub page_size: u32,

    /// Give the device a page erase command (0x81)
    #[arg(long, global = true)]
    pub page_erase: bool,

    /// Advertise only the 4 KiB erase command
    #[arg(long, global = true)]
    pub sector_only: bool,

    /// Do not answer SFDP requests
    #[arg(long, global = true)]
    pub no_sfdp: bool,

    /// SPI unit
    #[arg(long, default_value_t = 0, global = true)]
    pub unit: u8,

    /// Chip select
    #[arg(long, default_value_t = 0, global = true)]
    pub chip_select: u8,

    /// Drive MOSI low instead of high while receiving
    #[arg(long, global = true)]
    pub idle_low: bool,

    /// SPI mode (0-3)
    #[arg(long, default_value_t = 3, global = true)]
    pub spi_mode: u8,

    /// Bus clock in kHz while detecting
    #[arg(long, default_value_t = 1_000, global = true)]
    pub speed_khz: u32,

    /// Bus clock in kHz after detection
    #[arg(long, default_value_t = 25_000, global = true)]
    pub max_speed_khz: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the flash and show its geometry
    Detect,

    /// Write a file to flash
    Flash {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Smart erase the target range first
        #[arg(long)]
        erase: bool,

        /// Skip verification after writing
        #[arg(long)]
        no_verify: bool,
    },

    /// Verify flash contents against a file
    Verify {
        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,
    },

    /// Read flash contents to a file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        start: u32,

        /// Number of bytes, defaults to the rest of the device
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Erase a range with page or sector erase
    Erase {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Erase only the dirty blocks of a range, with the coarsest command that pays off
    SmartErase {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Check that a range is erased
    IsErased {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Show the area an erase of a range would clear
    EraseArea {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// CRC-32 of a range
    Checksum {
        #[command(flatten)]
        range: RangeArgs,
    },
}

/// End-exclusive address range
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RangeArgs {
    /// Start address (hex, e.g., 0x10000)
    #[arg(long, value_parser = parse_hex_u32)]
    pub start: u32,

    /// End address, exclusive (hex, e.g., 0x20000)
    #[arg(long, value_parser = parse_hex_u32)]
    pub end: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4M"), Ok(4 * 1024 * 1024));
        assert_eq!(parse_size("512k"), Ok(512 * 1024));
        assert_eq!(parse_size("0x2000"), Ok(0x2000));
        assert!(parse_size("8192M").is_err());
    }
}
