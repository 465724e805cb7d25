//! bootflash-core - SPI flash engine for boot-stage flashers
//!
//! This crate programs, verifies, reads and erases serial NOR flash from a
//! bootloader context. It never allocates: all working memory is lent by the
//! caller, either as the staging buffer used by the segmented I/O engine or
//! as the scratch region backing the bit-array [`arena`].
//!
//! # Layers
//!
//! - [`spi`] - the byte-level transport trait and SPI25 opcodes
//! - [`protocol`] - SPI25 command sequences on top of the transport
//! - [`sfdp`] - JESD216 parameter table parsing
//! - [`device`] - device descriptor and erase-capability table
//! - [`detect`] - JEDEC/SFDP detection producing the two above
//! - [`flash`] - segmented I/O engine, erase-area aligner, smart erase
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for [`Error`]
//! - `checksum` - Incremental hashing of flash ranges (enabled by default)
//!
//! # Example
//!
//! ```ignore
//! use bootflash_core::{detect, flash, spi::SpiConfig};
//!
//! let found = detect::detect(&mut transport, &SpiConfig::default())?;
//! let mut device = flash::SpiFlash::new(&mut transport, found.descriptor);
//! let mut staging = [0u8; flash::STAGING_BUFFER_SIZE];
//! flash::flash(&mut device, &mut staging, 0x1000, &image, &mut flash::NoProgress)?;
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod arena;
pub mod detect;
pub mod device;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod sfdp;
pub mod spi;

pub use error::{Error, ErrorKind, Result};
