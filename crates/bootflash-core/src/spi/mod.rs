//! SPI transport layer
//!
//! The byte-level driver is a collaborator of this crate: it clocks bytes,
//! drives chip select and programs the bus speed. Everything above it talks
//! to the flash through the [`SpiTransport`] trait.

mod config;
pub mod opcodes;
mod transport;

pub use config::{SpiConfig, SpiMode};
pub use transport::SpiTransport;
