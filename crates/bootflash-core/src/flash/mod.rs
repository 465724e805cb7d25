//! Flash operations
//!
//! The segmented I/O engine, the erase-area aligner and the smart erase
//! planner, all written against the [`FlashPrimitives`] trait. [`SpiFlash`]
//! implements the primitives for an SPI25 device behind a transport.

mod engine;
mod erase_area;
#[cfg(test)]
mod mock;
mod primitives;
mod progress;
mod smart_erase;
mod spi_device;

pub use engine::*;
pub use erase_area::{get_erase_area, plan_erase, EraseArea, EraseMode, ErasePlan};
pub use primitives::FlashPrimitives;
pub use progress::{NoProgress, Progress};
pub use smart_erase::{
    erase_block, promote, scratch_size, smart_erase, SmartEraseReport,
};
pub use spi_device::SpiFlash;
