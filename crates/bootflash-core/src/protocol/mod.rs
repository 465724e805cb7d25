//! Flash command protocols

pub mod spi25;

pub use spi25::*;
