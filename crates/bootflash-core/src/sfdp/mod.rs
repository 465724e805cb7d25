//! SFDP (Serial Flash Discoverable Parameters) parsing
//!
//! Parses the subset of JEDEC JESD216 the flasher needs: the SFDP header,
//! the parameter headers and the Basic Flash Parameter Table (density, page
//! size and the four erase types).
//!
//! # Usage
//!
//! ```ignore
//! use bootflash_core::sfdp;
//!
//! let info = sfdp::probe(&mut transport)?;
//! println!("Flash size: {} bytes", info.basic_params.density_bytes);
//! ```

mod parser;
mod types;

pub use parser::*;
pub use types::*;

#[cfg(test)]
pub(crate) use parser::tests::MX25L6436E_SFDP;
