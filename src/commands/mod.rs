//! CLI command implementations
//!
//! Each command detects the emulated flash first, then runs one of the
//! high-level operations of `bootflash_core::flash` on it with an
//! indicatif progress bar.

mod checksum;
mod detect;
mod erase;
mod progress;
mod read;
mod write;

pub use checksum::run_checksum;
pub use detect::run_detect;
pub use erase::{run_erase, run_erase_area, run_is_erased, run_smart_erase};
pub use read::run_read;
pub use write::{run_flash, run_verify};
