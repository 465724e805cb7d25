//! Read command implementation

use std::path::Path;

use bootflash_core::flash::{self, SpiFlash};

use super::progress::IndicatifProgress;
use crate::error::{CliError, Result};
use crate::session::Session;

/// Run the read command
pub fn run_read(session: &mut Session, output: &Path, start: u32, length: Option<u32>) -> Result<()> {
    let found = session.detect()?;
    let size = found.descriptor.size;
    let length = length.unwrap_or(size.saturating_sub(start));

    let mut data = vec![0u8; length as usize];
    let mut device = SpiFlash::new(session.transport(), found.descriptor);
    flash::read(&mut device, start, &mut data, &mut IndicatifProgress::new())?;

    std::fs::write(output, &data).map_err(|e| CliError::io(output, e))?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}
