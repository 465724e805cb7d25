//! Flash and verify command implementations

use std::path::Path;

use bootflash_core::flash::{self, SpiFlash, STAGING_BUFFER_SIZE};

use super::progress::IndicatifProgress;
use crate::error::{CliError, Result};
use crate::session::Session;

fn load_input(path: &Path, address: u32, size: u32) -> Result<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| CliError::io(path, e))?;
    if address as u64 + data.len() as u64 > size as u64 {
        return Err(CliError::TooLarge {
            what: "Input",
            len: data.len(),
            address,
            size,
        });
    }
    Ok(data)
}

/// Run the flash command
pub fn run_flash(
    session: &mut Session,
    input: &Path,
    address: u32,
    erase: bool,
    verify: bool,
) -> Result<()> {
    let found = session.detect()?;
    let data = load_input(input, address, found.descriptor.size)?;
    let end = address + data.len() as u32;

    let mut staging = vec![0u8; STAGING_BUFFER_SIZE];
    let mut scratch = vec![0u8; flash::scratch_size(&found.erase_table, found.descriptor.size)];
    let mut progress = IndicatifProgress::new();

    let table = found.erase_table;
    let mut device = SpiFlash::new(session.transport(), found.descriptor);

    if erase {
        // Whole erase blocks around the image lose their content
        flash::smart_erase(
            &mut device,
            &table,
            &mut scratch,
            &mut staging,
            address,
            end,
            &mut progress,
        )?;
    }

    let result = if verify {
        flash::flash(&mut device, &mut staging, address, &data, &mut progress)
    } else {
        flash::write(&mut device, &mut staging, address, &data, &mut progress)
    };

    // Keep whatever made it to flash, also on failure
    session.save()?;
    result?;

    println!("Wrote {} bytes at 0x{:08X}", data.len(), address);
    Ok(())
}

/// Run the verify command
pub fn run_verify(session: &mut Session, input: &Path, address: u32) -> Result<()> {
    let found = session.detect()?;
    let data = load_input(input, address, found.descriptor.size)?;

    let mut staging = vec![0u8; STAGING_BUFFER_SIZE];
    let mut device = SpiFlash::new(session.transport(), found.descriptor);
    flash::verify(
        &mut device,
        &mut staging,
        address,
        &data,
        &mut IndicatifProgress::new(),
    )?;

    println!("Verified {} bytes at 0x{:08X}", data.len(), address);
    Ok(())
}
