//! Erase command implementations

use bootflash_core::flash::{self, BlankCheck, SpiFlash, STAGING_BUFFER_SIZE};

use super::progress::IndicatifProgress;
use crate::cli::RangeArgs;
use crate::error::Result;
use crate::session::Session;

/// Run the erase command
pub fn run_erase(session: &mut Session, range: RangeArgs) -> Result<()> {
    let found = session.detect()?;
    let mut device = SpiFlash::new(session.transport(), found.descriptor);

    let result = flash::erase(&mut device, range.start, range.end, &mut IndicatifProgress::new());
    session.save()?;
    let area = result?;

    println!(
        "Erased 0x{:08X} - 0x{:08X} ({} bytes)",
        area.start,
        area.end,
        area.len()
    );
    Ok(())
}

/// Run the smart erase command
pub fn run_smart_erase(session: &mut Session, range: RangeArgs) -> Result<()> {
    let found = session.detect()?;
    let table = found.erase_table;
    let mut scratch = vec![0u8; flash::scratch_size(&table, found.descriptor.size)];
    let mut staging = vec![0u8; STAGING_BUFFER_SIZE];
    let mut device = SpiFlash::new(session.transport(), found.descriptor);

    let result = flash::smart_erase(
        &mut device,
        &table,
        &mut scratch,
        &mut staging,
        range.start,
        range.end,
        &mut IndicatifProgress::new(),
    );
    session.save()?;
    let report = result?;

    if report.fallback {
        println!(
            "Erased 0x{:08X} - 0x{:08X} with sector erase",
            report.area.start, report.area.end
        );
        return Ok(());
    }

    println!(
        "Checked 0x{:08X} - 0x{:08X}, erased {} bytes with {} commands",
        report.area.start,
        report.area.end,
        report.bytes_erased,
        report.total_commands()
    );
    let device_size = table.device_size();
    for (level, count) in table.levels().iter().zip(report.commands) {
        if count > 0 {
            println!("  {:>4} x {} bytes", count, level.size(device_size));
        }
    }
    Ok(())
}

/// Run the is-erased command
pub fn run_is_erased(session: &mut Session, range: RangeArgs) -> Result<()> {
    let found = session.detect()?;
    let mut staging = vec![0u8; STAGING_BUFFER_SIZE];
    let mut device = SpiFlash::new(session.transport(), found.descriptor);

    match flash::is_erased(
        &mut device,
        &mut staging,
        range.start,
        range.end,
        &mut IndicatifProgress::new(),
    )? {
        BlankCheck::Erased => println!("0x{:08X} - 0x{:08X} is erased", range.start, range.end),
        BlankCheck::Dirty { addr, found } => println!(
            "Not erased: 0x{:02X} at 0x{:08X}",
            found, addr
        ),
    }
    Ok(())
}

/// Run the erase-area command
pub fn run_erase_area(session: &mut Session, range: RangeArgs) -> Result<()> {
    let found = session.detect()?;
    let area = flash::get_erase_area(&found.descriptor, range.start, range.end);
    let plan = flash::plan_erase(&found.descriptor, range.start, range.end);

    println!(
        "Erase of 0x{:08X} - 0x{:08X} clears 0x{:08X} - 0x{:08X} ({:?} erase, {} byte blocks)",
        range.start, range.end, plan.area.start, plan.area.end, plan.mode, plan.block_size
    );
    println!(
        "Sector-aligned area: 0x{:08X} - 0x{:08X}",
        area.start, area.end
    );
    Ok(())
}
