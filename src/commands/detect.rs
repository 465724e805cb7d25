//! Detect command implementation

use crate::error::Result;
use crate::session::Session;

/// Run the detect command
pub fn run_detect(session: &mut Session) -> Result<()> {
    let found = session.detect()?;
    let desc = &found.descriptor;

    println!(
        "Found: {} ({} bytes, page {} bytes, sector {} bytes)",
        desc.name, desc.size, desc.page_size, desc.sector_size
    );
    println!(
        "JEDEC ID: {:02X} {:04X}, chip select {}",
        desc.jedec_manufacturer, desc.jedec_device, desc.slave_id
    );
    if let Some(opcode) = desc.page_erase_opcode {
        println!("Page erase: 0x{:02X}", opcode);
    }

    if found.erase_table.is_valid() {
        println!("Erase granularities:");
        for level in found.erase_table.levels() {
            println!(
                "  {:>8} bytes  opcode 0x{:02X}",
                level.size(desc.size),
                level.opcode
            );
        }
    } else {
        println!("No erase capability table, smart erase uses sector erase");
    }
    Ok(())
}
