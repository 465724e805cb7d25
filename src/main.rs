//! bootflash - Boot-stage SPI flash programmer
//!
//! Drives the `bootflash-core` flash engine against an emulated SPI NOR
//! flash. The device content lives in an image file, so a sequence of
//! commands behaves like a session with a real board.
//!
//! # Architecture
//!
//! - `bootflash-core` - transport trait, SPI25 protocol, SFDP detection,
//!   segmented I/O engine and smart erase
//! - `bootflash-dummy` - in-memory SPI NOR flash behind the transport trait
//! - this binary - argument parsing, progress bars, image file handling

mod cli;
mod commands;
mod error;
mod session;

use clap::Parser;
use cli::{Cli, Commands};
use session::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let mut session = Session::open(&cli.device)?;

    match cli.command {
        Commands::Detect => commands::run_detect(&mut session),
        Commands::Flash {
            input,
            address,
            erase,
            no_verify,
        } => commands::run_flash(&mut session, &input, address, erase, !no_verify),
        Commands::Verify { input, address } => commands::run_verify(&mut session, &input, address),
        Commands::Read {
            output,
            start,
            length,
        } => commands::run_read(&mut session, &output, start, length),
        Commands::Erase { range } => commands::run_erase(&mut session, range),
        Commands::SmartErase { range } => commands::run_smart_erase(&mut session, range),
        Commands::IsErased { range } => commands::run_is_erased(&mut session, range),
        Commands::EraseArea { range } => commands::run_erase_area(&mut session, range),
        Commands::Checksum { range } => commands::run_checksum(&mut session, range),
    }?;

    Ok(())
}
