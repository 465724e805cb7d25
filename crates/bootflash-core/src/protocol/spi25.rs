//! SPI25 protocol implementation
//!
//! Common JEDEC command sequences built from the primitive transport
//! operations. Every function frames exactly one command (or a WREN plus
//! one command) between chip select edges and leaves the bus released, also
//! on error.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::spi::{opcodes, SpiTransport};

bitflags! {
    /// Status register 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Write / erase in progress
        const WIP = opcodes::SR1_WIP;
        /// Write enable latch
        const WEL = opcodes::SR1_WEL;
        /// Block protect bit 0
        const BP0 = 0x04;
        /// Block protect bit 1
        const BP1 = 0x08;
        /// Block protect bit 2
        const BP2 = 0x10;
        /// Status register protect
        const SRP = 0x80;
    }
}

/// Run `body` with chip select asserted, always releasing it afterwards
pub fn transaction<T, R>(transport: &mut T, body: impl FnOnce(&mut T) -> Result<R>) -> Result<R>
where
    T: SpiTransport + ?Sized,
{
    transport.select(true)?;
    let result = body(transport);
    let released = transport.select(false);
    let value = result?;
    released?;
    Ok(value)
}

fn address_bytes(addr: u32) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

fn send_command<T: SpiTransport + ?Sized>(transport: &mut T, opcode: u8, addr: u32) -> Result<()> {
    let [a2, a1, a0] = address_bytes(addr);
    transport.send(&[opcode, a2, a1, a0])
}

/// Read the JEDEC ID from a flash chip
///
/// Returns (manufacturer_id, device_id) on success.
pub fn read_jedec_id<T: SpiTransport + ?Sized>(transport: &mut T) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    transaction(transport, |t| {
        t.send(&[opcodes::RDID])?;
        t.receive(&mut buf)
    })?;

    let manufacturer = buf[0];
    let device = ((buf[1] as u16) << 8) | (buf[2] as u16);

    Ok((manufacturer, device))
}

/// Read status register 1
pub fn read_status<T: SpiTransport + ?Sized>(transport: &mut T) -> Result<Status> {
    let mut buf = [0u8; 1];
    transaction(transport, |t| {
        t.send(&[opcodes::RDSR])?;
        t.receive(&mut buf)
    })?;
    Ok(Status::from_bits_retain(buf[0]))
}

/// Send the Write Enable command
pub fn write_enable<T: SpiTransport + ?Sized>(transport: &mut T) -> Result<()> {
    transaction(transport, |t| t.send(&[opcodes::WREN]))
}

/// Send the Write Disable command
pub fn write_disable<T: SpiTransport + ?Sized>(transport: &mut T) -> Result<()> {
    transaction(transport, |t| t.send(&[opcodes::WRDI]))
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// # Arguments
/// * `poll_delay_us` - Delay in microseconds between status register polls
/// * `timeout_us` - Maximum time to wait before returning `Error::Timeout`
///
/// # Typical poll delays
/// * Page program: 10us
/// * 4KB sector erase: 10,000us (10ms)
/// * 32KB/64KB block erase: 100,000us (100ms)
pub fn wait_ready<T: SpiTransport + ?Sized>(
    transport: &mut T,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        timeout_us / poll_delay_us
    } else {
        timeout_us
    };

    for _ in 0..max_polls.max(1) {
        let status = read_status(transport)?;
        if !status.contains(Status::WIP) {
            return Ok(());
        }
        if poll_delay_us > 0 {
            transport.delay_us(poll_delay_us);
        }
    }

    log::debug!("flash still busy after {}us", timeout_us);
    Err(Error::Timeout)
}

/// Read data using the plain READ command and a 3-byte device address
pub fn read<T: SpiTransport + ?Sized>(transport: &mut T, addr: u32, buf: &mut [u8]) -> Result<()> {
    transaction(transport, |t| {
        send_command(t, opcodes::READ, addr)?;
        t.receive(buf)
    })
}

/// Program a single page
///
/// The data must not cross a page boundary.
/// Page program typically takes 0.7-5ms, we poll every 10us with 10ms timeout.
pub fn program_page<T: SpiTransport + ?Sized>(
    transport: &mut T,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    write_enable(transport)?;

    if let Err(e) = transaction(transport, |t| {
        send_command(t, opcodes::PP, addr)?;
        t.send(data)
    }) {
        // Leave the write enable latch cleared
        let _ = write_disable(transport);
        return Err(e);
    }

    wait_ready(transport, 10, 10_000)
}

/// Erase the block containing `addr` with the given opcode
///
/// Poll delay should match the expected erase time:
/// - 4KB sector: 10ms poll, 1s timeout (typical 45-400ms)
/// - 32KB block: 100ms poll, 4s timeout (typical 120-1600ms)
/// - 64KB block: 100ms poll, 4s timeout (typical 150-2000ms)
pub fn erase_block<T: SpiTransport + ?Sized>(
    transport: &mut T,
    opcode: u8,
    addr: u32,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    write_enable(transport)?;

    if let Err(e) = transaction(transport, |t| send_command(t, opcode, addr)) {
        let _ = write_disable(transport);
        return Err(e);
    }

    wait_ready(transport, poll_delay_us, timeout_us)
}

/// Read SFDP (Serial Flash Discoverable Parameters)
///
/// RDSFDP takes a 3-byte address followed by 8 dummy clocks.
pub fn read_sfdp<T: SpiTransport + ?Sized>(
    transport: &mut T,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    transaction(transport, |t| {
        send_command(t, opcodes::RDSFDP, addr)?;
        t.send_idle(1)?;
        t.receive(buf)
    })
}
