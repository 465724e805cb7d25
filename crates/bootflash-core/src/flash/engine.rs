//! Segmented flash I/O
//!
//! Every operation streams through a staging buffer lent by the caller, so
//! memory use is bounded by that buffer no matter how large the range is.
//! Ranges are end-exclusive linear byte offsets.

use core::cmp::min;

use crate::device::ERASED_VALUE;
use crate::error::{Error, Result};
use crate::flash::erase_area::{plan_erase, EraseArea, EraseMode};
use crate::flash::primitives::FlashPrimitives;
use crate::flash::progress::Progress;

/// Default size of the staging buffer
pub const STAGING_BUFFER_SIZE: usize = 8192;

/// Outcome of a blank check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankCheck {
    /// Every byte reads 0xFF
    Erased,
    /// A programmed byte was found
    Dirty {
        /// Address of the first non-erased byte
        addr: u32,
        /// Value found there
        found: u8,
    },
}

impl BlankCheck {
    /// Check if the range was erased
    pub fn is_erased(&self) -> bool {
        matches!(self, Self::Erased)
    }
}

/// Incremental hash fed by [`checksum`]
#[cfg(feature = "checksum")]
pub trait HashSink {
    /// Absorb the next piece of flash content
    fn update(&mut self, data: &[u8]);
}

pub(crate) fn check_span<F: FlashPrimitives + ?Sized>(flash: &F, start: u32, end: u32) -> Result<()> {
    if end < start {
        log::error!("! invalid range 0x{:08x} - 0x{:08x}", start, end);
        return Err(Error::InvalidArgument);
    }
    if end > flash.descriptor().size {
        log::error!(
            "! range 0x{:08x} - 0x{:08x} exceeds flash size 0x{:08x}",
            start,
            end,
            flash.descriptor().size
        );
        return Err(Error::AddressOutOfBounds);
    }
    Ok(())
}

fn span_end(start: u32, len: usize) -> Result<u32> {
    u32::try_from(start as u64 + len as u64).map_err(|_| Error::AddressOutOfBounds)
}

/// Write `data` to flash at `start`
///
/// Partial pages at either end are merged with the current flash content,
/// so bytes outside `[start, start + data.len())` keep their value. The
/// target must be erased.
pub fn write<F, P>(
    flash: &mut F,
    staging: &mut [u8],
    start: u32,
    data: &[u8],
    progress: &mut P,
) -> Result<()>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    flash.descriptor().validate()?;
    let page_size = flash.descriptor().page_size as usize;
    if page_size > staging.len() {
        log::error!(
            "! page size {} exceeds reserved buffer of {} bytes",
            page_size,
            staging.len()
        );
        return Err(Error::PageSizeExceedsBuffer {
            page_size: page_size as u32,
            buffer_size: staging.len(),
        });
    }
    let end = span_end(start, data.len())?;
    check_span(flash, start, end)?;

    log::info!("# Writing...");
    progress.init(data.len() as u64);
    let result = write_pages(flash, &mut staging[..page_size], start, data, progress);
    progress.finalize();

    match result {
        Ok(()) => log::info!(". write ok"),
        Err(e) => log::error!("! write error: {}", e),
    }
    result
}

fn write_pages<F, P>(
    flash: &mut F,
    page: &mut [u8],
    start: u32,
    data: &[u8],
    progress: &mut P,
) -> Result<()>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    let page_size = page.len();
    let end = start as usize + data.len();
    let mut cursor = start as usize;
    let mut src = data;
    let mut done = 0u64;

    // Leading partial page: merge into the current page content
    let offset = cursor % page_size;
    if offset != 0 && !src.is_empty() {
        let page_start = cursor - offset;
        let seg = min(page_size - offset, src.len());
        read_for_write(flash, page_start as u32, page)?;
        page[offset..offset + seg].copy_from_slice(&src[..seg]);
        program(flash, page_start as u32, page)?;

        cursor += seg;
        src = &src[seg..];
        done += seg as u64;
        progress.set_position(done);
    }

    // Full pages straight from the source
    while cursor + page_size < end {
        program(flash, cursor as u32, &src[..page_size])?;

        cursor += page_size;
        src = &src[page_size..];
        done += page_size as u64;
        progress.set_position(done);
    }

    // Trailing 1..=page bytes: pad with the current content
    if cursor < end {
        let seg = end - cursor;
        page[..seg].copy_from_slice(src);
        if seg < page_size {
            read_for_write(flash, (cursor + seg) as u32, &mut page[seg..])?;
        }
        program(flash, cursor as u32, page)?;

        done += seg as u64;
        progress.set_position(done);
    }

    Ok(())
}

fn read_for_write<F: FlashPrimitives + ?Sized>(flash: &mut F, addr: u32, buf: &mut [u8]) -> Result<()> {
    flash.read_block(addr, buf).map_err(|e| {
        log::debug!("page read at 0x{:08x}: {}", addr, e);
        Error::WriteError { addr }
    })
}

fn program<F: FlashPrimitives + ?Sized>(flash: &mut F, addr: u32, data: &[u8]) -> Result<()> {
    flash.write_page(addr, data).map_err(|e| {
        log::debug!("page write at 0x{:08x}: {}", addr, e);
        Error::WriteError { addr }
    })
}

fn read_chunk<F: FlashPrimitives + ?Sized>(flash: &mut F, addr: u32, buf: &mut [u8]) -> Result<()> {
    flash.read_block(addr, buf).map_err(|e| {
        log::error!("! read error at 0x{:08x}: {}", addr, e);
        Error::ReadError { addr }
    })
}

/// Compare flash content at `start` with `expected`
pub fn verify<F, P>(
    flash: &mut F,
    staging: &mut [u8],
    start: u32,
    expected: &[u8],
    progress: &mut P,
) -> Result<()>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    if staging.is_empty() {
        return Err(Error::InvalidArgument);
    }
    let end = span_end(start, expected.len())?;
    check_span(flash, start, end)?;

    log::info!("# Verifying...");
    progress.init(expected.len() as u64);
    let result = verify_chunks(flash, staging, start, expected, progress);
    progress.finalize();

    if result.is_ok() {
        log::info!(". verify ok");
    }
    result
}

fn verify_chunks<F, P>(
    flash: &mut F,
    staging: &mut [u8],
    start: u32,
    expected: &[u8],
    progress: &mut P,
) -> Result<()>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    let mut offset = 0usize;
    while offset < expected.len() {
        let seg = min(staging.len(), expected.len() - offset);
        let addr = start + offset as u32;
        let buf = &mut staging[..seg];
        read_chunk(flash, addr, buf)?;

        let want = &expected[offset..offset + seg];
        if let Some(i) = buf.iter().zip(want).position(|(have, want)| have != want) {
            let err = Error::VerifyMismatch {
                addr: addr + i as u32,
                expected: want[i],
                found: buf[i],
            };
            log::error!(
                "! verify error at offset 0x{:08x}. buffer: 0x{:02x}, flash: 0x{:02x}",
                addr + i as u32,
                want[i],
                buf[i]
            );
            return Err(err);
        }

        offset += seg;
        progress.set_position(offset as u64);
    }
    Ok(())
}

/// Read `dest.len()` bytes of flash starting at `start`
///
/// Reads go straight into `dest`, in pieces of [`STAGING_BUFFER_SIZE`].
pub fn read<F, P>(flash: &mut F, start: u32, dest: &mut [u8], progress: &mut P) -> Result<()>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    let end = span_end(start, dest.len())?;
    check_span(flash, start, end)?;

    log::info!("# Reading...");
    progress.init(dest.len() as u64);
    let total = dest.len();
    let mut result = Ok(());
    let mut offset = 0usize;
    for chunk in dest.chunks_mut(STAGING_BUFFER_SIZE) {
        let len = chunk.len();
        result = read_chunk(flash, start + offset as u32, chunk);
        if result.is_err() {
            break;
        }
        offset += len;
        progress.set_position(offset as u64);
    }
    progress.finalize();

    if result.is_ok() {
        log::info!(". read ok ({} bytes)", total);
    }
    result
}

/// Feed flash content of `[start, end)` into `hasher`
#[cfg(feature = "checksum")]
pub fn checksum<F, H, P>(
    flash: &mut F,
    staging: &mut [u8],
    start: u32,
    end: u32,
    hasher: &mut H,
    progress: &mut P,
) -> Result<()>
where
    F: FlashPrimitives + ?Sized,
    H: HashSink + ?Sized,
    P: Progress + ?Sized,
{
    if staging.is_empty() {
        return Err(Error::InvalidArgument);
    }
    check_span(flash, start, end)?;

    log::info!("# Calculating checksum...");
    progress.init((end - start) as u64);
    let mut result = Ok(());
    let mut cursor = start;
    while cursor < end {
        let seg = min(staging.len(), (end - cursor) as usize);
        let buf = &mut staging[..seg];
        result = read_chunk(flash, cursor, buf);
        if result.is_err() {
            break;
        }
        hasher.update(buf);
        cursor += seg as u32;
        progress.set_position((cursor - start) as u64);
    }
    progress.finalize();
    result
}

/// Erase `[start, end)`
///
/// Returns the area actually erased, which may be wider than requested
/// when the ends are not aligned to an erase block.
pub fn erase<F, P>(flash: &mut F, start: u32, end: u32, progress: &mut P) -> Result<EraseArea>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    flash.descriptor().validate()?;
    check_span(flash, start, end)?;

    // Nothing to align, an empty range must never widen into a block
    if start == end {
        progress.init(0);
        progress.finalize();
        return Ok(EraseArea { start, end });
    }

    let plan = plan_erase(flash.descriptor(), start, end);
    let area = plan.area;
    log::info!(". erase 0x{:08x} - 0x{:08x}", area.start, area.end);

    progress.init(area.len() as u64);
    let mut result = Ok(area);
    let mut addr = area.start;
    while addr < area.end {
        let erased = match plan.mode {
            EraseMode::Page => flash.erase_page(addr),
            EraseMode::Sector => flash.erase_sector(addr),
        };
        if let Err(e) = erased {
            log::error!("! erase failed at address 0x{:08x}: {}", addr, e);
            result = Err(Error::EraseError { addr });
            break;
        }
        addr += plan.block_size;
        progress.set_position((addr - area.start) as u64);
    }
    progress.finalize();

    if result.is_ok() {
        log::info!(". erase OK");
    }
    result
}

/// Check that every byte of `[start, end)` reads 0xFF
pub fn is_erased<F, P>(
    flash: &mut F,
    staging: &mut [u8],
    start: u32,
    end: u32,
    progress: &mut P,
) -> Result<BlankCheck>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    if staging.is_empty() {
        return Err(Error::InvalidArgument);
    }
    check_span(flash, start, end)?;

    log::info!("# Checking 0x{:08x} - 0x{:08x}...", start, end);
    progress.init((end - start) as u64);
    let result = blank_check(flash, staging, start, end, progress);
    progress.finalize();

    match result {
        Ok(BlankCheck::Erased) => log::info!(". CLEAN!"),
        Ok(BlankCheck::Dirty { addr, found }) => {
            log::info!(
                "! Memory not erased at offset 0x{:08x}: expected 0xff found 0x{:02x}",
                addr,
                found
            );
            log::info!(". DIRTY!");
        }
        Err(_) => {}
    }
    result
}

fn blank_check<F, P>(
    flash: &mut F,
    staging: &mut [u8],
    start: u32,
    end: u32,
    progress: &mut P,
) -> Result<BlankCheck>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    let mut cursor = start;
    while cursor < end {
        let seg = min(staging.len(), (end - cursor) as usize);
        let buf = &mut staging[..seg];
        read_chunk(flash, cursor, buf)?;

        if buf.iter().fold(ERASED_VALUE, |acc, b| acc & b) != ERASED_VALUE {
            // Only reached for a dirty chunk, locate the first culprit
            if let Some(i) = buf.iter().position(|&b| b != ERASED_VALUE) {
                return Ok(BlankCheck::Dirty {
                    addr: cursor + i as u32,
                    found: buf[i],
                });
            }
        }

        cursor += seg as u32;
        progress.set_position((cursor - start) as u64);
    }
    Ok(BlankCheck::Erased)
}

/// Write `data` at `start`, then read it back and compare
pub fn flash<F, P>(
    flash: &mut F,
    staging: &mut [u8],
    start: u32,
    data: &[u8],
    progress: &mut P,
) -> Result<()>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    write(flash, staging, start, data, progress)?;
    verify(flash, staging, start, data, progress)
}
