//! Smart erase
//!
//! Erases only what needs erasing, using the coarsest command that pays
//! off. The range is scanned at the finest granularity into a dirty bitmap;
//! runs of mostly dirty blocks are then promoted level by level to the next
//! coarser erase command, and finally every marked block is erased once.
//!
//! Bitmaps live in the scratch arena, one per granularity, indexed by
//! absolute address divided by the granularity.

use core::cmp::min;
use core::ops::Range;

use heapless::Vec;

use crate::arena::{Arena, Bit, BitVec};
use crate::device::{EraseCapabilityTable, EraseLevel, ERASED_VALUE, MAX_ERASE_LEVELS};
use crate::error::{Error, Result};
use crate::flash::engine::{check_span, erase};
use crate::flash::erase_area::{align_out, EraseArea};
use crate::flash::primitives::FlashPrimitives;
use crate::flash::progress::Progress;

/// What a smart erase did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmartEraseReport {
    /// Area that was scanned, aligned to the finest granularity
    pub area: EraseArea,
    /// Erase commands issued per level, finest first
    pub commands: [u32; MAX_ERASE_LEVELS],
    /// Bytes erased
    pub bytes_erased: u64,
    /// The table was unusable and a plain erase ran instead
    pub fallback: bool,
}

impl SmartEraseReport {
    /// Total number of erase commands issued
    pub fn total_commands(&self) -> u32 {
        self.commands.iter().sum()
    }
}

fn bitmap_bits(device_size: u32, granularity: u32) -> usize {
    (device_size as u64).div_ceil(granularity as u64) as usize
}

/// Scratch bytes a smart erase on a device of `device_size` bytes needs
pub fn scratch_size(table: &EraseCapabilityTable, device_size: u32) -> usize {
    table
        .levels()
        .iter()
        .take_while(|level| !level.is_chip())
        .map(|level| bitmap_bits(device_size, level.size(device_size)).div_ceil(8))
        .sum()
}

/// Erase one block with the command of `level`
///
/// Chip erase is never issued from here.
pub fn erase_block<F: FlashPrimitives + ?Sized>(
    flash: &mut F,
    level: &EraseLevel,
    addr: u32,
) -> Result<()> {
    if level.is_chip() {
        log::error!("! chip erase is not supported");
        return Err(Error::Unsupported);
    }
    let size = level.size(flash.descriptor().size);
    log::debug!(
        ". erase 0x{:08x} - 0x{:08x} (0x{:02x})",
        addr,
        addr as u64 + size as u64,
        level.opcode
    );
    flash.erase_area(addr, level.opcode, size)
}

/// Promote mostly dirty coarse blocks
///
/// Each coarse block in `coarse_range` spans `ratio` fine blocks. When more
/// than half of them are dirty, the coarse block is marked and its fine
/// blocks are cleared. Returns the number of promoted blocks.
pub fn promote(
    fine: &mut BitVec<'_>,
    coarse: &mut BitVec<'_>,
    ratio: usize,
    coarse_range: Range<usize>,
) -> Result<usize> {
    if ratio == 0 {
        return Err(Error::InvalidArgument);
    }

    let mut promoted = 0;
    for index in coarse_range {
        let children = index * ratio..(index + 1) * ratio;
        if fine.count_set(children.clone())? > ratio / 2 {
            coarse.set(index, Bit::Set)?;
            fine.clear_range(children)?;
            promoted += 1;
        }
    }
    Ok(promoted)
}

fn scan<F, P>(
    flash: &mut F,
    staging: &mut [u8],
    granularity: u32,
    area: EraseArea,
    dirty: &mut BitVec<'_>,
    progress: &mut P,
) -> Result<usize>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    let mut count = 0;
    let mut block = area.start;
    while block < area.end {
        let mut acc = ERASED_VALUE;
        let mut offset = 0u32;
        while offset < granularity && acc == ERASED_VALUE {
            let seg = min(staging.len() as u32, granularity - offset);
            let addr = block + offset;
            let buf = &mut staging[..seg as usize];
            flash.read_block(addr, buf).map_err(|e| {
                log::error!("! read error at 0x{:08x}: {}", addr, e);
                Error::ReadError { addr }
            })?;
            acc = buf.iter().fold(acc, |acc, b| acc & b);
            offset += seg;
        }

        if acc != ERASED_VALUE {
            dirty.set((block / granularity) as usize, Bit::Set)?;
            count += 1;
        }

        block += granularity;
        progress.set_position((block - area.start) as u64);
    }
    Ok(count)
}

/// Erase the dirty part of `[start, end)` with as few commands as possible
///
/// `scratch` backs the dirty bitmaps and must hold at least
/// [`scratch_size`] bytes. An invalid `table` makes this a plain
/// [`erase`]. A failing block erase does not stop the pass; the first
/// failed address is returned as `EraseError` once all other blocks have
/// been handled.
pub fn smart_erase<F, P>(
    flash: &mut F,
    table: &EraseCapabilityTable,
    scratch: &mut [u8],
    staging: &mut [u8],
    start: u32,
    end: u32,
    progress: &mut P,
) -> Result<SmartEraseReport>
where
    F: FlashPrimitives + ?Sized,
    P: Progress + ?Sized,
{
    if !table.is_valid() {
        log::warn!("no erase capability table, falling back to plain erase");
        let area = erase(flash, start, end, progress)?;
        return Ok(SmartEraseReport {
            area,
            bytes_erased: area.len() as u64,
            fallback: true,
            ..Default::default()
        });
    }
    if staging.is_empty() {
        return Err(Error::InvalidArgument);
    }
    check_span(flash, start, end)?;

    if start == end {
        progress.init(0);
        progress.finalize();
        return Ok(SmartEraseReport {
            area: EraseArea { start, end },
            ..Default::default()
        });
    }

    let device_size = flash.descriptor().size;
    if table.device_size() != device_size {
        log::warn!(
            "erase table describes 0x{:08x} bytes, device has 0x{:08x}",
            table.device_size(),
            device_size
        );
    }

    let levels: Vec<EraseLevel, MAX_ERASE_LEVELS> = table
        .levels()
        .iter()
        .take_while(|level| !level.is_chip())
        .copied()
        .collect();
    if levels.len() < table.levels().len() {
        log::debug!("chip erase level not used by smart erase");
    }
    let finest = table.finest().ok_or(Error::Unsupported)?.size(device_size);

    let mut arena = Arena::new(scratch);
    let mut maps: Vec<BitVec<'_>, MAX_ERASE_LEVELS> = Vec::new();
    for level in &levels {
        let map = arena.new_bit_vector(bitmap_bits(device_size, level.size(device_size)))?;
        maps.push(map).map_err(|_| Error::InvalidArgument)?;
    }

    let area = align_out(start, end, finest);
    log::info!("# Checking data...");
    progress.init(area.len() as u64);
    let scanned = scan(flash, staging, finest, area, &mut maps[0], progress);
    progress.finalize();
    let dirty = scanned?;
    log::debug!("{} of {} blocks dirty", dirty, area.len() / finest);

    for k in 0..levels.len() - 1 {
        let fine_size = levels[k].size(device_size);
        let coarse_size = levels[k + 1].size(device_size);
        // Only coarse blocks entirely inside the scanned area
        let first = area.start.div_ceil(coarse_size) as usize;
        let last = (area.end / coarse_size) as usize;
        if first >= last {
            continue;
        }
        let (lower, upper) = maps.split_at_mut(k + 1);
        let promoted = promote(
            &mut lower[k],
            &mut upper[0],
            (coarse_size / fine_size) as usize,
            first..last,
        )?;
        if promoted > 0 {
            log::debug!("{} blocks promoted to {} bytes", promoted, coarse_size);
        }
    }

    let total: u64 = maps
        .iter()
        .zip(levels.iter())
        .map(|(map, level)| map.count_ones() as u64 * level.size(device_size) as u64)
        .sum();

    let mut report = SmartEraseReport {
        area,
        ..Default::default()
    };
    let mut failed = 0u32;
    let mut first_failure = None;
    let mut done = 0u64;

    log::info!("# Erasing...");
    progress.init(total);
    for (k, (map, level)) in maps.iter().zip(levels.iter()).enumerate() {
        let size = level.size(device_size);
        for index in map.iter_set() {
            let addr = index as u32 * size;
            match erase_block(flash, level, addr) {
                Ok(()) => {
                    report.commands[k] += 1;
                    report.bytes_erased += size as u64;
                }
                Err(e) => {
                    log::error!("! erase failed at address 0x{:08x}: {}", addr, e);
                    failed += 1;
                    first_failure.get_or_insert(addr);
                }
            }
            done += size as u64;
            progress.set_position(done);
        }
    }
    progress.finalize();

    if let Some(addr) = first_failure {
        log::error!("! erase error: {} blocks failed", failed);
        return Err(Error::EraseError { addr });
    }

    log::info!(
        ". erase OK ({} commands, {} bytes)",
        report.total_commands(),
        report.bytes_erased
    );
    Ok(report)
}
