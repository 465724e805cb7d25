//! Erase-area alignment
//!
//! Erase commands work on whole pages or sectors. These helpers work out
//! which area a request for `[start, end)` actually touches and which
//! command clears it.

use crate::device::FlashDescriptor;

/// Half-open byte range `[start, end)` an erase covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EraseArea {
    /// First byte
    pub start: u32,
    /// One past the last byte
    pub end: u32,
}

impl EraseArea {
    /// Number of bytes in the area
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check if the area is empty
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Erase command family chosen for an area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// One page erase per page
    Page,
    /// One sector erase per sector
    Sector,
}

/// Resolved erase: the effective area and how to clear it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErasePlan {
    /// Area that will be erased
    pub area: EraseArea,
    /// Command family
    pub mode: EraseMode,
    /// Bytes cleared by one command
    pub block_size: u32,
}

/// Round `[start, end)` outward to multiples of `block`
pub(crate) fn align_out(start: u32, end: u32, block: u32) -> EraseArea {
    if block <= 1 {
        return EraseArea { start, end };
    }
    let block = block as u64;
    let aligned_start = start as u64 / block * block;
    let aligned_end = (end as u64).div_ceil(block) * block;
    EraseArea {
        start: aligned_start as u32,
        end: aligned_end.min(u32::MAX as u64) as u32,
    }
}

fn is_aligned(addr: u32, block: u32) -> bool {
    block != 0 && addr % block == 0
}

/// Area a sector erase of `[start, end)` would actually clear
///
/// The range is widened outward to sector boundaries. Applying this to its
/// own result returns the same area.
pub fn get_erase_area(descriptor: &FlashDescriptor, start: u32, end: u32) -> EraseArea {
    let area = align_out(start, end, descriptor.sector_size);
    log::debug!(
        "erase area for 0x{:08x} - 0x{:08x}: 0x{:08x} - 0x{:08x}",
        start,
        end,
        area.start,
        area.end
    );
    area
}

/// Decide how `[start, end)` gets erased
///
/// Sector erase is used whenever both ends sit on sector boundaries, page
/// erase only when that fails and the device has a page erase command with
/// both ends on page boundaries. Anything else is widened to the enclosing
/// sectors with a warning.
pub fn plan_erase(descriptor: &FlashDescriptor, start: u32, end: u32) -> ErasePlan {
    let sector = descriptor.sector_size;
    let page = descriptor.page_size;

    if is_aligned(start, sector) && is_aligned(end, sector) {
        return ErasePlan {
            area: EraseArea { start, end },
            mode: EraseMode::Sector,
            block_size: sector,
        };
    }

    if descriptor.page_erase_opcode.is_some() && is_aligned(start, page) && is_aligned(end, page) {
        return ErasePlan {
            area: EraseArea { start, end },
            mode: EraseMode::Page,
            block_size: page,
        };
    }

    let area = get_erase_area(descriptor, start, end);
    if area.start != start {
        log::warn!(
            "Warning: changing the start address from 0x{:08x} to 0x{:08x}",
            start,
            area.start
        );
    }
    if area.end != end {
        log::warn!(
            "Warning: changing the end address from 0x{:08x} to 0x{:08x}",
            end,
            area.end
        );
    }
    ErasePlan {
        area,
        mode: EraseMode::Sector,
        block_size: sector,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    fn descriptor() -> FlashDescriptor {
        FlashDescriptor::new(0x40_0000, 256, 4096, opcodes::SE_20)
    }

    #[test]
    fn test_get_erase_area_widens() {
        let area = get_erase_area(&descriptor(), 0x1100, 0x2100);
        assert_eq!(area, EraseArea { start: 0x1000, end: 0x3000 });
        assert_eq!(area.len(), 0x2000);
    }

    #[test]
    fn test_get_erase_area_idempotent() {
        let desc = descriptor();
        for (start, end) in [(0, 1), (0x123, 0x4567), (0x1000, 0x2000), (0x3FFF00, 0x400000)] {
            let once = get_erase_area(&desc, start, end);
            let twice = get_erase_area(&desc, once.start, once.end);
            assert_eq!(once, twice);
            assert!(once.start <= start && once.end >= end);
        }
    }

    #[test]
    fn test_get_erase_area_empty_range() {
        let area = get_erase_area(&descriptor(), 0x1000, 0x1000);
        assert!(area.is_empty());
    }

    #[test]
    fn test_sector_aligned_never_uses_page_erase() {
        let desc = descriptor().with_page_erase(opcodes::PE_81);
        let plan = plan_erase(&desc, 0x2000, 0x4000);
        assert_eq!(plan.mode, EraseMode::Sector);
        assert_eq!(plan.area, EraseArea { start: 0x2000, end: 0x4000 });
    }

    #[test]
    fn test_page_aligned_uses_page_erase() {
        let desc = descriptor().with_page_erase(opcodes::PE_81);
        let plan = plan_erase(&desc, 0x2100, 0x2300);
        assert_eq!(plan.mode, EraseMode::Page);
        assert_eq!(plan.block_size, 256);
        assert_eq!(plan.area, EraseArea { start: 0x2100, end: 0x2300 });
    }

    #[test]
    fn test_page_aligned_without_page_erase_widens() {
        let plan = plan_erase(&descriptor(), 0x2100, 0x2300);
        assert_eq!(plan.mode, EraseMode::Sector);
        assert_eq!(plan.area, EraseArea { start: 0x2000, end: 0x3000 });
    }

    #[test]
    fn test_unaligned_widens_to_sectors() {
        let desc = descriptor().with_page_erase(opcodes::PE_81);
        let plan = plan_erase(&desc, 0x2010, 0x2300);
        assert_eq!(plan.mode, EraseMode::Sector);
        assert_eq!(plan.area, EraseArea { start: 0x2000, end: 0x3000 });
    }
}
