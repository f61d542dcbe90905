//! Paging geometry: table levels, index extraction, and page sizes.
//!
//! The layout is the x86_64 one with 4-level paging:
//! - Bits 0-11: Page offset (4 KiB pages)
//! - Bits 12-20: PT index (level 4)
//! - Bits 21-29: PD index (level 3)
//! - Bits 30-38: PDPT index (level 2)
//! - Bits 39-47: PML4 index (level 1)
//! - Bits 48-63: Ignored by the walk

use core::fmt;

/// Default page size in bytes (4 KiB).
pub const PAGE_SIZE: u64 = 4096;

/// Size of a single page table entry in bytes.
pub const ENTRY_SIZE: u64 = 8;

/// Number of page table levels walked for a 4 KiB mapping.
pub const PAGE_TABLE_LEVELS: usize = 4;

/// Number of bits used to index a single table (512 entries).
const INDEX_BITS: u32 = 9;

/// Number of bits in the offset of a 4 KiB page.
const PAGE_OFFSET_BITS: u32 = 12;

/// A level in the page table hierarchy, numbered from the root (1) to the leaf (4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableLevel {
    /// Page map level 4, the root table.
    Pml4,
    /// Page directory pointer table. Can map a 1 GiB page.
    Pdpt,
    /// Page directory. Can map a 2 MiB page.
    Pd,
    /// Page table, the leaf level mapping 4 KiB pages.
    Pt,
}

impl TableLevel {
    /// All levels in walk order.
    pub const ALL: [TableLevel; PAGE_TABLE_LEVELS] =
        [TableLevel::Pml4, TableLevel::Pdpt, TableLevel::Pd, TableLevel::Pt];

    /// Returns the 1-based depth of this level (1 = root, 4 = leaf).
    pub const fn number(self) -> usize {
        match self {
            TableLevel::Pml4 => 1,
            TableLevel::Pdpt => 2,
            TableLevel::Pd => 3,
            TableLevel::Pt => 4,
        }
    }

    /// Returns the bit position of this level's index within a virtual address.
    pub const fn index_shift(self) -> u32 {
        PAGE_OFFSET_BITS + (PAGE_TABLE_LEVELS - self.number()) as u32 * INDEX_BITS
    }

    /// Returns the level below this one, or None for the leaf table.
    pub const fn next(self) -> Option<TableLevel> {
        match self {
            TableLevel::Pml4 => Some(TableLevel::Pdpt),
            TableLevel::Pdpt => Some(TableLevel::Pd),
            TableLevel::Pd => Some(TableLevel::Pt),
            TableLevel::Pt => None,
        }
    }

    /// Returns the page size an entry at this level maps when its large page bit is set.
    ///
    /// Only the PDPT and PD levels can terminate the walk early. The bit is ignored
    /// in the PML4 and in the leaf table.
    pub const fn large_page_size(self) -> Option<PageSize> {
        match self {
            TableLevel::Pdpt => Some(PageSize::Size1GiB),
            TableLevel::Pd => Some(PageSize::Size2MiB),
            TableLevel::Pml4 | TableLevel::Pt => None,
        }
    }

    /// Returns the short architectural name of this level.
    pub const fn name(self) -> &'static str {
        match self {
            TableLevel::Pml4 => "PML4",
            TableLevel::Pdpt => "PDPT",
            TableLevel::Pd => "PD",
            TableLevel::Pt => "PT",
        }
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{} ({})", self.number(), self.name())
    }
}

/// Returns the page table index for a given virtual address at the specified level.
#[inline]
pub const fn page_index(address: u64, level: TableLevel) -> usize {
    ((address >> level.index_shift()) & ((1 << INDEX_BITS) - 1)) as usize
}

/// The size of the page a successful translation landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageSize {
    /// A regular page mapped by the leaf table.
    Size4KiB,
    /// A large page mapped by a PD entry.
    Size2MiB,
    /// A huge page mapped by a PDPT entry.
    Size1GiB,
}

impl PageSize {
    /// Returns the number of low virtual address bits used as the offset into the page.
    pub const fn offset_bits(self) -> u32 {
        match self {
            PageSize::Size4KiB => PAGE_OFFSET_BITS,
            PageSize::Size2MiB => PAGE_OFFSET_BITS + INDEX_BITS,
            PageSize::Size1GiB => PAGE_OFFSET_BITS + 2 * INDEX_BITS,
        }
    }

    /// Returns the page size in bytes.
    pub const fn bytes(self) -> u64 {
        1 << self.offset_bits()
    }

    /// Returns the mask selecting the intra-page offset of a virtual address.
    pub const fn offset_mask(self) -> u64 {
        self.bytes() - 1
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSize::Size4KiB => write!(f, "4 KiB"),
            PageSize::Size2MiB => write!(f, "2 MiB"),
            PageSize::Size1GiB => write!(f, "1 GiB"),
        }
    }
}
