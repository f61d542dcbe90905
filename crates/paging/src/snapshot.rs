//! Sparse snapshot of physical memory.
//!
//! Only the 8-byte cells holding page table entries are recorded. Every other address
//! reads as "not found", which the walk treats exactly like a non-present entry.

use hashbrown::HashMap;

use crate::{PhysicalAddress, entry::PageDescriptor};

/// A single 8-byte cell of physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCell {
    /// Physical address of the cell.
    pub address: PhysicalAddress,
    /// The value stored at that address.
    pub descriptor: PageDescriptor,
}

impl MemoryCell {
    /// Creates a cell from a raw address and a raw stored value.
    pub const fn new(address: u64, raw: u64) -> Self {
        Self {
            address: PhysicalAddress::new(address),
            descriptor: PageDescriptor::from_raw(raw),
        }
    }
}

/// Counters collected while a snapshot is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadStats {
    /// Number of cells offered to the snapshot.
    pub cells_read: u64,
    /// Number of cells skipped because their present bit was clear.
    pub non_present_dropped: u64,
    /// Number of cells that replaced or evicted an earlier cell at the same address.
    pub duplicates_overwritten: u64,
}

/// An address-indexed, read-only view of the memory cells holding page table entries.
///
/// Cells are applied in order and the last write to an address wins. A later cell whose
/// present bit is clear evicts an earlier present one, so skipping non-present cells
/// never changes what a lookup returns.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    cells: HashMap<PhysicalAddress, PageDescriptor>,
    stats: LoadStats,
}

impl MemorySnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty snapshot with room for `capacity` cells.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: HashMap::with_capacity(capacity),
            stats: LoadStats::default(),
        }
    }

    /// Builds a snapshot from a stream of cells, applying them in order.
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = MemoryCell>,
    {
        let cells = cells.into_iter();
        let mut snapshot = Self::with_capacity(cells.size_hint().0);
        for cell in cells {
            snapshot.insert(cell);
        }

        log::debug!(
            "Snapshot built: {} cells read, {} retained, {} not present, {} overwritten",
            snapshot.stats.cells_read,
            snapshot.len(),
            snapshot.stats.non_present_dropped,
            snapshot.stats.duplicates_overwritten,
        );
        snapshot
    }

    /// Applies a single cell to the snapshot.
    pub fn insert(&mut self, cell: MemoryCell) {
        self.stats.cells_read += 1;

        if !cell.descriptor.is_present() {
            self.stats.non_present_dropped += 1;
            if self.cells.remove(&cell.address).is_some() {
                self.stats.duplicates_overwritten += 1;
                log::warn!(
                    "Cell {} cleared by a later non-present value {:#x}",
                    cell.address,
                    cell.descriptor.as_u64()
                );
            }
            return;
        }

        if let Some(previous) = self.cells.insert(cell.address, cell.descriptor) {
            self.stats.duplicates_overwritten += 1;
            log::warn!(
                "Cell {} written twice: {:#x} replaced by {:#x}",
                cell.address,
                previous.as_u64(),
                cell.descriptor.as_u64()
            );
        }
    }

    /// Looks up the descriptor stored at a physical address.
    ///
    /// Returns None if the address holds no present entry.
    #[inline]
    pub fn lookup(&self, address: PhysicalAddress) -> Option<PageDescriptor> {
        self.cells.get(&address).copied()
    }

    /// Returns the number of cells retained.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns whether the snapshot holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the counters collected while building the snapshot.
    pub fn stats(&self) -> LoadStats {
        self.stats
    }
}

/// A source of page descriptors addressed by physical address.
///
/// The walk only ever reads 8-byte descriptors, so this is the whole interface it needs
/// from physical memory.
pub trait PhysicalMemory {
    /// Reads the descriptor stored at `address`, or None if nothing is stored there.
    fn read_descriptor(&self, address: PhysicalAddress) -> Option<PageDescriptor>;
}

impl PhysicalMemory for MemorySnapshot {
    #[inline]
    fn read_descriptor(&self, address: PhysicalAddress) -> Option<PageDescriptor> {
        self.lookup(address)
    }
}

/// Unfiltered cells searched linearly, keeping non-present entries as they were loaded.
///
/// The last cell at an address wins, matching [`MemorySnapshot`].
impl PhysicalMemory for [MemoryCell] {
    fn read_descriptor(&self, address: PhysicalAddress) -> Option<PageDescriptor> {
        self.iter()
            .rev()
            .find(|cell| cell.address == address)
            .map(|cell| cell.descriptor)
    }
}

impl<M: PhysicalMemory + ?Sized> PhysicalMemory for &M {
    #[inline]
    fn read_descriptor(&self, address: PhysicalAddress) -> Option<PageDescriptor> {
        (**self).read_descriptor(address)
    }
}

impl FromIterator<MemoryCell> for MemorySnapshot {
    fn from_iter<I: IntoIterator<Item = MemoryCell>>(iter: I) -> Self {
        Self::from_cells(iter)
    }
}

impl Extend<MemoryCell> for MemorySnapshot {
    fn extend<I: IntoIterator<Item = MemoryCell>>(&mut self, iter: I) {
        for cell in iter {
            self.insert(cell);
        }
    }
}
