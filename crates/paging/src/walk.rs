//! The four-level page table walk.
//!
//! This module provides [`PagingContext`], which pairs a root table address with a view of
//! physical memory and resolves virtual addresses the way the MMU does on a TLB miss:
//! PML4 -> PDPT -> PD -> PT, stopping early on a present large page at the PDPT (1 GiB)
//! or PD (2 MiB) level.

use alloc::vec::Vec;
use core::fmt;

use crate::{
    PhysicalAddress, VirtualAddress,
    entry::PageDescriptor,
    level::{ENTRY_SIZE, PAGE_SIZE, PAGE_TABLE_LEVELS, PageSize, TableLevel},
    snapshot::{MemorySnapshot, PhysicalMemory},
};

/// Knobs that change how descriptors are interpreted during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Honor the large page bit at the PDPT and PD levels.
    ///
    /// When disabled the bit is ignored and every walk descends to the leaf table.
    pub large_pages: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self { large_pages: true }
    }
}

/// Why a walk stopped without producing an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    /// Nothing is stored at the entry's physical address.
    Missing,
    /// An entry is stored there but its present bit is clear.
    NotPresent,
}

/// A page fault raised by the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// The level whose entry could not be used.
    pub level: TableLevel,
    /// The physical address of that entry.
    pub entry_address: PhysicalAddress,
    /// Why the entry could not be used.
    pub cause: FaultCause,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cause = match self.cause {
            FaultCause::Missing => "no entry",
            FaultCause::NotPresent => "entry not present",
        };
        write!(f, "{} at {} entry {}", cause, self.level, self.entry_address)
    }
}

/// The outcome of translating a single virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// The address is mapped.
    Mapped {
        /// The resulting physical address.
        address: PhysicalAddress,
        /// The size of the page the address falls in.
        size: PageSize,
    },
    /// The walk hit a missing or non-present entry.
    Fault(Fault),
}

impl Translation {
    /// Returns the physical address if the translation succeeded.
    pub fn address(self) -> Option<PhysicalAddress> {
        match self {
            Translation::Mapped { address, .. } => Some(address),
            Translation::Fault(_) => None,
        }
    }

    /// Returns whether the translation faulted.
    pub fn is_fault(self) -> bool {
        matches!(self, Translation::Fault(_))
    }
}

/// One table visited during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkStep {
    /// The level of the table.
    pub level: TableLevel,
    /// The index used within the table.
    pub index: usize,
    /// Physical address of the entry that was read.
    pub entry_address: PhysicalAddress,
    /// The entry found there, if any.
    pub descriptor: Option<PageDescriptor>,
}

/// A complete record of a walk, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    /// The address that was translated.
    pub address: VirtualAddress,
    /// Every table visited, root first.
    pub steps: Vec<WalkStep>,
    /// The final outcome.
    pub translation: Translation,
}

/// The immutable state needed to translate addresses: a root table and physical memory.
///
/// Translation never mutates the context, so it can be shared freely between threads
/// when the memory is `Sync`.
#[derive(Debug)]
pub struct PagingContext<M = MemorySnapshot> {
    root: PhysicalAddress,
    memory: M,
    options: WalkOptions,
}

impl<M: PhysicalMemory> PagingContext<M> {
    /// Creates a context whose PML4 lives at `root`.
    ///
    /// A root that is not page aligned is used as given; entry addresses are still
    /// `root + index * 8`.
    pub fn new(root: PhysicalAddress, memory: M) -> Self {
        if !root.is_aligned(PAGE_SIZE) {
            log::debug!(
                "Root table at {} is not aligned to a {} byte page",
                root,
                PAGE_SIZE
            );
        }

        Self {
            root,
            memory,
            options: WalkOptions::default(),
        }
    }

    /// Replaces the walk options.
    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the physical address of the root table.
    pub fn root(&self) -> PhysicalAddress {
        self.root
    }

    /// Returns the physical memory the walk reads from.
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Returns the walk options in effect.
    pub fn options(&self) -> WalkOptions {
        self.options
    }

    /// Translates a virtual address to a physical address.
    pub fn translate(&self, address: VirtualAddress) -> Translation {
        self.walk_with(address, |_| {})
    }

    /// Translates a sequence of virtual addresses, preserving their order.
    pub fn translate_all<I>(&self, addresses: I) -> Vec<Translation>
    where
        I: IntoIterator<Item = VirtualAddress>,
    {
        addresses
            .into_iter()
            .map(|address| self.translate(address))
            .collect()
    }

    /// Translates a virtual address and records every table visited on the way.
    pub fn walk(&self, address: VirtualAddress) -> Walk {
        let mut steps = Vec::with_capacity(PAGE_TABLE_LEVELS);
        let translation = self.walk_with(address, |step| steps.push(*step));
        Walk {
            address,
            steps,
            translation,
        }
    }

    fn walk_with<F>(&self, address: VirtualAddress, mut visit: F) -> Translation
    where
        F: FnMut(&WalkStep),
    {
        let mut table = self.root;
        let mut level = TableLevel::Pml4;

        loop {
            let index = address.page_index(level);
            let entry_address = table + index as u64 * ENTRY_SIZE;
            let descriptor = self.memory.read_descriptor(entry_address);

            let step = WalkStep {
                level,
                index,
                entry_address,
                descriptor,
            };
            log::trace!(
                "{}: {} index {} entry {} -> {:?}",
                address,
                level,
                index,
                entry_address,
                descriptor
            );
            visit(&step);

            let descriptor = match descriptor {
                Some(descriptor) if descriptor.is_present() => descriptor,
                Some(_) => return Self::fault(level, entry_address, FaultCause::NotPresent),
                None => return Self::fault(level, entry_address, FaultCause::Missing),
            };

            if let Some(size) = self.large_page_size(level, descriptor) {
                return Translation::Mapped {
                    address: descriptor.table_base() + address.offset_in(size),
                    size,
                };
            }

            match level.next() {
                Some(next) => {
                    table = descriptor.table_base();
                    level = next;
                }
                None => {
                    return Translation::Mapped {
                        address: descriptor.table_base() + address.page_offset(),
                        size: PageSize::Size4KiB,
                    };
                }
            }
        }
    }

    /// Returns the page size mapped by `descriptor` if it ends the walk at `level`.
    fn large_page_size(&self, level: TableLevel, descriptor: PageDescriptor) -> Option<PageSize> {
        if self.options.large_pages && descriptor.is_large_page() {
            level.large_page_size()
        } else {
            None
        }
    }

    fn fault(level: TableLevel, entry_address: PhysicalAddress, cause: FaultCause) -> Translation {
        Translation::Fault(Fault {
            level,
            entry_address,
            cause,
        })
    }
}
