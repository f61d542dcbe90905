#![cfg_attr(not(test), no_std)]

//! # Paging
//!
//! A software model of the x86_64 four-level page table walk. Instead of owning real
//! page tables, the walk reads descriptors out of a sparse [`MemorySnapshot`] that only
//! contains the physical memory cells holding page table entries. It provides:
//!
//! - Bitfield accessors for virtual addresses and page descriptors.
//! - An address-indexed snapshot of physical memory.
//! - The PML4 -> PDPT -> PD -> PT walk, including 1 GiB and 2 MiB large pages.

extern crate alloc;

mod address;
mod entry;
mod flags;
mod level;
mod snapshot;
mod walk;

pub use address::{PhysicalAddress, VirtualAddress};
pub use entry::PageDescriptor;
pub use flags::PageFlags;
pub use level::{ENTRY_SIZE, PAGE_SIZE, PAGE_TABLE_LEVELS, PageSize, TableLevel};
pub use snapshot::{LoadStats, MemoryCell, MemorySnapshot, PhysicalMemory};
pub use walk::{Fault, FaultCause, PagingContext, Translation, Walk, WalkOptions, WalkStep};
