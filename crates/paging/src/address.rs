//! Address types for physical and virtual memory.
//!
//! Both types are plain 64-bit newtypes. Fields are extracted with explicit shifts and
//! masks so the layout never depends on how a compiler packs bitfields.

use core::fmt;
use core::ops::Add;

use crate::level::{self, PageSize, TableLevel};

/// Macro to define common address type functionality.
///
/// This macro generates the basic structure and methods common to both physical
/// and virtual address types, reducing code duplication.
macro_rules! impl_address_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new address from its raw value.
            #[inline]
            pub const fn new(addr: u64) -> Self {
                Self(addr)
            }

            /// Returns the raw address value.
            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Checks whether the address is a multiple of `align`.
            ///
            /// `align` must be a power of two.
            #[inline]
            pub const fn is_aligned(self, align: u64) -> bool {
                debug_assert!(align.is_power_of_two());
                self.0 & align.wrapping_sub(1) == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(addr: u64) -> Self {
                Self::new(addr)
            }
        }

        impl From<$name> for u64 {
            #[inline]
            fn from(addr: $name) -> Self {
                addr.0
            }
        }

        // Address arithmetic is modular, like the hardware it models.
        impl Add<u64> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: u64) -> Self::Output {
                Self(self.0.wrapping_add(rhs))
            }
        }
    };
}

impl_address_common!(
    PhysicalAddress,
    "A physical memory address.\n\n\
     Physical addresses key the memory snapshot and are the result of a successful\n\
     translation."
);

impl_address_common!(
    VirtualAddress,
    "A virtual memory address.\n\n\
     Only the low 48 bits take part in translation: a 12-bit page offset followed by\n\
     four 9-bit table indices. The upper 16 bits are carried along but ignored."
);

impl VirtualAddress {
    /// Mask of the bits that participate in translation.
    const TRANSLATED_MASK: u64 = (1 << 48) - 1;

    /// Builds a virtual address from its table indices and page offset.
    ///
    /// Each index is truncated to 9 bits and the offset to 12 bits.
    pub const fn from_indices(pml4: usize, pdpt: usize, pd: usize, pt: usize, offset: u64) -> Self {
        Self(
            place_index(pml4, TableLevel::Pml4)
                | place_index(pdpt, TableLevel::Pdpt)
                | place_index(pd, TableLevel::Pd)
                | place_index(pt, TableLevel::Pt)
                | (offset & PageSize::Size4KiB.offset_mask()),
        )
    }

    /// Returns the offset within a 4 KiB page (bits 0-11).
    #[inline]
    pub const fn page_offset(self) -> u64 {
        self.offset_in(PageSize::Size4KiB)
    }

    /// Returns the offset within a page of the given size.
    ///
    /// A 2 MiB page consumes bits 0-20 and a 1 GiB page bits 0-29.
    #[inline]
    pub const fn offset_in(self, size: PageSize) -> u64 {
        self.0 & size.offset_mask()
    }

    /// Returns the page table index at the specified level (0-511).
    #[inline]
    pub const fn page_index(self, level: TableLevel) -> usize {
        level::page_index(self.0, level)
    }

    /// Returns the part of the address that participates in translation (bits 0-47).
    #[inline]
    pub const fn translated_bits(self) -> u64 {
        self.0 & Self::TRANSLATED_MASK
    }
}

/// Shifts a 9-bit table index into its position for the given level.
const fn place_index(index: usize, level: TableLevel) -> u64 {
    ((index as u64) & 0x1FF) << level.index_shift()
}
