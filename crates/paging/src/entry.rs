//! Page descriptors as stored in the memory snapshot.

use crate::{PhysicalAddress, flags::PageFlags};

/// A single 64-bit page table entry.
///
/// The entry format:
/// - Bit 0: Present
/// - Bit 1: Writable
/// - Bit 2: User-accessible
/// - Bit 7: Large page (only meaningful in the PDPT and PD)
/// - Bits 12-51: Physical frame (the address with its low 12 bits dropped)
/// - Bit 63: Execute-disable
///
/// Depending on the level, the frame is either the base of the next table or the base
/// of the mapped page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PageDescriptor(u64);

impl PageDescriptor {
    /// Physical address mask (bits 12-51, for 52-bit physical addresses).
    const ADDRESS_MASK: u64 = 0x000F_FFFF_FFFF_F000;

    /// Flag bits mask (bits 0-11 and 52-63).
    const FLAGS_MASK: u64 = !Self::ADDRESS_MASK;

    /// Number of low address bits dropped from the stored frame.
    const FRAME_SHIFT: u32 = 12;

    /// Creates a descriptor from the raw value of a memory cell.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this descriptor.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the 40-bit physical frame field.
    pub const fn frame(self) -> u64 {
        (self.0 & Self::ADDRESS_MASK) >> Self::FRAME_SHIFT
    }

    /// Returns the physical address encoded by the frame field, regardless of presence.
    pub const fn table_base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 & Self::ADDRESS_MASK)
    }

    /// Returns the flags for this entry.
    pub const fn flags(self) -> PageFlags {
        PageFlags::from_raw(self.0 & Self::FLAGS_MASK)
    }

    /// Returns whether this entry is present (valid).
    pub const fn is_present(self) -> bool {
        self.flags().is_present()
    }

    /// Returns whether this entry has the large page bit set.
    ///
    /// Whether the bit actually ends the walk depends on the level the entry was
    /// found at; see [`TableLevel::large_page_size`](crate::TableLevel::large_page_size).
    pub const fn is_large_page(self) -> bool {
        self.is_present() && self.flags().is_large_page()
    }
}

impl From<u64> for PageDescriptor {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_field() {
        let descriptor = PageDescriptor::from_raw((0x2 << 12) | 0x1);
        assert_eq!(descriptor.frame(), 0x2);
        assert_eq!(descriptor.table_base(), PhysicalAddress::new(0x2000));
    }

    #[test]
    fn frame_ignores_high_flag_bits() {
        let raw = (1 << 63) | (0x7FF << 52) | (0xFF_FFFF_FFFF << 12) | 0xFFF;
        let descriptor = PageDescriptor::from_raw(raw);
        assert_eq!(descriptor.frame(), 0xFF_FFFF_FFFF);
        assert_eq!(descriptor.table_base().as_u64(), 0x000F_FFFF_FFFF_F000);
        assert!(descriptor.flags().is_no_execute());
    }

    #[test]
    fn frame_keeps_bits_48_to_51() {
        let descriptor = PageDescriptor::from_raw(0x000F_1234_5678_9001);
        assert_eq!(descriptor.frame(), 0xF1_2345_6789);
        assert_eq!(
            descriptor.table_base(),
            PhysicalAddress::new(0x000F_1234_5678_9000)
        );
    }

    #[test]
    fn from_u64_matches_from_raw() {
        assert_eq!(
            PageDescriptor::from(0x5001),
            PageDescriptor::from_raw(0x5001)
        );
        assert_eq!(PageDescriptor::from_raw(0x5001).as_u64(), 0x5001);
    }

    #[test]
    fn present_bit() {
        assert!(PageDescriptor::from_raw(0x5001).is_present());
        assert!(!PageDescriptor::from_raw(0x5000).is_present());
        assert_eq!(
            PageDescriptor::from_raw(0x5000).table_base(),
            PhysicalAddress::new(0x5000)
        );
    }

    #[test]
    fn large_page_requires_present() {
        assert!(PageDescriptor::from_raw(0x81).is_large_page());
        assert!(!PageDescriptor::from_raw(0x80).is_large_page());
        assert!(!PageDescriptor::from_raw(0x01).is_large_page());
    }
}
