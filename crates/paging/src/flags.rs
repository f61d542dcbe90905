//! Page descriptor flags.

use core::fmt;

/// The flag bits of a page descriptor.
///
/// Flags are stored as a raw u64 using the x86_64 bit positions. Only the present and
/// large page bits affect the walk; the permission bits are decoded for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageFlags(u64);

impl PageFlags {
    /// Present bit (bit 0).
    const PRESENT: u64 = 1 << 0;

    /// Writable bit (bit 1).
    const WRITABLE: u64 = 1 << 1;

    /// User-accessible bit (bit 2).
    const USER: u64 = 1 << 2;

    /// Large page bit (bit 7). Terminates the walk at the PDPT or PD level.
    const LARGE_PAGE: u64 = 1 << 7;

    /// Execute-disable bit (bit 63).
    const NO_EXECUTE: u64 = 1 << 63;

    /// Creates page flags from a raw u64 value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns whether the present bit is set.
    pub const fn is_present(self) -> bool {
        (self.0 & Self::PRESENT) != 0
    }

    /// Returns whether the writable bit is set.
    pub const fn is_writable(self) -> bool {
        (self.0 & Self::WRITABLE) != 0
    }

    /// Returns whether the user-accessible bit is set.
    pub const fn is_user(self) -> bool {
        (self.0 & Self::USER) != 0
    }

    /// Returns whether the large page bit is set.
    pub const fn is_large_page(self) -> bool {
        (self.0 & Self::LARGE_PAGE) != 0
    }

    /// Returns whether the execute-disable bit is set.
    pub const fn is_no_execute(self) -> bool {
        (self.0 & Self::NO_EXECUTE) != 0
    }
}

impl fmt::Display for PageFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |set: bool, name: &'static str| if set { name } else { "-" };
        write!(
            f,
            "{} {} {} {} {}",
            mark(self.is_present(), "P"),
            mark(self.is_writable(), "W"),
            mark(self.is_user(), "U"),
            mark(self.is_large_page(), "PS"),
            mark(self.is_no_execute(), "NX"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_bits_is_not_present() {
        let flags = PageFlags::from_raw(0);
        assert!(!flags.is_present());
        assert!(!flags.is_large_page());
    }

    #[test]
    fn bit_positions() {
        assert!(PageFlags::from_raw(0x1).is_present());
        assert!(PageFlags::from_raw(0x2).is_writable());
        assert!(PageFlags::from_raw(0x4).is_user());
        assert!(PageFlags::from_raw(0x80).is_large_page());
        assert!(PageFlags::from_raw(1 << 63).is_no_execute());
    }

    #[test]
    fn neighbouring_bits_do_not_alias() {
        let flags = PageFlags::from_raw(!0x81);
        assert!(!flags.is_present());
        assert!(!flags.is_large_page());
        assert!(flags.is_writable());
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", PageFlags::from_raw(0x3)), "P W - - -");
        assert_eq!(
            format!("{}", PageFlags::from_raw(0x83 | (1 << 63))),
            "P W - PS NX"
        );
    }
}
