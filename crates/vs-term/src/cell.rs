// SPDX-License-Identifier: MIT
//
// Cell — one character position of the virtual screen.
//
// A cell is two bytes: the character byte and the color byte. The color
// byte holds a color object index (0..=127) in its low seven bits and uses
// bit 7 to mark an alternate-character-set glyph (the line-drawing
// characters of a vt100: corners, tees, horizontal and vertical bars).
//
// Cells store the *index* of a color object, never the resolved colors, so
// redefining a color object changes every cell that uses it the next time
// the screen is drawn.
//
// When wide-character mode is enabled, a byte with the high bit set starts
// a two-byte glyph occupying two adjacent cells; the pair is drawn and
// skipped as a unit.

use std::fmt;

/// Largest color object index a cell can reference.
pub const MAX_CELL_COLOR: u8 = 0x7F;

const ACS_BIT: u16 = 0x8000;
const COLOR_MASK: u16 = 0x7F00;
const CHAR_MASK: u16 = 0x00FF;

// ─── Cell ───────────────────────────────────────────────────────────────────

/// A packed `(character byte, color index)` pair.
///
/// ```
/// use vs_term::cell::Cell;
///
/// let c = Cell::new(b'x', 3);
/// assert_eq!(c.ch(), b'x');
/// assert_eq!(c.color(), 3);
/// assert!(!c.is_acs());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell(u16);

impl Cell {
    /// A space in color 0.
    pub const BLANK: Self = Self(b' ' as u16);

    /// A normal character cell. Colors above 127 are masked.
    #[inline]
    #[must_use]
    pub const fn new(ch: u8, color: u8) -> Self {
        Self(((color as u16) << 8) & COLOR_MASK | ch as u16)
    }

    /// A line-drawing glyph. `ch` is the vt100 alternate-charset byte.
    #[inline]
    #[must_use]
    pub const fn acs(ch: u8, color: u8) -> Self {
        Self(Self::new(ch, color).0 | ACS_BIT)
    }

    /// A space in `color`.
    #[inline]
    #[must_use]
    pub const fn blank(color: u8) -> Self {
        Self::new(b' ', color)
    }

    /// Rebuild from the packed representation.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The packed representation.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The character byte.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn ch(self) -> u8 {
        (self.0 & CHAR_MASK) as u8
    }

    /// The color object index (0..=127).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn color(self) -> u8 {
        ((self.0 & COLOR_MASK) >> 8) as u8
    }

    /// Whether this is an alternate-character-set glyph.
    #[inline]
    #[must_use]
    pub const fn is_acs(self) -> bool {
        self.0 & ACS_BIT != 0
    }

    #[inline]
    #[must_use]
    pub const fn is_space(self) -> bool {
        self.ch() == b' '
    }

    /// Whether the character byte has the high bit set (the lead or trail
    /// byte of a wide glyph in wide-character mode).
    #[inline]
    #[must_use]
    pub const fn is_high(self) -> bool {
        self.ch() & 0x80 != 0
    }

    /// Same glyph and charset, possibly different color.
    #[inline]
    #[must_use]
    pub const fn same_glyph(self, other: Self) -> bool {
        (self.0 & !COLOR_MASK) == (other.0 & !COLOR_MASK)
    }

    /// This cell with its color replaced, keeping the charset bit.
    #[inline]
    #[must_use]
    pub const fn with_color(self, color: u8) -> Self {
        Self((self.0 & !COLOR_MASK) | (((color as u16) << 8) & COLOR_MASK))
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ch = self.ch();
        let shown = if ch.is_ascii_graphic() || ch == b' ' {
            format!("{:?}", char::from(ch))
        } else {
            format!("{ch:#04x}")
        };
        write!(f, "Cell({shown}, {}", self.color())?;
        if self.is_acs() {
            f.write_str(", acs")?;
        }
        f.write_str(")")
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Layout ──

    #[test]
    fn cell_is_two_bytes() {
        assert_eq!(std::mem::size_of::<Cell>(), 2);
    }

    #[test]
    fn blank_is_space_in_color_zero() {
        assert_eq!(Cell::BLANK.ch(), b' ');
        assert_eq!(Cell::BLANK.color(), 0);
        assert_eq!(Cell::default(), Cell::BLANK);
        assert!(Cell::BLANK.is_space());
    }

    // ── Packing ──

    #[test]
    fn color_is_masked_to_seven_bits() {
        let c = Cell::new(b'a', 0xFF);
        assert_eq!(c.color(), 0x7F);
        assert!(!c.is_acs());
    }

    #[test]
    fn acs_bit_survives_recolor() {
        let c = Cell::acs(b'q', 2).with_color(5);
        assert!(c.is_acs());
        assert_eq!(c.color(), 5);
        assert_eq!(c.ch(), b'q');
    }

    #[test]
    fn raw_round_trip() {
        let c = Cell::acs(b'x', 9);
        assert_eq!(Cell::from_raw(c.raw()), c);
    }

    // ── Comparison ──

    #[test]
    fn same_glyph_ignores_color_only() {
        assert!(Cell::new(b'a', 1).same_glyph(Cell::new(b'a', 2)));
        assert!(!Cell::new(b'a', 1).same_glyph(Cell::new(b'b', 1)));
        assert!(!Cell::new(b'q', 1).same_glyph(Cell::acs(b'q', 1)));
    }

    #[test]
    fn high_bit_detection() {
        assert!(Cell::new(0xB0, 0).is_high());
        assert!(!Cell::new(b'z', 0).is_high());
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", Cell::new(b'H', 1)), "Cell('H', 1)");
        assert_eq!(format!("{:?}", Cell::acs(b'q', 0)), "Cell('q', 0, acs)");
        assert_eq!(format!("{:?}", Cell::new(7, 0)), "Cell(0x07, 0)");
    }
}
