// SPDX-License-Identifier: MIT
//
// Line-drawing glyphs and the alternate character set map.
//
// Glyphs are named by their vt100 alternate-charset byte ('q' is a
// horizontal bar, 'l' an upper-left corner, ...). A cell holding a glyph
// keeps that byte and sets its charset bit; the map translates it to
// whatever the terminal wants inside its alternate set.
//
// Terminals that describe their set with the `ac` capability get a map
// built from its pairs. Anything else gets an ASCII approximation, so a
// box still looks like a box on a dumb terminal.

/// vt100 alternate-charset bytes for the standard glyphs.
pub mod glyph {
    pub const HLINE: u8 = b'q';
    pub const VLINE: u8 = b'x';
    pub const ULCORN: u8 = b'l';
    pub const URCORN: u8 = b'k';
    pub const LLCORN: u8 = b'm';
    pub const LRCORN: u8 = b'j';
    pub const LTEE: u8 = b't';
    pub const RTEE: u8 = b'u';
    pub const UTEE: u8 = b'w';
    pub const DTEE: u8 = b'v';
    pub const PLUS: u8 = b'n';
    pub const CKBRD: u8 = b'a';
    pub const DIAMOND: u8 = b'`';
    pub const DEGREE: u8 = b'f';
    pub const PLMINUS: u8 = b'g';
    pub const BULLET: u8 = b'~';
    pub const LARROW: u8 = b',';
    pub const RARROW: u8 = b'+';
    pub const DARROW: u8 = b'.';
    pub const UARROW: u8 = b'-';
    pub const BLOCK: u8 = b'0';
}

/// ASCII stand-ins, indexed by vt100 byte.
const FALLBACK: &[(u8, u8)] = &[
    (b'+', b'>'),
    (b',', b'<'),
    (b'-', b'^'),
    (b'.', b'v'),
    (b'0', b'#'),
    (b'`', b'+'),
    (b'a', b':'),
    (b'f', b'\''),
    (b'g', b'#'),
    (b'h', b'#'),
    (b'i', b'#'),
    (b'j', b'+'),
    (b'k', b'+'),
    (b'l', b'+'),
    (b'm', b'+'),
    (b'n', b'+'),
    (b'o', b'~'),
    (b'p', b'-'),
    (b'q', b'-'),
    (b'r', b'-'),
    (b's', b'_'),
    (b't', b'+'),
    (b'u', b'+'),
    (b'v', b'+'),
    (b'w', b'+'),
    (b'x', b'|'),
    (b'y', b'<'),
    (b'z', b'>'),
    (b'{', b'*'),
    (b'|', b'!'),
    (b'}', b'f'),
    (b'~', b'o'),
];

// ─── AcsMap ─────────────────────────────────────────────────────────────────

/// Translation from vt100 glyph bytes to the bytes a terminal expects.
#[derive(Clone, PartialEq, Eq)]
pub struct AcsMap {
    map: [u8; 128],
    native: bool,
}

impl AcsMap {
    /// Build the map for a terminal. `pairs` is the `ac` capability; it is
    /// only honored when the terminal has an alternate set at all.
    #[must_use]
    pub fn new(has_alt_charset: bool, pairs: Option<&[u8]>) -> Self {
        let mut map = [b' '; 128];
        match pairs.filter(|_| has_alt_charset) {
            Some(pairs) => {
                for pair in pairs.chunks_exact(2) {
                    map[usize::from(pair[0] & 0x7F)] = pair[1];
                }
                Self { map, native: true }
            }
            None => {
                for &(from, to) in FALLBACK {
                    map[usize::from(from)] = to;
                }
                Self { map, native: false }
            }
        }
    }

    /// The ASCII approximation alone.
    #[must_use]
    pub fn ascii() -> Self {
        Self::new(false, None)
    }

    #[inline]
    #[must_use]
    pub fn map(&self, ch: u8) -> u8 {
        self.map[usize::from(ch & 0x7F)]
    }

    /// Whether the map came from the terminal's own `ac` string.
    #[inline]
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.native
    }
}

impl Default for AcsMap {
    fn default() -> Self {
        Self::ascii()
    }
}

impl std::fmt::Debug for AcsMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcsMap").field("native", &self.native).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fallback_draws_boxes_in_ascii() {
        let m = AcsMap::ascii();
        assert!(!m.is_native());
        assert_eq!(m.map(glyph::HLINE), b'-');
        assert_eq!(m.map(glyph::VLINE), b'|');
        assert_eq!(m.map(glyph::ULCORN), b'+');
        assert_eq!(m.map(glyph::BULLET), b'o');
        assert_eq!(m.map(b'A'), b' ');
    }

    #[test]
    fn ac_pairs_build_a_native_map() {
        let m = AcsMap::new(true, Some(b"qqxxlljjkkmm``aa"));
        assert!(m.is_native());
        assert_eq!(m.map(glyph::HLINE), b'q');
        assert_eq!(m.map(glyph::LRCORN), b'j');
        // Glyphs the entry does not list become spaces.
        assert_eq!(m.map(glyph::PLUS), b' ');
    }

    #[test]
    fn pairs_are_ignored_without_an_alternate_set() {
        assert_eq!(AcsMap::new(false, Some(b"qQ")), AcsMap::ascii());
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        let m = AcsMap::new(true, Some(b"qQx"));
        assert_eq!(m.map(b'q'), b'Q');
        assert_eq!(m.map(b'x'), b' ');
    }

    #[test]
    fn high_bit_is_stripped() {
        let m = AcsMap::new(true, Some(b"\xf1Z"));
        assert_eq!(m.map(b'q'), b'Z');
        assert_eq!(m.map(0xF1), b'Z');
    }
}
