// SPDX-License-Identifier: MIT
//
// Compiled terminfo decoding.
//
// Layout (all integers little-endian):
//
//   header   six u16: magic, names size, flag count, number count,
//            string-offset count, string-table size
//   names    NUL-terminated, `|`-separated aliases
//   flags    one byte each
//   (pad)    one byte when names size + flag count is odd
//   numbers  u16 each (legacy magic 0432) or i32 each (extended 01036)
//   offsets  u16 each, relative to the string table
//   table    NUL-terminated strings
//
// Negative numbers and offsets are sentinels: -1 means absent, -2 means
// cancelled. They are decoded here, once, into `None` so lookups never
// see the raw bit patterns. Anything after the string table (the ncurses
// extended-capability block) is ignored.

use std::path::Path;

use crate::database::Flag;
use crate::error::{CapsError, Result};

/// Magic number of the classic format with 16-bit numbers.
pub const MAGIC_LEGACY: u16 = 0o432;
/// Magic number of the ncurses 6.1 format with 32-bit numbers.
pub const MAGIC_EXTENDED: u16 = 0o1036;

/// The decoded sections of a compiled entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compiled {
    pub names: Vec<String>,
    pub flags: Vec<Flag>,
    pub numbers: Vec<Option<i32>>,
    pub strings: Vec<Option<Box<[u8]>>>,
}

// ─── Reader ─────────────────────────────────────────────────────────────────

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, section: &'static str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        let Some(end) = end else {
            return Err(CapsError::Truncated { path: self.path.to_path_buf(), section });
        };
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn u16(&mut self, section: &'static str) -> Result<u16> {
        let b = self.take(2, section)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn count(&mut self, section: &'static str) -> Result<usize> {
        // A negative count in the header means the section is empty.
        let v = self.u16(section)?;
        Ok(if v >= 0x8000 { 0 } else { usize::from(v) })
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Decode a compiled entry. `path` is only used in error messages.
///
/// # Errors
///
/// [`CapsError::BadMagic`] for an unknown magic number and
/// [`CapsError::Truncated`] when a section runs past the end of `buf`.
pub fn decode(path: &Path, buf: &[u8]) -> Result<Compiled> {
    let mut r = Reader { buf, pos: 0, path };
    let magic = r.u16("header")?;
    let wide = match magic {
        MAGIC_LEGACY => false,
        MAGIC_EXTENDED => true,
        _ => return Err(CapsError::BadMagic { path: path.to_path_buf(), magic }),
    };
    let names_size = r.count("header")?;
    let flag_count = r.count("header")?;
    let number_count = r.count("header")?;
    let offset_count = r.count("header")?;
    let table_size = r.count("header")?;

    let names = split_names(r.take(names_size, "names")?);

    let flags = r
        .take(flag_count, "flags")?
        .iter()
        .map(|&b| match b {
            1 => Flag::Present,
            0xFE => Flag::Cancelled,
            _ => Flag::Absent,
        })
        .collect();

    if (names_size + flag_count) % 2 == 1 {
        r.take(1, "flags")?;
    }

    let numbers = if wide {
        r.take(number_count * 4, "numbers")?
            .chunks_exact(4)
            .map(|c| Some(i32::from_le_bytes([c[0], c[1], c[2], c[3]])).filter(|&n| n >= 0))
            .collect()
    } else {
        r.take(number_count * 2, "numbers")?
            .chunks_exact(2)
            .map(|c| Some(i32::from(i16::from_le_bytes([c[0], c[1]]))).filter(|&n| n >= 0))
            .collect()
    };

    let offsets: Vec<Option<usize>> = r
        .take(offset_count * 2, "string offsets")?
        .chunks_exact(2)
        .map(|c| usize::try_from(i16::from_le_bytes([c[0], c[1]])).ok())
        .collect();

    let table = r.take(table_size, "string table")?;
    let strings = offsets
        .into_iter()
        .map(|off| {
            let start = off.filter(|&o| o < table.len())?;
            let rest = &table[start..];
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            Some(Box::from(&rest[..end]))
        })
        .collect();

    Ok(Compiled { names, flags, numbers, strings })
}

fn split_names(raw: &[u8]) -> Vec<String> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end])
        .split('|')
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Assemble a compiled entry from its parts (legacy 16-bit numbers).
    pub(crate) fn build(names: &str, flags: &[u8], numbers: &[i16], strings: &[Option<&[u8]>]) -> Vec<u8> {
        let mut table = Vec::new();
        let mut offsets = Vec::new();
        for s in strings {
            match s {
                Some(s) => {
                    offsets.push(i16::try_from(table.len()).unwrap());
                    table.extend_from_slice(s);
                    table.push(0);
                }
                None => offsets.push(-1),
            }
        }
        let mut name_bytes = names.as_bytes().to_vec();
        name_bytes.push(0);

        let mut out = Vec::new();
        for v in [
            MAGIC_LEGACY,
            u16::try_from(name_bytes.len()).unwrap(),
            u16::try_from(flags.len()).unwrap(),
            u16::try_from(numbers.len()).unwrap(),
            u16::try_from(offsets.len()).unwrap(),
            u16::try_from(table.len()).unwrap(),
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&name_bytes);
        out.extend_from_slice(flags);
        if (name_bytes.len() + flags.len()) % 2 == 1 {
            out.push(0);
        }
        for n in numbers {
            out.extend_from_slice(&n.to_le_bytes());
        }
        for o in offsets {
            out.extend_from_slice(&o.to_le_bytes());
        }
        out.extend_from_slice(&table);
        out
    }

    fn p() -> &'static Path {
        Path::new("test")
    }

    // ── Header ──

    #[test]
    fn hand_built_clear_entry() {
        // names "xterm|dumb\0" padded to 12 bytes, no flags or numbers,
        // six offsets so "cl" (string ordinal 5) exists, 10-byte table.
        let mut buf = Vec::new();
        for v in [MAGIC_LEGACY, 12, 0, 0, 6, 10] {
            buf.extend_from_slice(&u16::to_le_bytes(v));
        }
        buf.extend_from_slice(b"xterm|dumb\0\0");
        for o in [-1i16, -1, -1, -1, -1, 0] {
            buf.extend_from_slice(&o.to_le_bytes());
        }
        buf.extend_from_slice(b"clear\0\0\0\0\0");

        let c = decode(p(), &buf).unwrap();
        assert_eq!(c.names, vec!["xterm".to_owned(), "dumb".to_owned()]);
        assert_eq!(c.strings.len(), 6);
        assert_eq!(c.strings[5].as_deref(), Some(&b"clear"[..]));
        assert_eq!(c.strings[0], None);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let buf = [0x1a, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(decode(p(), &buf), Err(CapsError::BadMagic { magic: 0o1032, .. })));
    }

    #[test]
    fn truncated_sections_are_named() {
        let full = build("t", &[1, 1], &[80], &[Some(b"x")]);
        let err = decode(p(), &full[..full.len() - 1]).unwrap_err();
        assert!(matches!(err, CapsError::Truncated { section: "string table", .. }));
        let err = decode(p(), &full[..4]).unwrap_err();
        assert!(matches!(err, CapsError::Truncated { section: "header", .. }));
    }

    // ── Sections ──

    #[test]
    fn sentinel_numbers_decode_as_absent() {
        let buf = build("t", &[], &[80, -1, -2, 24], &[]);
        let c = decode(p(), &buf).unwrap();
        assert_eq!(c.numbers, vec![Some(80), None, None, Some(24)]);
    }

    #[test]
    fn sentinel_bytes_are_not_read_as_integers() {
        // 0xFFFF would be 65535 if read unsigned.
        let buf = build("t", &[], &[-1], &[]);
        let c = decode(p(), &buf).unwrap();
        assert_eq!(c.numbers[0], None);
    }

    #[test]
    fn flags_are_tristate() {
        let buf = build("t", &[0, 1, 0xFE], &[], &[]);
        let c = decode(p(), &buf).unwrap();
        assert_eq!(c.flags, vec![Flag::Absent, Flag::Present, Flag::Cancelled]);
    }

    #[test]
    fn odd_names_and_flags_are_padded() {
        // "ab\0" (3) + 2 flags = 5 → one pad byte before numbers.
        let buf = build("ab", &[1, 0], &[7], &[]);
        let c = decode(p(), &buf).unwrap();
        assert_eq!(c.numbers, vec![Some(7)]);
    }

    #[test]
    fn offset_past_table_is_absent() {
        let mut buf = build("t", &[], &[], &[Some(b"ok")]);
        // Rewrite the single offset to point past the 3-byte table.
        let at = buf.len() - 3 - 2;
        buf[at..at + 2].copy_from_slice(&40i16.to_le_bytes());
        let c = decode(p(), &buf).unwrap();
        assert_eq!(c.strings, vec![None]);
    }

    #[test]
    fn extended_numbers_are_32_bit() {
        let mut buf = Vec::new();
        for v in [MAGIC_EXTENDED, 2, 0, 2, 0, 0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(b"t\0");
        buf.extend_from_slice(&0x0001_0000i32.to_le_bytes());
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        let c = decode(p(), &buf).unwrap();
        assert_eq!(c.numbers, vec![Some(65536), None]);
    }
}
