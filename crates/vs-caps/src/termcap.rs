// SPDX-License-Identifier: MIT
//
// Textual termcap entries, as found inline in the `TERMCAP` variable.
//
//   vt100|dec vt100:co#80:li#24:am:cl=\E[H\E[J:cm=\E[%i%d;%dH:km@:
//
// The first field holds the `|`-separated names. Every other field is a
// bare flag (`am`), a cancelled capability (`km@`), a number (`co#80`) or
// a string (`cl=...`). Fields beginning with `.` are commented out. An
// entry that refers to another one through `tc=` cannot be resolved
// without the full termcap file, so it is rejected and the caller falls
// back to the compiled database.

use std::collections::HashMap;

use crate::code::Code;
use crate::database::Flag;

/// A decoded termcap entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub names: Vec<String>,
    pub flags: HashMap<Code, Flag>,
    /// `None` records a cancelled number.
    pub numbers: HashMap<Code, Option<i32>>,
    /// `None` records a cancelled string.
    pub strings: HashMap<Code, Option<Box<[u8]>>>,
}

/// Whether a `TERMCAP` value is an inline entry worth parsing at all.
///
/// Paths, the bare `:` some `tset` versions leave behind, and entries with a
/// `tc=` continuation are not.
#[must_use]
pub fn is_inline_entry(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('/')
        && value != ":"
        && !fields(value).any(|f| f.starts_with("tc="))
}

/// Parse an inline entry. Returns `None` when [`is_inline_entry`] rejects it.
#[must_use]
pub fn parse(value: &str) -> Option<Entry> {
    if !is_inline_entry(value) {
        return None;
    }
    let mut it = fields(value);
    let names = it.next()?;
    let mut entry = Entry {
        names: names.split('|').map(str::to_owned).filter(|n| !n.is_empty()).collect(),
        ..Entry::default()
    };

    for field in it {
        let bytes = field.as_bytes();
        if bytes.len() < 2 || bytes[0] == b'.' {
            continue;
        }
        let Some(code) = Code::from_bytes(&bytes[..2]) else { continue };
        let rest = &bytes[2..];
        // First occurrence wins, as in a real termcap lookup.
        match rest.first() {
            None => {
                entry.flags.entry(code).or_insert(Flag::Present);
            }
            Some(b'@') => {
                entry.flags.entry(code).or_insert(Flag::Cancelled);
                entry.numbers.entry(code).or_insert(None);
                entry.strings.entry(code).or_insert(None);
            }
            Some(b'#') => {
                if let Some(n) = parse_number(&rest[1..]) {
                    entry.numbers.entry(code).or_insert(Some(n));
                }
            }
            Some(b'=') => {
                entry
                    .strings
                    .entry(code)
                    .or_insert_with(|| Some(unescape(&rest[1..]).into_boxed_slice()));
            }
            Some(_) => log::debug!("termcap: ignoring malformed field {field:?}"),
        }
    }
    Some(entry)
}

/// Split on `:`, dropping the whitespace a multi-line entry leaves behind.
fn fields(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(':')
        .map(|f| f.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\\'))
        .filter(|f| !f.is_empty())
}

/// Decimal, or octal with a leading zero.
fn parse_number(digits: &[u8]) -> Option<i32> {
    let s = std::str::from_utf8(digits).ok()?;
    if s.len() > 1 && s.starts_with('0') {
        i32::from_str_radix(&s[1..], 8).ok()
    } else {
        s.parse().ok()
    }
}

/// Decode termcap string escapes: `\E`, `\n`, octal, `^X` and friends.
#[must_use]
pub fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        i += 1;
        match b {
            b'\\' if i < raw.len() => {
                let e = raw[i];
                i += 1;
                let decoded = match e {
                    b'E' | b'e' => 0x1b,
                    b'n' | b'l' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'b' => 0x08,
                    b'f' => 0x0c,
                    b'a' => 0x07,
                    b'v' => 0x0b,
                    b's' => b' ',
                    b'0'..=b'7' => {
                        let mut v = u32::from(e - b'0');
                        let mut n = 1;
                        while n < 3 {
                            match raw.get(i) {
                                Some(d @ b'0'..=b'7') => {
                                    v = v * 8 + u32::from(d - b'0');
                                    i += 1;
                                    n += 1;
                                }
                                _ => break,
                            }
                        }
                        // Termcap writes NUL as \0 but means \200.
                        match u8::try_from(v & 0xFF) {
                            Ok(0) | Err(_) => 0x80,
                            Ok(v) => v,
                        }
                    }
                    other => other,
                };
                out.push(decoded);
            }
            b'^' if i < raw.len() => {
                let c = raw[i];
                i += 1;
                out.push(if c == b'?' { 0x7f } else { (c | 0x20).wrapping_sub(b'a' - 1) & 0x7f });
            }
            _ => out.push(b),
        }
    }
    out
}
