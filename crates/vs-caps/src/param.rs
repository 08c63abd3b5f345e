// SPDX-License-Identifier: MIT
//
// The `%`-parameter language embedded in capability strings.
//
// Capability strings such as `cm` ("\E[%i%p1%d;%p2%dH") and `cs` carry a
// tiny stack language for substituting row/column numbers. Two dialects
// share the same `%` syntax:
//
//   terminfo — explicit pushes (`%p1`, `%{30}`, `%'x'`), stack arithmetic,
//   comparison, variables and `%? %t %e %;` conditionals.
//
//   termcap — no pushes at all: the parameters are pre-loaded onto the
//   stack (first parameter on top), `%d` / `%2` / `%3` / `%.` pop them in
//   order, `%r` swaps them and `%+x` adds a constant and emits a byte.
//
// The interpreter tells the dialects apart by whether an explicit push has
// happened yet. It never fails: a missing operand pops as zero, division by
// zero yields zero, and an unknown operator is dropped.

/// Number of positional parameters a template may reference (`%p1`..`%p9`).
pub const MAX_PARAMS: usize = 9;

/// Expand `template` with the given numeric parameters.
///
/// Parameters beyond [`MAX_PARAMS`] are ignored; missing ones are zero.
#[must_use]
pub fn expand(template: &[u8], params: &[i32]) -> Vec<u8> {
    let mut machine = Machine::new(params);
    machine.run(template);
    machine.out
}

// ─── Machine ────────────────────────────────────────────────────────────────

struct Machine {
    params: [i32; MAX_PARAMS],
    stack: Vec<i32>,
    dynamic: [i32; 26],
    statics: [i32; 26],
    out: Vec<u8>,
    /// Set once the template pushes explicitly (terminfo dialect).
    explicit: bool,
    /// Set once anything has been popped from the pre-loaded termcap stack.
    popped: bool,
}

impl Machine {
    fn new(args: &[i32]) -> Self {
        let mut params = [0; MAX_PARAMS];
        for (slot, v) in params.iter_mut().zip(args) {
            *slot = *v;
        }
        let mut machine = Self {
            params,
            stack: Vec::with_capacity(16),
            dynamic: [0; 26],
            statics: [0; 26],
            out: Vec::with_capacity(32),
            explicit: false,
            popped: false,
        };
        machine.preload();
        machine
    }

    /// Termcap dialect: second parameter underneath, first on top.
    fn preload(&mut self) {
        self.stack.clear();
        self.stack.push(self.params[1]);
        self.stack.push(self.params[0]);
    }

    fn push(&mut self, v: i32) {
        self.explicit = true;
        self.stack.push(v);
    }

    fn pop(&mut self) -> i32 {
        self.popped = true;
        self.stack.pop().unwrap_or(0)
    }

    fn run(&mut self, t: &[u8]) {
        let mut i = 0;
        while i < t.len() {
            let b = t[i];
            i += 1;
            if b != b'%' {
                self.out.push(b);
                continue;
            }
            let Some(&op) = t.get(i) else { break };
            i += 1;
            match op {
                b'%' => self.out.push(b'%'),
                b'p' => {
                    if let Some(d) = t.get(i).filter(|d| (b'1'..=b'9').contains(*d)) {
                        let v = self.params[usize::from(d - b'1')];
                        self.push(v);
                        i += 1;
                    }
                }
                b'\'' => {
                    if let Some(&c) = t.get(i) {
                        self.push(i32::from(c));
                        i += 1;
                        if t.get(i) == Some(&b'\'') {
                            i += 1;
                        }
                    }
                }
                b'{' => {
                    let (v, used) = parse_constant(&t[i..]);
                    self.push(v);
                    i += used;
                }
                b'i' => {
                    self.params[0] = self.params[0].wrapping_add(1);
                    self.params[1] = self.params[1].wrapping_add(1);
                    if !self.explicit && !self.popped {
                        self.preload();
                    }
                }
                b'r' => {
                    self.params.swap(0, 1);
                    if !self.explicit && !self.popped {
                        self.preload();
                    }
                }
                b'+' if !self.explicit => {
                    // termcap: %+x emits the popped value plus x as one byte.
                    if let Some(&c) = t.get(i) {
                        i += 1;
                        let v = self.pop().wrapping_add(i32::from(c));
                        self.out.push(low_byte(v));
                    }
                }
                b'+' | b'-' | b'*' | b'/' | b'm' | b'&' | b'|' | b'^' | b'=' | b'>' | b'<'
                | b'A' | b'O' => {
                    let rhs = self.pop();
                    let lhs = self.pop();
                    self.stack.push(binary(op, lhs, rhs));
                }
                b'!' => {
                    let v = self.pop();
                    self.stack.push(i32::from(v == 0));
                }
                b'~' => {
                    let v = self.pop();
                    self.stack.push(!v);
                }
                b'l' => {
                    // Parameters are numeric, so a string length is always 0.
                    self.pop();
                    self.stack.push(0);
                }
                b'P' | b'g' => {
                    if let Some(&name) = t.get(i) {
                        i += 1;
                        self.variable(op == b'P', name);
                    }
                }
                b'?' | b';' => {}
                b't' => {
                    if self.pop() == 0 {
                        i = skip_branch(t, i, true);
                    }
                }
                b'e' => i = skip_branch(t, i, false),
                b'c' | b'.' => {
                    let v = self.pop();
                    self.out.push(low_byte(v));
                }
                b's' => {
                    self.pop();
                }
                _ => {
                    let (conv, used) = Format::parse(&t[i - 1..]);
                    match conv {
                        Some(conv) => {
                            i += used - 1;
                            let v = self.pop();
                            conv.write(v, &mut self.out);
                        }
                        None => log::trace!("ignoring unknown parameter operator %{}", char::from(op)),
                    }
                }
            }
        }
    }

    fn variable(&mut self, store: bool, name: u8) {
        let slot = match name {
            b'a'..=b'z' => &mut self.dynamic[usize::from(name - b'a')],
            b'A'..=b'Z' => &mut self.statics[usize::from(name - b'A')],
            _ => return,
        };
        if store {
            self.popped = true;
            *slot = self.stack.pop().unwrap_or(0);
        } else {
            let v = *slot;
            self.push(v);
        }
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
const fn low_byte(v: i32) -> u8 {
    (v as u32 & 0xFF) as u8
}

fn binary(op: u8, lhs: i32, rhs: i32) -> i32 {
    match op {
        b'+' => lhs.wrapping_add(rhs),
        b'-' => lhs.wrapping_sub(rhs),
        b'*' => lhs.wrapping_mul(rhs),
        b'/' => lhs.checked_div(rhs).unwrap_or(0),
        b'm' => lhs.checked_rem(rhs).unwrap_or(0),
        b'&' => lhs & rhs,
        b'|' => lhs | rhs,
        b'^' => lhs ^ rhs,
        b'=' => i32::from(lhs == rhs),
        b'>' => i32::from(lhs > rhs),
        b'<' => i32::from(lhs < rhs),
        b'A' => i32::from(lhs != 0 && rhs != 0),
        b'O' => i32::from(lhs != 0 || rhs != 0),
        _ => 0,
    }
}

/// `{nn}` body: returns the value and the bytes consumed (including `}`).
fn parse_constant(t: &[u8]) -> (i32, usize) {
    let mut i = 0;
    let negative = t.first() == Some(&b'-');
    if negative {
        i += 1;
    }
    let mut v: i32 = 0;
    while let Some(d) = t.get(i).filter(|d| d.is_ascii_digit()) {
        v = v.wrapping_mul(10).wrapping_add(i32::from(d - b'0'));
        i += 1;
    }
    if t.get(i) == Some(&b'}') {
        i += 1;
    }
    (if negative { -v } else { v }, i)
}

/// Skip a branch that was not taken.
///
/// From `%t` (false) stop after the matching `%e` or `%;`; from `%e` stop
/// after the matching `%;`. Nested `%?` blocks are stepped over.
fn skip_branch(t: &[u8], mut i: usize, stop_at_else: bool) -> usize {
    let mut depth = 0usize;
    while i < t.len() {
        if t[i] != b'%' {
            i += 1;
            continue;
        }
        let Some(&op) = t.get(i + 1) else { return t.len() };
        i += 2;
        match op {
            b'?' => depth += 1,
            b';' if depth == 0 => return i,
            b';' => depth -= 1,
            b'e' if depth == 0 && stop_at_else => return i,
            b'\'' => i += 2,
            _ => {}
        }
    }
    i
}

// ─── Numeric formats ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Radix {
    Decimal,
    Octal,
    HexLower,
    HexUpper,
}

/// Field widths beyond this are clamped.
const MAX_FIELD: usize = 64;

/// A printf-style conversion: `%d`, `%02d`, `%:-3x`, termcap `%2` / `%3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Format {
    radix: Radix,
    width: usize,
    precision: usize,
    zero: bool,
    left: bool,
    sign: bool,
    space: bool,
    alternate: bool,
}

impl Format {
    /// Parse a conversion starting right after the `%`.
    ///
    /// Returns the conversion and the number of bytes it spans.
    fn parse(t: &[u8]) -> (Option<Self>, usize) {
        let mut conv = Self {
            radix: Radix::Decimal,
            width: 0,
            precision: 0,
            zero: false,
            left: false,
            sign: false,
            space: false,
            alternate: false,
        };
        let mut i = 0;
        if t.first() == Some(&b':') {
            i += 1;
        }
        while let Some(&f) = t.get(i) {
            match f {
                b'-' => conv.left = true,
                b'+' => conv.sign = true,
                b' ' => conv.space = true,
                b'#' => conv.alternate = true,
                b'0' => conv.zero = true,
                _ => break,
            }
            i += 1;
        }
        let digits_start = i;
        while let Some(d) = t.get(i).filter(|d| d.is_ascii_digit()) {
            conv.width = (conv.width * 10 + usize::from(d - b'0')).min(MAX_FIELD);
            i += 1;
        }
        let had_width = i > digits_start;
        if t.get(i) == Some(&b'.') {
            i += 1;
            while let Some(d) = t.get(i).filter(|d| d.is_ascii_digit()) {
                conv.precision = (conv.precision * 10 + usize::from(d - b'0')).min(MAX_FIELD);
                i += 1;
            }
        }
        conv.radix = match t.get(i) {
            Some(b'd') => Radix::Decimal,
            Some(b'o') => Radix::Octal,
            Some(b'x') => Radix::HexLower,
            Some(b'X') => Radix::HexUpper,
            // termcap %2 / %3 carry no conversion letter.
            _ if had_width || conv.zero => {
                if conv.zero && !had_width {
                    return (None, 0);
                }
                return (Some(conv), i);
            }
            _ => return (None, 0),
        };
        (Some(conv), i + 1)
    }

    fn write(&self, v: i32, out: &mut Vec<u8>) {
        let magnitude = v.unsigned_abs();
        let mut digits = match self.radix {
            Radix::Decimal => magnitude.to_string(),
            #[allow(clippy::cast_sign_loss)]
            Radix::Octal => format!("{:o}", v as u32),
            #[allow(clippy::cast_sign_loss)]
            Radix::HexLower => format!("{:x}", v as u32),
            #[allow(clippy::cast_sign_loss)]
            Radix::HexUpper => format!("{:X}", v as u32),
        };
        if digits.len() < self.precision {
            digits = format!("{}{digits}", "0".repeat(self.precision - digits.len()));
        }
        let prefix = match self.radix {
            Radix::Decimal if v < 0 => "-",
            Radix::Decimal if self.sign => "+",
            Radix::Decimal if self.space => " ",
            Radix::Octal if self.alternate && !digits.starts_with('0') => "0",
            Radix::HexLower if self.alternate => "0x",
            Radix::HexUpper if self.alternate => "0X",
            _ => "",
        };
        let len = prefix.len() + digits.len();
        let pad = self.width.saturating_sub(len);
        if self.left {
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(digits.as_bytes());
            out.resize(out.len() + pad, b' ');
        } else if self.zero {
            out.extend_from_slice(prefix.as_bytes());
            out.resize(out.len() + pad, b'0');
            out.extend_from_slice(digits.as_bytes());
        } else {
            out.resize(out.len() + pad, b' ');
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(digits.as_bytes());
        }
    }
}
