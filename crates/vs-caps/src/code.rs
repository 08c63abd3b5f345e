// SPDX-License-Identifier: MIT
//
// Capability codes and the mnemonic → ordinal tables.
//
// Applications name capabilities by their two-character termcap mnemonic
// ("cl", "cm", "Co"). The compiled database stores them positionally: the
// n-th boolean, the n-th number, the n-th string offset. The tables below
// map each mnemonic to that position in the standard ordering. They are
// sorted by code so a lookup is a binary search, and a code that is not in
// the table simply resolves to "absent".

use std::fmt;

// ─── Code ───────────────────────────────────────────────────────────────────

/// A two-byte capability mnemonic such as `cl` or `cm`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Code([u8; 2]);

impl Code {
    /// Build a code from its two bytes.
    #[inline]
    #[must_use]
    pub const fn new(a: u8, b: u8) -> Self {
        Self([a, b])
    }

    /// Parse a code from text. Anything that is not exactly two bytes is rejected.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_bytes(s.as_bytes())
    }

    /// Build a code from a byte slice of length two.
    #[must_use]
    pub const fn from_bytes(b: &[u8]) -> Option<Self> {
        match b {
            [a, b] => Some(Self([*a, *b])),
            _ => None,
        }
    }

    /// The two raw bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> [u8; 2] {
        self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", char::from(self.0[0]), char::from(self.0[1]))
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({self})")
    }
}

/// Shorthand for a code literal: `code!("cl")`.
#[macro_export]
macro_rules! code {
    ($s:literal) => {{
        const B: &[u8] = $s.as_bytes();
        $crate::Code::new(B[0], B[1])
    }};
}

// ─── Sections ───────────────────────────────────────────────────────────────

/// The three kinds of capability a database holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Flag,
    Number,
    String,
}

impl Section {
    const fn table(self) -> &'static [([u8; 2], u16)] {
        match self {
            Self::Flag => FLAGS,
            Self::Number => NUMBERS,
            Self::String => STRINGS,
        }
    }
}

/// Position of `code` within `section` in the standard compiled ordering.
#[must_use]
pub fn ordinal(section: Section, code: Code) -> Option<usize> {
    let table = section.table();
    table
        .binary_search_by_key(&code.0, |(c, _)| *c)
        .ok()
        .map(|i| usize::from(table[i].1))
}

// ─── Tables ─────────────────────────────────────────────────────────────────

/// Boolean capabilities, sorted by code.
pub(crate) static FLAGS: &[([u8; 2], u16)] = &[
    (*b"5i", 22), (*b"HC", 23), (*b"MT", 40), (*b"ND", 26), (*b"NL", 41), (*b"NP", 25),
    (*b"NR", 24), (*b"YA", 30), (*b"YB", 31), (*b"YC", 32), (*b"YD", 33), (*b"YE", 34),
    (*b"YF", 35), (*b"YG", 36), (*b"am", 1), (*b"bs", 37), (*b"bw", 0), (*b"cc", 27),
    (*b"da", 11), (*b"db", 12), (*b"eo", 5), (*b"es", 16), (*b"gn", 6), (*b"hc", 7),
    (*b"hl", 29), (*b"hs", 9), (*b"hz", 18), (*b"in", 10), (*b"km", 8), (*b"mi", 13),
    (*b"ms", 14), (*b"nc", 39), (*b"ns", 38), (*b"nx", 21), (*b"os", 15), (*b"pt", 42),
    (*b"ul", 19), (*b"ut", 28), (*b"xb", 2), (*b"xn", 4), (*b"xo", 20), (*b"xr", 43),
    (*b"xs", 3), (*b"xt", 17),
];

/// Numeric capabilities, sorted by code.
pub(crate) static NUMBERS: &[([u8; 2], u16)] = &[
    (*b"BT", 30), (*b"Co", 13), (*b"MW", 12), (*b"NC", 15), (*b"Nl", 8), (*b"Ya", 16),
    (*b"Yb", 17), (*b"Yc", 18), (*b"Yd", 19), (*b"Ye", 20), (*b"Yf", 21), (*b"Yg", 22),
    (*b"Yh", 23), (*b"Yi", 24), (*b"Yj", 25), (*b"Yk", 26), (*b"Yl", 27), (*b"Ym", 28),
    (*b"Yn", 29), (*b"Yo", 31), (*b"Yp", 32), (*b"co", 0), (*b"dB", 36), (*b"dC", 34),
    (*b"dN", 35), (*b"dT", 37), (*b"it", 1), (*b"kn", 38), (*b"lh", 9), (*b"li", 2),
    (*b"lm", 3), (*b"lw", 10), (*b"ma", 11), (*b"pa", 14), (*b"pb", 5), (*b"sg", 4),
    (*b"ug", 33), (*b"vt", 6), (*b"ws", 7),
];

/// String capabilities, sorted by code.
pub(crate) static STRINGS: &[([u8; 2], u16)] = &[
    (*b"!1", 212), (*b"!2", 213), (*b"!3", 214), (*b"#1", 198), (*b"#2", 199),
    (*b"#3", 200), (*b"#4", 201), (*b"%0", 177), (*b"%1", 168), (*b"%2", 169),
    (*b"%3", 170), (*b"%4", 171), (*b"%5", 172), (*b"%6", 173), (*b"%7", 174),
    (*b"%8", 175), (*b"%9", 176), (*b"%a", 202), (*b"%b", 203), (*b"%c", 204),
    (*b"%d", 205), (*b"%e", 206), (*b"%f", 207), (*b"%g", 208), (*b"%h", 209),
    (*b"%i", 210), (*b"%j", 211), (*b"&0", 187), (*b"&1", 178), (*b"&2", 179),
    (*b"&3", 180), (*b"&4", 181), (*b"&5", 182), (*b"&6", 183), (*b"&7", 184),
    (*b"&8", 185), (*b"&9", 186), (*b"*0", 197), (*b"*1", 188), (*b"*2", 189),
    (*b"*3", 190), (*b"*4", 191), (*b"*5", 192), (*b"*6", 193), (*b"*7", 194),
    (*b"*8", 195), (*b"*9", 196), (*b"@0", 167), (*b"@1", 158), (*b"@2", 159),
    (*b"@3", 160), (*b"@4", 161), (*b"@5", 162), (*b"@6", 163), (*b"@7", 164),
    (*b"@8", 165), (*b"@9", 166), (*b"AB", 360), (*b"AF", 359), (*b"AL", 110), (*b"CC", 9),
    (*b"CM", 15), (*b"CW", 277), (*b"DC", 105), (*b"DI", 280), (*b"DK", 275), (*b"DL", 106),
    (*b"DO", 107), (*b"F1", 216), (*b"F2", 217), (*b"F3", 218), (*b"F4", 219),
    (*b"F5", 220), (*b"F6", 221), (*b"F7", 222), (*b"F8", 223), (*b"F9", 224),
    (*b"FA", 225), (*b"FB", 226), (*b"FC", 227), (*b"FD", 228), (*b"FE", 229),
    (*b"FF", 230), (*b"FG", 231), (*b"FH", 232), (*b"FI", 233), (*b"FJ", 234),
    (*b"FK", 235), (*b"FL", 236), (*b"FM", 237), (*b"FN", 238), (*b"FO", 239),
    (*b"FP", 240), (*b"FQ", 241), (*b"FR", 242), (*b"FS", 243), (*b"FT", 244),
    (*b"FU", 245), (*b"FV", 246), (*b"FW", 247), (*b"FX", 248), (*b"FY", 249),
    (*b"FZ", 250), (*b"Fa", 251), (*b"Fb", 252), (*b"Fc", 253), (*b"Fd", 254),
    (*b"Fe", 255), (*b"Ff", 256), (*b"Fg", 257), (*b"Fh", 258), (*b"Fi", 259),
    (*b"Fj", 260), (*b"Fk", 261), (*b"Fl", 262), (*b"Fm", 263), (*b"Fn", 264),
    (*b"Fo", 265), (*b"Fp", 266), (*b"Fq", 267), (*b"Fr", 268), (*b"G1", 400),
    (*b"G2", 398), (*b"G3", 399), (*b"G4", 401), (*b"GC", 408), (*b"GD", 405),
    (*b"GH", 406), (*b"GL", 403), (*b"GR", 402), (*b"GU", 404), (*b"GV", 407),
    (*b"Gm", 358), (*b"HU", 279), (*b"IC", 108), (*b"Ic", 299), (*b"Ip", 300),
    (*b"K1", 139), (*b"K2", 141), (*b"K3", 140), (*b"K4", 142), (*b"K5", 143),
    (*b"Km", 355), (*b"LE", 111), (*b"LF", 157), (*b"LO", 156), (*b"Lf", 273),
    (*b"MC", 270), (*b"ML", 271), (*b"MR", 272), (*b"MT", 369), (*b"Mi", 356),
    (*b"PA", 285), (*b"PU", 283), (*b"QD", 281), (*b"RA", 152), (*b"RC", 276),
    (*b"RF", 215), (*b"RI", 112), (*b"RQ", 357), (*b"RX", 150), (*b"S1", 378),
    (*b"S2", 379), (*b"S3", 380), (*b"S4", 381), (*b"S5", 382), (*b"S6", 383),
    (*b"S7", 384), (*b"S8", 385), (*b"SA", 151), (*b"SC", 274), (*b"SF", 109),
    (*b"SR", 113), (*b"SX", 149), (*b"Sb", 303), (*b"Sf", 302), (*b"TO", 282),
    (*b"UP", 114), (*b"WA", 286), (*b"WG", 278), (*b"XF", 154), (*b"XN", 153),
    (*b"Xh", 386), (*b"Xl", 387), (*b"Xo", 388), (*b"Xr", 389), (*b"Xt", 390),
    (*b"Xv", 391), (*b"Xy", 370), (*b"YZ", 377), (*b"Yv", 372), (*b"Yw", 373),
    (*b"Yx", 374), (*b"Yy", 375), (*b"Yz", 376), (*b"ZA", 304), (*b"ZB", 305),
    (*b"ZC", 306), (*b"ZD", 307), (*b"ZE", 308), (*b"ZF", 309), (*b"ZG", 310),
    (*b"ZH", 311), (*b"ZI", 312), (*b"ZJ", 313), (*b"ZK", 314), (*b"ZL", 315),
    (*b"ZM", 316), (*b"ZN", 317), (*b"ZO", 318), (*b"ZP", 319), (*b"ZQ", 320),
    (*b"ZR", 321), (*b"ZS", 322), (*b"ZT", 323), (*b"ZU", 324), (*b"ZV", 325),
    (*b"ZW", 326), (*b"ZX", 327), (*b"ZY", 328), (*b"ZZ", 329), (*b"Za", 330),
    (*b"Zb", 331), (*b"Zc", 332), (*b"Zd", 333), (*b"Ze", 334), (*b"Zf", 335),
    (*b"Zg", 336), (*b"Zh", 337), (*b"Zi", 338), (*b"Zj", 339), (*b"Zk", 340),
    (*b"Zl", 341), (*b"Zm", 342), (*b"Zn", 343), (*b"Zo", 344), (*b"Zp", 345),
    (*b"Zq", 346), (*b"Zr", 347), (*b"Zs", 348), (*b"Zt", 349), (*b"Zu", 350),
    (*b"Zv", 351), (*b"Zw", 352), (*b"Zx", 353), (*b"Zy", 354), (*b"Zz", 371),
    (*b"ac", 146), (*b"ae", 38), (*b"al", 53), (*b"as", 25), (*b"bc", 395), (*b"bl", 1),
    (*b"bt", 0), (*b"bx", 411), (*b"cb", 269), (*b"cd", 7), (*b"ce", 6), (*b"ch", 8),
    (*b"ci", 363), (*b"cl", 5), (*b"cm", 10), (*b"cr", 2), (*b"cs", 3), (*b"ct", 4),
    (*b"cv", 127), (*b"dc", 21), (*b"dl", 22), (*b"dm", 29), (*b"do", 11), (*b"ds", 23),
    (*b"dv", 362), (*b"eA", 155), (*b"ec", 37), (*b"ed", 41), (*b"ei", 42), (*b"ff", 46),
    (*b"fh", 284), (*b"fs", 47), (*b"hd", 24), (*b"ho", 12), (*b"hu", 137), (*b"i1", 48),
    (*b"i2", 392), (*b"i3", 50), (*b"iP", 138), (*b"ic", 52), (*b"if", 51), (*b"im", 31),
    (*b"ip", 54), (*b"is", 49), (*b"k0", 65), (*b"k1", 66), (*b"k2", 68), (*b"k3", 69),
    (*b"k4", 70), (*b"k5", 71), (*b"k6", 72), (*b"k7", 73), (*b"k8", 74), (*b"k9", 75),
    (*b"k;", 67), (*b"kA", 78), (*b"kB", 148), (*b"kC", 57), (*b"kD", 59), (*b"kE", 63),
    (*b"kF", 84), (*b"kH", 80), (*b"kI", 77), (*b"kL", 60), (*b"kM", 62), (*b"kN", 81),
    (*b"kP", 82), (*b"kR", 85), (*b"kS", 64), (*b"kT", 86), (*b"ka", 56), (*b"kb", 55),
    (*b"kd", 61), (*b"ke", 88), (*b"kh", 76), (*b"kl", 79), (*b"ko", 396), (*b"kr", 83),
    (*b"ks", 89), (*b"kt", 58), (*b"ku", 87), (*b"l0", 90), (*b"l1", 91), (*b"l2", 93),
    (*b"l3", 94), (*b"l4", 95), (*b"l5", 96), (*b"l6", 97), (*b"l7", 98), (*b"l8", 99),
    (*b"l9", 100), (*b"la", 92), (*b"le", 14), (*b"ll", 18), (*b"ma", 397), (*b"mb", 26),
    (*b"md", 27), (*b"me", 39), (*b"mh", 30), (*b"mk", 32), (*b"ml", 409), (*b"mm", 102),
    (*b"mo", 101), (*b"mp", 33), (*b"mr", 34), (*b"mu", 410), (*b"nd", 17), (*b"nl", 394),
    (*b"nw", 103), (*b"oc", 298), (*b"op", 297), (*b"pO", 144), (*b"pc", 104),
    (*b"pf", 119), (*b"pk", 115), (*b"pl", 116), (*b"pn", 147), (*b"po", 120),
    (*b"ps", 118), (*b"px", 117), (*b"r1", 122), (*b"r2", 123), (*b"r3", 124),
    (*b"rP", 145), (*b"rc", 126), (*b"rf", 125), (*b"rp", 121), (*b"rs", 393),
    (*b"s0", 364), (*b"s1", 365), (*b"s2", 366), (*b"s3", 367), (*b"sa", 131),
    (*b"sc", 128), (*b"se", 43), (*b"sf", 129), (*b"so", 35), (*b"sp", 301), (*b"sr", 130),
    (*b"st", 132), (*b"ta", 134), (*b"te", 40), (*b"ti", 28), (*b"ts", 135), (*b"u0", 287),
    (*b"u1", 288), (*b"u2", 289), (*b"u3", 290), (*b"u4", 291), (*b"u5", 292),
    (*b"u6", 293), (*b"u7", 294), (*b"u8", 295), (*b"u9", 296), (*b"uc", 136), (*b"ue", 44),
    (*b"up", 19), (*b"us", 36), (*b"vb", 45), (*b"ve", 16), (*b"vi", 13), (*b"vs", 20),
    (*b"wi", 133), (*b"xl", 361),
];
