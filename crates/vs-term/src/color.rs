// SPDX-License-Identifier: MIT
//
// Color objects — the runtime table behind every cell's color index.
//
// Applications never put colors into cells. They put a small integer, the
// color object, and define separately what that object looks like:
//
//   object 0   white on black          (normal text)
//   object 1   green on black, reverse (selection, status bars)
//   object n   anything the application defines
//
// Each entry carries three descriptions of the same object:
//
//   Style   foreground, background and attribute bits, used when the
//           terminal does ANSI color
//   mono    the attribute bits used on a monochrome terminal
//   escape  an optional raw escape string that replaces the style entirely
//
// Because cells hold indices, redefining an object recolors every cell that
// references it. The screen engine treats any change here as a reason for a
// full redraw.
//
// Color names follow the classic sixteen-color palette ("black", "red", ...
// "white"), plus "colorN" for palettes with more entries and "default" for
// the terminal's own foreground or background.

use std::fmt;

/// Number of color objects in the table.
pub const COLOR_OBJECTS: usize = 256;

// ─── Attr ───────────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Display attributes a color object can carry.
    ///
    /// ```
    /// use vs_term::color::Attr;
    ///
    /// let a = Attr::BOLD | Attr::REVERSE;
    /// assert!(a.contains(Attr::BOLD));
    /// assert!(!a.contains(Attr::BLINK));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        const BOLD        = 1 << 0;
        const BLINK       = 1 << 1;
        const UNDERLINE   = 1 << 2;
        const REVERSE     = 1 << 3;
        /// Draw with the terminal's line-drawing character set.
        const ALT_CHARSET = 1 << 4;
    }
}

impl Attr {
    /// The attributes that are switched with `me`/`md`/`us`/... sequences.
    /// The alternate character set is switched separately.
    #[inline]
    #[must_use]
    pub const fn video(self) -> Self {
        self.difference(Self::ALT_CHARSET)
    }
}

// ─── Named ──────────────────────────────────────────────────────────────────

/// One side of a color pair as the user names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Named {
    /// The terminal's own default foreground or background.
    Default,
    /// A palette index.
    Index(u8),
}

const COLOR_NAMES: [(&str, u8); 16] = [
    ("black", 0),
    ("red", 1),
    ("green", 2),
    ("brown", 3),
    ("blue", 4),
    ("magenta", 5),
    ("cyan", 6),
    ("lightgray", 7),
    ("gray", 8),
    ("brightred", 9),
    ("brightgreen", 10),
    ("yellow", 11),
    ("brightblue", 12),
    ("brightmagenta", 13),
    ("brightcyan", 14),
    ("white", 15),
];

impl Named {
    /// Parse a color name: one of the sixteen palette names, `colorN`, or
    /// `default`. Case-insensitive.
    ///
    /// ```
    /// use vs_term::color::Named;
    ///
    /// assert_eq!(Named::parse("Red"), Some(Named::Index(1)));
    /// assert_eq!(Named::parse("color200"), Some(Named::Index(200)));
    /// assert_eq!(Named::parse("default"), Some(Named::Default));
    /// assert_eq!(Named::parse("mauve"), None);
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if name == "default" {
            return Some(Self::Default);
        }
        if let Some(n) = name.strip_prefix("color") {
            return n.parse::<u8>().ok().map(Self::Index);
        }
        COLOR_NAMES.iter().find(|(n, _)| *n == name).map(|&(_, i)| Self::Index(i))
    }

    /// Accept a bare number as `colorN`, as `COLORFGBG` spells them.
    fn parse_env(part: &str) -> Option<Self> {
        let part = part.trim();
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            part.parse::<u8>().ok().map(Self::Index)
        } else {
            Self::parse(part)
        }
    }
}

impl fmt::Display for Named {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Index(i) => match COLOR_NAMES.iter().find(|&&(_, n)| n == *i) {
                Some((name, _)) => f.write_str(name),
                None => write!(f, "color{i}"),
            },
        }
    }
}

/// The terminal's default colors, from `COLORFGBG` (`"15;0"`,
/// `"default;default"`, `"15;default;0"` as rxvt writes it with a pixmap)
/// or `DEFAULT_COLORS`.
///
/// If either side is `default`, both are, since a terminal that cannot name
/// one of its default colors cannot be trusted with the other.
#[must_use]
pub fn parse_default_colors(value: &str) -> Option<(Named, Named)> {
    let mut parts = value.split(';');
    let fg = Named::parse_env(parts.next()?)?;
    let bg = Named::parse_env(parts.next()?)?;
    if fg == Named::Default || bg == Named::Default {
        Some((Named::Default, Named::Default))
    } else {
        Some((fg, bg))
    }
}

// ─── Style ──────────────────────────────────────────────────────────────────

/// A resolved foreground/background/attribute triple.
///
/// `None` means the terminal's default color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    pub fg: Option<u8>,
    pub bg: Option<u8>,
    pub attrs: Attr,
}

impl Style {
    #[inline]
    #[must_use]
    pub const fn new(fg: u8, bg: u8) -> Self {
        Self {
            fg: Some(fg),
            bg: Some(bg),
            attrs: Attr::empty(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn with_attrs(mut self, attrs: Attr) -> Self {
        self.attrs = attrs;
        self
    }

    /// Fold named colors into a style the terminal can show.
    ///
    /// With more than eight colors, indices wrap at `max_colors`. With
    /// exactly eight, the bright half of the palette becomes bold (for the
    /// foreground) or blink (for the background, which many consoles show
    /// as a bright background).
    #[must_use]
    pub fn from_named(fg: Named, bg: Named, max_colors: u16) -> Self {
        let mut attrs = Attr::empty();
        let mut fold = |n: Named, bright: Attr| match n {
            Named::Default => None,
            Named::Index(i) if max_colors == 8 => {
                if i & 8 != 0 {
                    attrs |= bright;
                }
                Some(i & 7)
            }
            #[allow(clippy::cast_possible_truncation)]
            Named::Index(i) => Some(if max_colors == 0 { i } else { (u16::from(i) % max_colors) as u8 }),
        };
        let fg = fold(fg, Attr::BOLD);
        let bg = fold(bg, Attr::BLINK);
        Self { fg, bg, attrs }
    }
}

// ─── Pen ────────────────────────────────────────────────────────────────────

/// What the terminal is (or should be) drawing with.
///
/// Two objects with custom escape strings share a pen only when the
/// strings are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pen {
    Style(Style),
    /// A custom escape string, identified by the first object that uses it.
    Escape(u8),
}

// ─── ColorEntry ─────────────────────────────────────────────────────────────

/// One color object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorEntry {
    pub style: Style,
    pub mono: Attr,
    pub escape: Option<Box<[u8]>>,
    escape_id: u8,
}

impl ColorEntry {
    const fn plain(style: Style, mono: Attr) -> Self {
        Self {
            style,
            mono,
            escape: None,
            escape_id: 0,
        }
    }
}

// ─── ColorTable ─────────────────────────────────────────────────────────────

/// The stock `(fg, bg)` pairs for the first objects. Everything from object
/// 1 on is reverse video on a monochrome terminal.
const STOCK: [(u8, u8); 18] = [
    (7, 0),
    (2, 0),
    (5, 0),
    (6, 0),
    (1, 0),
    (2, 4),
    (1, 4),
    (1, 2),
    (4, 1),
    (2, 1),
    (6, 7),
    (3, 7),
    (5, 7),
    (0, 6),
    (2, 7),
    (2, 7),
    (2, 7),
    (2, 7),
];

/// The runtime color-object table.
#[derive(Debug, Clone)]
pub struct ColorTable {
    entries: Vec<ColorEntry>,
    max_colors: u16,
    defaults: Option<(Named, Named)>,
    first_modified: bool,
}

impl ColorTable {
    /// The stock table for a terminal with `max_colors` colors.
    #[must_use]
    pub fn new(max_colors: u16) -> Self {
        let entries = (0..COLOR_OBJECTS)
            .map(|i| {
                let (fg, bg) = STOCK.get(i).copied().unwrap_or((7, 0));
                let mono = if i == 0 { Attr::empty() } else { Attr::REVERSE };
                ColorEntry::plain(Style::new(fg, bg), mono)
            })
            .collect();
        Self {
            entries,
            max_colors,
            defaults: None,
            first_modified: false,
        }
    }

    /// Apply the terminal's default colors to objects 0 and 1 (normal and
    /// reversed), unless the application already redefined object 0.
    pub fn apply_default_colors(&mut self, defaults: Option<(Named, Named)>) {
        self.defaults = defaults;
        if self.first_modified {
            return;
        }
        if let Some((fg, bg)) = defaults {
            log::debug!("default colors {fg} on {bg}");
            self.store(0, Style::from_named(fg, bg, self.max_colors));
            self.store(1, Style::from_named(bg, fg, self.max_colors));
        }
    }

    #[inline]
    #[must_use]
    pub const fn max_colors(&self) -> u16 {
        self.max_colors
    }

    #[inline]
    #[must_use]
    pub fn entry(&self, obj: u8) -> &ColorEntry {
        &self.entries[usize::from(obj)]
    }

    // ── Definition ──

    /// Define an object from a style.
    pub fn set_style(&mut self, obj: u8, style: Style) {
        if obj == 0 {
            self.first_modified = true;
        }
        self.store(obj, style);
    }

    /// Define an object from foreground/background names. An empty name
    /// picks the terminal default for that side.
    ///
    /// Returns `false`, leaving the entry untouched, when a name is unknown.
    pub fn set_named(&mut self, obj: u8, fg: &str, bg: &str) -> bool {
        let (dfg, dbg) = self.defaults.unwrap_or((Named::Default, Named::Default));
        let side = |name: &str, fallback: Named| {
            if name.trim().is_empty() {
                Some(fallback)
            } else {
                Named::parse(name)
            }
        };
        let (Some(f), Some(b)) = (side(fg, dfg), side(bg, dbg)) else {
            log::warn!("unknown color pair {fg:?}/{bg:?} for object {obj}");
            return false;
        };
        self.set_fgbg(obj, f, b);
        true
    }

    /// Define an object from named colors, keeping its attribute bits.
    pub fn set_fgbg(&mut self, obj: u8, fg: Named, bg: Named) {
        let mut style = Style::from_named(fg, bg, self.max_colors);
        style.attrs |= self.entry(obj).style.attrs;
        self.set_style(obj, style);
    }

    /// Make an object emit `esc` verbatim instead of a style.
    pub fn set_escape(&mut self, obj: u8, esc: &[u8]) {
        let id = self
            .entries
            .iter()
            .position(|e| e.escape.as_deref() == Some(esc))
            .and_then(|i| u8::try_from(i).ok())
            .unwrap_or(obj);
        let e = &mut self.entries[usize::from(obj)];
        e.escape = Some(Box::from(esc));
        e.escape_id = id;
        if obj == 0 {
            self.first_modified = true;
        }
    }

    /// The attributes used for this object on a monochrome terminal.
    pub fn set_mono(&mut self, obj: u8, attrs: Attr) {
        self.entries[usize::from(obj)].mono = attrs;
    }

    /// Add attribute bits to both the color and the monochrome form.
    pub fn add_attributes(&mut self, obj: u8, attrs: Attr) {
        let e = &mut self.entries[usize::from(obj)];
        e.style.attrs |= attrs;
        e.mono |= attrs;
    }

    fn store(&mut self, obj: u8, style: Style) {
        let e = &mut self.entries[usize::from(obj)];
        e.style = style;
        e.escape = None;
        e.escape_id = 0;
    }

    // ── Resolution ──

    /// The pen an object draws with. `ansi` selects the color description
    /// over the monochrome one.
    #[must_use]
    pub fn pen(&self, obj: u8, ansi: bool) -> Pen {
        let e = self.entry(obj);
        if !ansi {
            return Pen::Style(Style {
                fg: None,
                bg: None,
                attrs: e.mono,
            });
        }
        match e.escape {
            Some(_) => Pen::Escape(e.escape_id),
            None => Pen::Style(e.style),
        }
    }

    /// Whether two objects look identical on screen.
    #[must_use]
    pub fn same_look(&self, a: u8, b: u8, ansi: bool) -> bool {
        a == b || self.pen(a, ansi) == self.pen(b, ansi)
    }

    /// Whether two cells look identical: same glyph and charset, and colors
    /// that resolve to the same pen.
    #[must_use]
    pub fn cells_match(&self, a: crate::cell::Cell, b: crate::cell::Cell, ansi: bool) -> bool {
        a == b || (a.same_glyph(b) && self.same_look(a.color(), b.color(), ansi))
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new(8)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
