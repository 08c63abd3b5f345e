// SPDX-License-Identifier: MIT
//
// The output driver: a state machine over the physical terminal.
//
// `TermDriver` tracks what the terminal is doing right now (cursor
// position, the pen it draws with, the scroll region, whether the
// alternate character set is selected) and turns each request into the
// fewest bytes that get there. Every sequence comes from the terminal's
// capability entry, expanded through `vs_caps::param`.
//
// The tracked cursor is either exact or `None`. Anything whose effect on
// the position cannot be predicted (line insert/delete, raw writes, the
// last column of an auto-margin terminal) forgets it, and the next motion
// falls back to absolute addressing.
//
// The pen is tracked the same way. `set_color` on the pen already in use
// writes nothing; changing attribute bits resets with `me` first because
// terminals cannot turn single attributes off.
//
// Startup derives a `Profile` from the database. Real entries are often
// incomplete or wrong for well-known families, so the profile patches them:
//
//   vt1xx, xterm, linux   line insert/delete defaults
//   xterm, rxvt, Eterm    erase-to-BOL/EOL, blink, shift-in/out charset
//   no scroll region      borrow the vtxxx strings, or give up scrolling
//   magic-cookie glitch   no highlighting, no line drawing

use std::borrow::Cow;
use std::io::Write;
use std::time::Duration;

use bitflags::bitflags;
use vs_caps::{Code, Database, SearchPath, code, param};

use crate::cell::Cell;
use crate::color::{Attr, ColorTable, Pen, Style};
use crate::config::TermConfig;
use crate::error::{MessageHook, Result, TermError, default_hook};
use crate::output::OutputBuffer;
use crate::terminal::{self, Size};

type Seq = Box<[u8]>;

const DEFAULT_FG: &[u8] = b"\x1b[39m";
const DEFAULT_BG: &[u8] = b"\x1b[49m";
const ANSI_FG: &[u8] = b"\x1b[3%dm";
const ANSI_BG: &[u8] = b"\x1b[4%dm";

/// `setf`/`setb` number colors blue-green-red.
const RGB_TO_BGR: [i32; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

// ─── Family ─────────────────────────────────────────────────────────────────

/// Terminal families recognized by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Family {
    /// `vt1xx` through `vt9xx` (not `vt52`).
    pub vt100_like: bool,
    /// `linux*`, and `con*` on Linux.
    pub linux_console: bool,
    /// `xterm*`, `rxvt*`, `Eterm*`.
    pub xterm: bool,
    pub aixterm: bool,
    pub screen: bool,
}

impl Family {
    #[must_use]
    pub fn of(name: &str) -> Self {
        let b = name.as_bytes();
        Self {
            vt100_like: name != "vt52" && b.starts_with(b"vt") && matches!(b.get(2), Some(b'1'..=b'9')),
            linux_console: name.starts_with("linux") || (cfg!(target_os = "linux") && name.starts_with("con")),
            xterm: name.starts_with("xterm") || name.starts_with("rxvt") || name.starts_with("Eterm"),
            aixterm: name.starts_with("aixterm"),
            screen: name == "screen",
        }
    }

    /// Close enough to a vt102 that the built-in strings will do when no
    /// entry is installed.
    #[must_use]
    pub const fn almost_vtxxx(self) -> bool {
        self.vt100_like || self.linux_console || self.xterm || self.screen
    }
}

// ─── Profile ────────────────────────────────────────────────────────────────

/// Everything the driver uses from a capability entry, with family fix-ups
/// applied. Each string is ready to send (padding stripped).
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    pub family: Family,

    pub clear: Option<Seq>,                   // cl
    pub cursor_address: Option<Seq>,          // cm
    pub cursor_up: Option<Seq>,               // up
    pub cursor_right: Option<Seq>,            // RI
    pub tab: Option<Seq>,                     // ta
    pub insert_mode: Option<Seq>,             // im
    pub end_insert_mode: Option<Seq>,         // ei
    pub delete_char: Option<Seq>,             // dc
    pub visible_bell: Option<Seq>,            // vb
    pub reverse_index: Option<Seq>,           // sr
    pub delete_lines: Option<Seq>,            // DL
    pub insert_lines: Option<Seq>,            // AL
    pub scroll_region: Option<Seq>,           // cs
    pub clear_eol: Option<Seq>,               // ce
    pub clear_bol: Option<Seq>,               // cb
    pub reverse: Option<Seq>,                 // mr, so
    pub bold: Option<Seq>,                    // md
    pub blink: Option<Seq>,                   // mb
    pub underline: Option<Seq>,               // us
    pub normal: Option<Seq>,                  // me, se
    pub enter_ca: Option<Seq>,                // ti
    pub exit_ca: Option<Seq>,                 // te
    pub keypad_on: Option<Seq>,               // ks
    pub keypad_off: Option<Seq>,              // ke
    pub acs_start: Option<Seq>,               // as
    pub acs_end: Option<Seq>,                 // ae
    pub acs_enable: Option<Seq>,              // eA
    pub acs_pairs: Option<Seq>,               // ac
    pub cursor_invisible: Option<Seq>,        // vi
    pub cursor_visible: Option<Seq>,          // ve
    pub reset_colors: Option<Seq>,            // op
    pub set_fg: Option<Seq>,                  // AF, Sf
    pub set_bg: Option<Seq>,                  // AB, Sb
    pub to_status: Option<Seq>,               // ts
    pub from_status: Option<Seq>,             // fs
    pub disable_status: Option<Seq>,          // ds

    pub fg_bgr: bool,
    pub bg_bgr: bool,
    pub auto_margins: bool,
    pub worthless_highlight: bool,
    pub has_status_line: bool,
    pub status_columns: u16,
    /// Columns between hardware tab stops (`it`, default 8).
    pub tab_width: u16,
    pub has_alt_charset: bool,
    pub cannot_scroll: bool,
    pub cannot_insert: bool,
    /// Both color strings came from the entry, or color was forced on.
    pub color_terminal: bool,
    pub ansi_colors: bool,
    pub bce: bool,
    pub max_colors: u16,
    pub lines: Option<u16>,
    pub columns: Option<u16>,
}

fn seq(db: &Database, c: Code) -> Option<Seq> {
    db.sequence(c).map(|s| Box::from(s.as_ref()))
}

fn lit(s: &[u8]) -> Option<Seq> {
    Some(Box::from(s))
}

impl Profile {
    /// Derive the profile of terminal `name` from `db`.
    ///
    /// # Errors
    ///
    /// [`TermError::MissingCapability`] when the entry cannot clear the
    /// screen or address the cursor.
    pub fn from_database(name: &str, db: &Database, cfg: &TermConfig) -> Result<Self> {
        let family = Family::of(name);
        let s = |c| seq(db, c);
        let number = |c| db.number(c).and_then(|n| u16::try_from(n).ok());

        let mut p = Self {
            name: name.to_owned(),
            family,
            clear: s(code!("cl")),
            cursor_address: s(code!("cm")),
            insert_mode: s(code!("im")),
            end_insert_mode: s(code!("ei")),
            delete_char: s(code!("dc")),
            visible_bell: s(code!("vb")),
            cursor_up: s(code!("up")),
            reverse_index: s(code!("sr")),
            delete_lines: s(code!("DL")),
            insert_lines: s(code!("AL")),
            enter_ca: s(code!("ti")),
            exit_ca: s(code!("te")),
            scroll_region: s(code!("cs")),
            lines: number(code!("li")),
            columns: number(code!("co")),
            ..Self::default()
        };
        p.cannot_insert = p.insert_mode.is_none() || p.end_insert_mode.is_none() || p.delete_char.is_none();

        // Keypad strings only matter off the vtxxx family, which needs none.
        if !family.almost_vtxxx() {
            p.keypad_on = s(code!("ks"));
            p.keypad_off = s(code!("ke"));
        }

        if (family.vt100_like && name.as_bytes().get(2) != Some(&b'1')) || family.linux_console || family.xterm {
            p.delete_lines.get_or_insert_with(|| Box::from(&b"\x1b[%dM"[..]));
            p.insert_lines.get_or_insert_with(|| Box::from(&b"\x1b[%dL"[..]));
        }

        if p.scroll_region.is_none()
            || ((p.delete_lines.is_none() || p.insert_lines.is_none()) && p.reverse_index.is_none())
        {
            if family.xterm || family.linux_console {
                log::debug!("{name}: entry lacks scrolling, using vt102 strings");
                p.borrow_vtxxx();
            } else {
                p.cannot_scroll = true;
            }
        }

        p.clear_eol = s(code!("ce"));
        p.clear_bol = s(code!("cb"));
        if family.xterm {
            p.clear_bol.get_or_insert_with(|| Box::from(&b"\x1b[1K"[..]));
            p.clear_eol.get_or_insert_with(|| Box::from(&b"\x1b[K"[..]));
        }

        p.reverse = s(code!("mr")).or_else(|| s(code!("so")));
        p.bold = s(code!("md"));
        p.blink = s(code!("mb"));
        if family.xterm {
            // xterm shows blink as bold; some rxvt builds as a bright background.
            p.blink.get_or_insert_with(|| Box::from(&b"\x1b[5m"[..]));
        }
        p.underline = s(code!("us"));

        p.fill_alt_charset(db);

        if db.has_flag(code!("hs")) {
            p.has_status_line = true;
            p.disable_status = s(code!("ds"));
            p.from_status = s(code!("fs"));
            p.to_status = s(code!("ts"));
            p.status_columns = number(code!("ws")).unwrap_or(0);
        }

        p.normal = s(code!("me")).or_else(|| s(code!("se")));
        p.cursor_invisible = s(code!("vi"));
        p.cursor_visible = s(code!("ve"));
        p.cursor_right = s(code!("RI"));
        p.tab = s(code!("ta"));
        p.tab_width = number(code!("it")).filter(|&w| w > 0).unwrap_or(8);

        p.auto_margins = db.has_flag(code!("am"));
        p.worthless_highlight = db.has_flag(code!("xs")) || db.number(code!("sg")).is_some_and(|n| n > 0);
        if p.worthless_highlight {
            p.has_alt_charset = false;
        }

        p.fill_colors(db, cfg);
        p.bce = db.has_flag(code!("ut")) || family.linux_console || cfg.force_bce;

        if p.clear.is_none() {
            return Err(TermError::MissingCapability { term: name.to_owned(), what: "a clear-screen sequence" });
        }
        if p.cursor_address.is_none() {
            return Err(TermError::MissingCapability { term: name.to_owned(), what: "cursor addressing" });
        }
        Ok(p)
    }

    /// Take the vt102 scrolling and editing strings. Strings the entry
    /// provides for anything else are kept.
    fn borrow_vtxxx(&mut self) {
        let vt = Database::vtxxx(false);
        let s = |c| seq(&vt, c);
        self.scroll_region = s(code!("cs"));
        self.reverse_index = s(code!("sr"));
        self.delete_lines = s(code!("DL"));
        self.insert_lines = s(code!("AL"));
        self.insert_mode = s(code!("im"));
        self.end_insert_mode = s(code!("ei"));
        self.delete_char = s(code!("dc"));
        self.cannot_insert = false;
        self.cannot_scroll = false;
        for (slot, c) in [
            (&mut self.clear, code!("cl")),
            (&mut self.cursor_address, code!("cm")),
            (&mut self.cursor_up, code!("up")),
        ] {
            if slot.is_none() {
                *slot = s(c);
            }
        }
    }

    fn fill_alt_charset(&mut self, db: &Database) {
        let s = |c| seq(db, c);
        self.acs_start = s(code!("as"));
        self.acs_end = s(code!("ae"));
        self.acs_enable = s(code!("eA"));
        self.acs_pairs = s(code!("ac"));

        if self.acs_pairs.is_none() && self.family.vt100_like {
            self.acs_start = lit(b"\x0e");
            self.acs_end = lit(b"\x0f");
            self.acs_enable = lit(b"\x1b)0");
        }
        if self.family.xterm || self.family.aixterm {
            self.acs_start = lit(b"\x0e");
            self.acs_end = lit(b"\x0f");
            self.acs_enable = lit(b"\x1b(B\x1b)0");
        }
        self.has_alt_charset =
            self.acs_pairs.is_some() || (self.acs_start.is_some() && self.acs_end.is_some());
        if !self.has_alt_charset {
            self.acs_enable = None;
        }
    }

    fn fill_colors(&mut self, db: &Database, cfg: &TermConfig) {
        let s = |c| seq(db, c);
        self.reset_colors = s(code!("op"));
        self.set_fg = s(code!("AF"));
        if self.set_fg.is_none() {
            self.set_fg = s(code!("Sf"));
            self.fg_bgr = self.set_fg.is_some();
        }
        self.set_bg = s(code!("AB"));
        if self.set_bg.is_none() {
            self.set_bg = s(code!("Sb"));
            self.bg_bgr = self.set_bg.is_some();
        }
        self.max_colors = db.number(code!("Co")).and_then(|n| u16::try_from(n).ok()).unwrap_or(8);

        self.color_terminal = self.set_fg.is_some() && self.set_bg.is_some();
        if !self.color_terminal {
            self.set_fg = lit(ANSI_FG);
            self.set_bg = lit(ANSI_BG);
            self.fg_bgr = false;
            self.bg_bgr = false;
            self.max_colors = 8;
        }
        self.ansi_colors = self.color_terminal || cfg.force_ansi_colors;
        self.color_terminal = self.ansi_colors;
    }

    /// Whether hardware scrolling is usable at all.
    #[must_use]
    pub const fn can_scroll(&self) -> bool {
        !self.cannot_scroll && self.scroll_region.is_some()
    }
}

/// Load the capability entry for the configured terminal.
///
/// A terminal of the vtxxx family without an installed entry gets the
/// built-in vt100/vt102 description.
///
/// # Errors
///
/// [`TermError::NoTerminal`] when `TERM` is unset, [`TermError::Capability`]
/// when no entry exists and no built-in one applies.
pub fn load_database(cfg: &TermConfig) -> Result<(String, Database)> {
    let name = cfg.term.clone().filter(|t| !t.is_empty()).ok_or(TermError::NoTerminal)?;
    let db = load_with_fallback(&name, &cfg.search)?;
    Ok((name, db))
}

fn load_with_fallback(name: &str, search: &SearchPath) -> Result<Database> {
    match Database::load(name, search) {
        Ok(db) => {
            log::debug!("{name}: capabilities from {:?}", db.origin());
            Ok(db)
        }
        Err(e) if Family::of(name).almost_vtxxx() => {
            log::warn!("{name}: {e}; using built-in vt10x description");
            Ok(Database::vtxxx(name == "vt100"))
        }
        Err(e) => Err(e.into()),
    }
}

// ─── Beep ───────────────────────────────────────────────────────────────────

bitflags! {
    /// How `beep` gets attention.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Beep: u8 {
        const AUDIBLE = 1;
        const VISIBLE = 2;
    }
}

impl Default for Beep {
    fn default() -> Self {
        Self::AUDIBLE
    }
}

// ─── TermDriver ─────────────────────────────────────────────────────────────

/// What the terminal draws with: a pen plus the character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ink {
    pen: Pen,
    acs: bool,
}

/// The output driver for one terminal.
pub struct TermDriver<W: Write> {
    profile: Profile,
    out: OutputBuffer<W>,
    colors: ColorTable,
    size: Size,
    size_hint: TermConfig,
    /// Absolute row and column, `None` when unknown.
    cursor: Option<(i32, i32)>,
    ink: Option<Ink>,
    charset: Option<bool>,
    region: (i32, i32),
    video_initialized: bool,
    use_ansi: bool,
    blink_mode: bool,
    beep: Beep,
    hook: MessageHook,
}

impl<W: Write> TermDriver<W> {
    /// Build a driver for `db`, writing to `dev`.
    ///
    /// # Errors
    ///
    /// [`TermError::MissingCapability`] when the entry is unusable.
    pub fn new(db: &Database, cfg: &TermConfig, dev: W) -> Result<Self> {
        let name = cfg.term.clone().or_else(|| db.names().first().cloned()).unwrap_or_default();
        let profile = Profile::from_database(&name, db, cfg)?;
        Ok(Self::with_profile(profile, cfg, dev))
    }

    /// Load the configured terminal's entry and build a driver.
    ///
    /// # Errors
    ///
    /// Any initialization failure, after it was passed to the default
    /// message hook.
    pub fn open(cfg: &TermConfig, dev: W) -> Result<Self> {
        Self::open_with_hook(cfg, dev, default_hook())
    }

    /// [`open`](Self::open) reporting failures to `hook`.
    ///
    /// # Errors
    ///
    /// Any initialization failure, after it was passed to `hook`.
    pub fn open_with_hook(cfg: &TermConfig, dev: W, mut hook: MessageHook) -> Result<Self> {
        let built = load_database(cfg).and_then(|(name, db)| {
            Profile::from_database(&name, &db, cfg).map(|p| Self::with_profile(p, cfg, dev))
        });
        match built {
            Ok(mut d) => {
                d.hook = hook;
                Ok(d)
            }
            Err(e) => {
                hook(&e);
                Err(e)
            }
        }
    }

    /// Build a driver from an already derived profile.
    #[must_use]
    pub fn with_profile(profile: Profile, cfg: &TermConfig, dev: W) -> Self {
        let size_hint = TermConfig {
            lines: cfg.lines.or(profile.lines),
            columns: cfg.columns.or(profile.columns),
            ..cfg.clone()
        };
        let size = terminal::screen_size(&size_hint);
        let mut colors = ColorTable::new(profile.max_colors);
        colors.apply_default_colors(cfg.default_colors);
        log::debug!(
            "{}: {}x{}, {} colors, ansi={} bce={} scroll={} insert={}",
            profile.name,
            size.cols,
            size.rows,
            profile.max_colors,
            profile.ansi_colors,
            profile.bce,
            profile.can_scroll(),
            !profile.cannot_insert,
        );
        let use_ansi = profile.ansi_colors;
        Self {
            profile,
            out: OutputBuffer::new(dev).with_baud(cfg.baud),
            colors,
            region: (0, i32::from(size.rows) - 1),
            size,
            size_hint,
            cursor: None,
            ink: None,
            charset: Some(false),
            video_initialized: false,
            use_ansi,
            blink_mode: true,
            beep: Beep::default(),
            hook: default_hook(),
        }
    }

    /// Pretend the terminal has `size`.
    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.set_size(size);
        self
    }

    // ── State ──

    #[inline]
    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        self.region = (0, i32::from(size.rows) - 1);
        self.cursor = None;
    }

    /// Ask the tty for its size again.
    pub fn refresh_size(&mut self) -> Size {
        let size = terminal::screen_size(&self.size_hint);
        if size != self.size {
            log::debug!("resized to {}x{}", size.cols, size.rows);
            self.set_size(size);
        }
        size
    }

    /// The tracked cursor, relative to the top of the screen.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Option<(i32, i32)> {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub const fn colors(&self) -> &ColorTable {
        &self.colors
    }

    /// Mutable access to the color table. The tracked pen is forgotten.
    pub fn colors_mut(&mut self) -> &mut ColorTable {
        self.ink = None;
        &mut self.colors
    }

    #[inline]
    #[must_use]
    pub const fn uses_ansi_colors(&self) -> bool {
        self.use_ansi
    }

    pub fn set_use_ansi_colors(&mut self, on: bool) {
        self.use_ansi = on;
        self.ink = None;
    }

    pub fn set_blink_mode(&mut self, on: bool) {
        self.blink_mode = on;
    }

    pub fn set_beep(&mut self, beep: Beep) {
        self.beep = beep;
    }

    pub fn set_message_hook(&mut self, hook: MessageHook) {
        self.hook = hook;
    }

    #[inline]
    #[must_use]
    pub const fn output(&self) -> &OutputBuffer<W> {
        &self.out
    }

    #[inline]
    pub fn output_mut(&mut self) -> &mut OutputBuffer<W> {
        &mut self.out
    }

    fn emit(&mut self, s: Option<&Seq>) -> bool {
        s.is_some_and(|s| {
            self.out.write(s);
            true
        })
    }

    fn emit_with(&mut self, template: Option<&Seq>, params: &[i32]) -> bool {
        let Some(t) = template else { return false };
        let bytes = param::expand(t, params);
        self.out.write(&bytes);
        true
    }

    fn last_row(&self) -> i32 {
        i32::from(self.size.rows) - 1
    }

    // ── Cursor motion ──

    /// Move to `row` (relative to the scroll region top) and `col`.
    ///
    /// A negative coordinate only forgets the cursor. A target beyond the
    /// last row or column is sent absolutely and forgets it too, since the
    /// terminal clamps it to a position we cannot know.
    pub fn goto_rc(&mut self, row: i32, col: i32) {
        if row < 0 || col < 0 {
            self.cursor = None;
            return;
        }
        let row = row + self.region.0;
        if row >= i32::from(self.size.rows) || col >= i32::from(self.size.cols) {
            let cm = self.profile.cursor_address.clone();
            self.emit_with(cm.as_ref(), &[row, col]);
            self.cursor = None;
            return;
        }
        let absolute = self.profile.cursor_address.as_deref().map(|t| param::expand(t, &[row, col]));
        match self.relative_motion(row, col) {
            Some(rel) if absolute.as_ref().is_none_or(|a| rel.len() <= a.len()) => self.out.write(&rel),
            _ => {
                if let Some(abs) = absolute {
                    self.out.write(&abs);
                }
            }
        }
        self.cursor = Some((row, col));
    }

    /// The cheapest relative motion from the tracked cursor, if any.
    fn relative_motion(&self, r: i32, c: i32) -> Option<Cow<'static, [u8]>> {
        let (cr, cc) = self.cursor?;
        if (cr, cc) == (r, c) {
            return Some(Cow::Borrowed(&b""[..]));
        }
        let n = r - cr;
        let mut best: Option<Cow<'static, [u8]>> = None;
        let mut offer = |s: Cow<'static, [u8]>| {
            if best.as_ref().is_none_or(|b| s.len() < b.len()) {
                best = Some(s);
            }
        };

        if n == 0 && cc == c + 1 {
            offer(Cow::Borrowed(&b"\x08"[..]));
        }
        // Linefeeds scroll when they cross the region bottom.
        let crosses_bottom = cr <= self.region.1 && r > self.region.1;
        if c == 0 && (0..=4).contains(&n) && !crosses_bottom {
            let mut s = Vec::with_capacity(5);
            if cc != 0 {
                s.push(b'\r');
            }
            s.resize(s.len() + n.unsigned_abs() as usize, b'\n');
            offer(Cow::Owned(s));
        }
        if n == -1 && cc == c {
            if let Some(up) = &self.profile.cursor_up {
                offer(Cow::Owned(up.to_vec()));
            }
        }
        if n == 0 && c > cc {
            if let Some(ri) = &self.profile.cursor_right {
                offer(Cow::Owned(param::expand(ri, &[c - cc])));
            }
            let stop = i32::from(self.profile.tab_width);
            if let Some(ta) = &self.profile.tab {
                if stop > 0 && c == (cc / stop + 1) * stop {
                    offer(Cow::Owned(ta.to_vec()));
                }
            }
        }
        best
    }

    /// Advance `n` columns on `row`: spaces for a short hop, `RI` or an
    /// absolute move otherwise.
    pub fn forward_cursor(&mut self, n: i32, row: i32) {
        if n <= 0 {
            return;
        }
        if n <= 4 {
            self.normal_video();
            let spaces = [b' '; 4];
            #[allow(clippy::cast_sign_loss)]
            self.write_with_care(&spaces[..n as usize]);
            return;
        }
        if self.profile.cursor_right.is_some() {
            let ri = self.profile.cursor_right.clone();
            self.emit_with(ri.as_ref(), &[n]);
            self.advance(n);
            return;
        }
        let col = self.cursor.map_or(0, |(_, c)| c);
        self.goto_rc(row - self.region.0, col + n);
    }

    // ── Pens ──

    /// Draw with color object `obj`.
    pub fn set_color(&mut self, obj: u8) {
        if self.profile.worthless_highlight {
            return;
        }
        if !self.video_initialized {
            let s = if obj == 0 { self.profile.normal.clone() } else { self.profile.reverse.clone() };
            self.emit(s.as_ref());
            self.ink = None;
            return;
        }
        let pen = self.colors.pen(obj, self.use_ansi);
        self.apply_ink(Ink { pen, acs: false });
    }

    /// Draw with color object 0.
    pub fn normal_video(&mut self) {
        self.set_color(0);
    }

    fn apply_ink(&mut self, ink: Ink) {
        if self.ink == Some(ink) {
            return;
        }
        match ink.pen {
            Pen::Escape(id) => {
                let esc = self.colors.entry(id).escape.clone();
                self.emit(esc.as_ref());
                self.set_charset(ink.acs);
            }
            Pen::Style(style) => self.write_attributes(style, ink.acs),
        }
        self.ink = Some(ink);
    }

    fn write_attributes(&mut self, want: Style, acs: bool) {
        let current = match self.ink {
            Some(Ink { pen: Pen::Style(s), .. }) => Some(s),
            _ => None,
        };
        let mut reset = false;
        if current.map(|s| s.attrs.video()) != Some(want.attrs.video()) {
            if current.is_none_or(|s| !s.attrs.video().is_empty()) {
                let me = self.profile.normal.clone();
                self.emit(me.as_ref());
                // `me` may or may not leave the alternate set.
                if self.charset != Some(false) {
                    self.charset = None;
                }
            }
            reset = true;
            let attrs = want.attrs;
            let p = &self.profile;
            let mut on: Vec<Option<Seq>> = Vec::with_capacity(4);
            if attrs.contains(Attr::UNDERLINE) {
                on.push(p.underline.clone());
            }
            if attrs.contains(Attr::BOLD) {
                on.push(p.bold.clone());
            }
            if attrs.contains(Attr::REVERSE) {
                on.push(p.reverse.clone());
            }
            if attrs.contains(Attr::BLINK) && self.blink_mode {
                on.push(p.blink.clone());
            }
            for s in &on {
                self.emit(s.as_ref());
            }
        }
        self.set_charset(acs || want.attrs.contains(Attr::ALT_CHARSET));

        if !self.use_ansi {
            return;
        }
        if reset || current.is_none_or(|c| c.fg != want.fg) {
            match want.fg {
                None => self.out.write(DEFAULT_FG),
                Some(i) => {
                    let arg = color_arg(i, self.profile.fg_bgr);
                    let t = self.profile.set_fg.clone();
                    self.emit_with(t.as_ref(), &[arg]);
                }
            }
        }
        if reset || current.is_none_or(|c| c.bg != want.bg) {
            match want.bg {
                None => self.out.write(DEFAULT_BG),
                Some(i) => {
                    let arg = color_arg(i, self.profile.bg_bgr);
                    let t = self.profile.set_bg.clone();
                    self.emit_with(t.as_ref(), &[arg]);
                }
            }
        }
    }

    /// Select or leave the alternate (line-drawing) character set.
    pub fn set_charset(&mut self, alt: bool) {
        if !self.profile.has_alt_charset || self.charset == Some(alt) {
            return;
        }
        let s = if alt { self.profile.acs_start.clone() } else { self.profile.acs_end.clone() };
        self.emit(s.as_ref());
        self.charset = Some(alt);
    }

    // ── Cell output ──

    /// Write a run of cells at the cursor, switching pens only where the
    /// color changes.
    pub fn write_cells(&mut self, cells: &[Cell]) {
        let mut run: Vec<u8> = Vec::with_capacity(cells.len());
        let mut last: Option<u8> = None;
        for &cell in cells {
            let key = cell.raw().to_be_bytes()[0];
            if last != Some(key) && !self.profile.worthless_highlight {
                let ink = Ink { pen: self.colors.pen(cell.color(), self.use_ansi), acs: cell.is_acs() };
                if self.ink != Some(ink) {
                    self.write_with_care(&run);
                    run.clear();
                    self.apply_ink(ink);
                    last = Some(key);
                }
            }
            run.push(cell.ch());
        }
        self.write_with_care(&run);

        if self.profile.auto_margins && self.cursor.is_some_and(|(_, c)| c + 1 >= i32::from(self.size.cols)) {
            self.cursor = None;
        }
    }

    /// Write bytes at the cursor without touching the lower-right corner
    /// of an auto-margin terminal.
    fn write_with_care(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut n = bytes.len();
        if self.profile.auto_margins {
            if let Some((r, c)) = self.cursor {
                let cols = usize::from(self.size.cols);
                #[allow(clippy::cast_sign_loss)]
                let c = c.max(0) as usize;
                if r == self.last_row() && c + n >= cols {
                    n = cols.saturating_sub(c + 1);
                }
            }
        }
        self.out.write(&bytes[..n]);
        self.advance(i32::try_from(bytes.len()).unwrap_or(i32::MAX));
    }

    /// Move the tracked column `n` to the right. Running off the last
    /// column forgets the cursor: the terminal either wrapped or stuck at
    /// the margin.
    fn advance(&mut self, n: i32) {
        let cols = i32::from(self.size.cols);
        self.cursor = self.cursor.and_then(|(r, c)| {
            let c = c.saturating_add(n);
            (c < cols).then_some((r, c))
        });
    }

    /// Write one byte at the cursor.
    pub fn put_char(&mut self, ch: u8) {
        self.out.write(&[ch]);
        self.advance(1);
    }

    /// Send bytes verbatim. The cursor is forgotten.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.out.write(bytes);
        self.cursor = None;
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_raw(s.as_bytes());
    }

    // ── Regions ──

    /// Restrict scrolling to rows `top..=bottom`.
    pub fn scroll_region(&mut self, top: i32, bottom: i32) {
        let cs = self.profile.scroll_region.clone();
        self.emit_with(cs.as_ref(), &[top, bottom]);
        self.region = (top, bottom);
        self.cursor = None;
    }

    pub fn reset_scroll_region(&mut self) {
        self.scroll_region(0, self.last_row());
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> (i32, i32) {
        self.region
    }

    fn clear_region_line(&mut self) {
        let row = self.cursor.map_or(self.region.0, |(r, _)| r);
        self.goto_rc(row - self.region.0, 0);
        self.clear_to_eol();
    }

    /// Delete `n` lines at the cursor, pulling the rest of the region up.
    pub fn delete_lines(&mut self, n: i32) {
        if n <= 0 {
            return;
        }
        self.normal_video();
        let (top, bottom) = self.region;
        if top == bottom {
            self.clear_region_line();
            return;
        }
        let dl = self.profile.delete_lines.clone();
        if !self.emit_with(dl.as_ref(), &[n]) {
            // Scroll a region starting at the cursor with linefeeds.
            let row = self.cursor.map_or(top, |(r, _)| r);
            self.scroll_region(row, bottom);
            self.goto_rc(bottom - row, 0);
            #[allow(clippy::cast_sign_loss)]
            self.out.write(&vec![b'\n'; n as usize]);
            self.scroll_region(top, bottom);
            self.goto_rc(row - top, 0);
        }
        self.cursor = None;
    }

    /// Insert `n` blank lines at the cursor, pushing the rest of the region
    /// down.
    pub fn insert_lines(&mut self, n: i32) {
        if n <= 0 {
            return;
        }
        self.normal_video();
        if self.region.0 == self.region.1 {
            self.clear_region_line();
            return;
        }
        let al = self.profile.insert_lines.clone();
        if !self.emit_with(al.as_ref(), &[n]) {
            let sr = self.profile.reverse_index.clone();
            for _ in 0..n {
                self.emit(sr.as_ref());
            }
        }
        self.cursor = None;
    }

    // ── Erasing ──

    pub fn clear_screen(&mut self) {
        if !self.use_ansi && self.profile.color_terminal {
            let op = self.profile.reset_colors.clone();
            if !self.emit(op.as_ref()) {
                self.out.write(b"\x1b[0m\x1b[m");
            }
        }
        self.normal_video();
        self.reset_scroll_region();
        let cl = self.profile.clear.clone();
        self.emit(cl.as_ref());
    }

    /// Normal video, then erase to the end of the line.
    pub fn clear_to_eol(&mut self) {
        self.normal_video();
        self.erase_eol();
    }

    /// Erase to the end of the line in the current pen.
    pub fn erase_eol(&mut self) {
        let ce = self.profile.clear_eol.clone();
        if self.emit(ce.as_ref()) {
            return;
        }
        let Some((r, c)) = self.cursor else { return };
        let mut end = i32::from(self.size.cols);
        if self.profile.auto_margins && r == self.last_row() {
            end -= 1;
        }
        if end > c {
            #[allow(clippy::cast_sign_loss)]
            self.out.write(&vec![b' '; (end - c) as usize]);
        }
        self.cursor = None;
    }

    /// Erase from the start of the line through the cursor.
    pub fn del_bol(&mut self) -> bool {
        let cb = self.profile.clear_bol.clone();
        self.emit(cb.as_ref())
    }

    pub fn erase_line(&mut self) {
        self.out.write(b"\r");
        self.cursor = self.cursor.map(|(r, _)| (r, 0));
        self.clear_to_eol();
    }

    pub fn delete_char(&mut self) {
        self.normal_video();
        let dc = self.profile.delete_char.clone();
        self.emit(dc.as_ref());
    }

    pub fn begin_insert(&mut self) {
        let im = self.profile.insert_mode.clone();
        self.emit(im.as_ref());
    }

    pub fn end_insert(&mut self) {
        let ei = self.profile.end_insert_mode.clone();
        self.emit(ei.as_ref());
    }

    // ── Modes ──

    /// Ring the bell, flash the screen, or both.
    ///
    /// # Errors
    ///
    /// A failed flush.
    pub fn beep(&mut self) -> Result<()> {
        if self.beep.contains(Beep::AUDIBLE) {
            self.out.write(b"\x07");
        }
        if self.beep.contains(Beep::VISIBLE) {
            let vb = self.profile.visible_bell.clone();
            if !self.emit(vb.as_ref()) && self.profile.family.linux_console {
                self.out.write(b"\x1b[?5h");
                self.flush()?;
                std::thread::sleep(Duration::from_millis(50));
                self.out.write(b"\x1b[?5l");
            }
        }
        self.flush()
    }

    /// Show or hide the cursor. `false` when the terminal cannot.
    pub fn set_cursor_visibility(&mut self, show: bool) -> bool {
        let s = if show { self.profile.cursor_visible.clone() } else { self.profile.cursor_invisible.clone() };
        self.emit(s.as_ref())
    }

    /// Write `text` on the status line at `col`.
    pub fn write_to_status_line(&mut self, text: &str, col: i32) -> bool {
        if !self.profile.has_status_line {
            return false;
        }
        let ts = self.profile.to_status.clone();
        if !self.emit_with(ts.as_ref(), &[col]) {
            return false;
        }
        self.out.write(text.as_bytes());
        let fs = self.profile.from_status.clone();
        self.emit(fs.as_ref());
        true
    }

    /// # Errors
    ///
    /// A failed flush.
    pub fn disable_status_line(&mut self) -> Result<()> {
        if self.profile.has_status_line {
            let ds = self.profile.disable_status.clone();
            self.emit(ds.as_ref());
            self.flush()?;
        }
        Ok(())
    }

    /// Turn xterm mouse reporting on or off. Other terminals are left
    /// alone unless `force` is set.
    pub fn set_mouse_mode(&mut self, on: bool, force: bool) -> bool {
        if !force && !self.profile.name.starts_with("xterm") {
            return false;
        }
        self.out.write(if on { b"\x1b[?9h" } else { b"\x1b[?9l" });
        true
    }

    /// 80-column mode on a vt100-like terminal.
    pub fn narrow_width(&mut self) {
        self.out.write(b"\x1b[?3l");
    }

    /// 132-column mode on a vt100-like terminal.
    pub fn wide_width(&mut self) {
        self.out.write(b"\x1b[?3h");
    }

    pub fn enable_cursor_keys(&mut self) {
        if self.profile.family.vt100_like {
            self.out.write(b"\x1b=\x1b[?1l");
        }
    }

    // ── Lifecycle ──

    /// Enter full-screen mode.
    pub fn init_video(&mut self) {
        let (ti, ks, ea) = (self.profile.enter_ca.clone(), self.profile.keypad_on.clone(), self.profile.acs_enable.clone());
        self.emit(ti.as_ref());
        self.emit(ks.as_ref());
        self.reset_scroll_region();
        self.end_insert();
        self.emit(ea.as_ref());
        self.video_initialized = true;
    }

    /// Leave full-screen mode with the cursor on the bottom line.
    ///
    /// # Errors
    ///
    /// A failed flush.
    pub fn reset_video(&mut self) -> Result<()> {
        self.goto_rc(self.last_row(), 0);
        self.cursor = None;
        self.normal_video();
        let me = self.profile.normal.clone();
        self.emit(me.as_ref());
        self.ink = None;
        self.set_charset(false);
        if self.use_ansi {
            let op = self.profile.reset_colors.clone();
            if !self.emit(op.as_ref()) {
                self.write_attributes(Style::default(), false);
            }
            self.ink = None;
        }
        self.erase_line();
        let (ke, te) = (self.profile.keypad_off.clone(), self.profile.exit_ca.clone());
        self.emit(ke.as_ref());
        self.emit(te.as_ref());
        let result = self.flush();
        self.video_initialized = false;
        result
    }

    #[inline]
    #[must_use]
    pub const fn video_initialized(&self) -> bool {
        self.video_initialized
    }

    /// Write out everything buffered. A failure is reported to the message
    /// hook before it is returned.
    ///
    /// # Errors
    ///
    /// [`TermError::Write`] from the device.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().inspect_err(|e| (self.hook)(e))
    }
}

const fn color_arg(i: u8, bgr: bool) -> i32 {
    if bgr && i < 8 { RGB_TO_BGR[i as usize] } else { i as i32 }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
