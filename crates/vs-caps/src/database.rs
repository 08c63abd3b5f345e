// SPDX-License-Identifier: MIT
//
// The loaded capability database for one terminal.
//
// A `Database` comes from one of three places: a compiled terminfo file,
// an inline termcap entry in the environment, or the small built-in vtxxx
// table used when a well-known terminal family has no entry installed.
// Whatever the source, the same three queries answer by capability code:
// `flag`, `number` and `string`. Sentinels were already decoded by the
// readers, so every lookup is a plain table access.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::code::{self, Code, Section};
use crate::compiled::{self, Compiled};
use crate::error::{CapsError, Result};
use crate::termcap;

// ─── Values ─────────────────────────────────────────────────────────────────

/// A boolean capability. Cancelled entries behave as absent for lookups but
/// are kept distinct for callers that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flag {
    #[default]
    Absent,
    Present,
    Cancelled,
}

impl Flag {
    #[inline]
    #[must_use]
    pub const fn is_set(self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Where a database was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Compiled(PathBuf),
    Termcap,
    Builtin,
}

#[derive(Debug, Clone)]
enum Entries {
    /// Positional, as stored in a compiled file.
    Indexed(Compiled),
    /// Keyed by code, as parsed from termcap text or built in.
    Keyed(termcap::Entry),
}

// ─── Database ───────────────────────────────────────────────────────────────

const VT100_BASE: &[(Code, &[u8])] = &[
    (crate::code!("me"), b"\x1b[m"),
    (crate::code!("cs"), b"\x1b[%i%d;%dr"),
    (crate::code!("cl"), b"\x1b[2J\x1b[H"),
    (crate::code!("mr"), b"\x1b[7m"),
    (crate::code!("md"), b"\x1b[1m"),
    (crate::code!("mb"), b"\x1b[5m"),
    (crate::code!("us"), b"\x1b[4m"),
    (crate::code!("ce"), b"\x1b[K"),
    (crate::code!("cb"), b"\x1b[1K"),
    (crate::code!("sr"), b"\x1bM"),
    (crate::code!("RI"), b"\x1b[%dC"),
    (crate::code!("cm"), b"\x1b[%i%d;%dH"),
    (crate::code!("up"), b"\x1b[A"),
];

const VT102_EXTRA: &[(Code, &[u8])] = &[
    (crate::code!("im"), b"\x1b[4h"),
    (crate::code!("ei"), b"\x1b[4l"),
    (crate::code!("dc"), b"\x1b[P"),
    (crate::code!("DL"), b"\x1b[%dM"),
    (crate::code!("AL"), b"\x1b[%dL"),
];

/// Capability lookups for one terminal.
#[derive(Debug, Clone)]
pub struct Database {
    origin: Origin,
    entries: Entries,
}

impl Database {
    /// Decode a compiled terminfo file already read into memory.
    ///
    /// # Errors
    ///
    /// Propagates [`compiled::decode`] failures.
    pub fn from_compiled(path: &Path, bytes: &[u8]) -> Result<Self> {
        let c = compiled::decode(path, bytes)?;
        Ok(Self { origin: Origin::Compiled(path.to_path_buf()), entries: Entries::Indexed(c) })
    }

    /// Parse an inline termcap entry. `None` when the text is not usable.
    #[must_use]
    pub fn from_termcap(text: &str) -> Option<Self> {
        termcap::parse(text).map(|e| Self { origin: Origin::Termcap, entries: Entries::Keyed(e) })
    }

    /// The built-in description of the vt100 / vt102 family.
    ///
    /// A plain vt100 has no line insert/delete and no insert mode.
    #[must_use]
    pub fn vtxxx(vt100_only: bool) -> Self {
        let extra: &[(Code, &[u8])] = if vt100_only { &[] } else { VT102_EXTRA };
        let mut entry = termcap::Entry {
            names: vec![if vt100_only { "vt100" } else { "vt102" }.to_owned()],
            ..termcap::Entry::default()
        };
        for (c, s) in VT100_BASE.iter().chain(extra) {
            entry.strings.insert(*c, Some(Box::from(*s)));
        }
        entry.flags.insert(crate::code!("am"), Flag::Present);
        Self { origin: Origin::Builtin, entries: Entries::Keyed(entry) }
    }

    /// Locate and load the entry for `name` using `search`.
    ///
    /// # Errors
    ///
    /// [`CapsError::InvalidName`], [`CapsError::NotFound`], or a decode
    /// error from the first file found.
    pub fn load(name: &str, search: &SearchPath) -> Result<Self> {
        search.load(name)
    }

    /// Where the entry came from.
    #[must_use]
    pub const fn origin(&self) -> &Origin {
        &self.origin
    }

    /// All names of the terminal, primary first.
    #[must_use]
    pub fn names(&self) -> &[String] {
        match &self.entries {
            Entries::Indexed(c) => &c.names,
            Entries::Keyed(e) => &e.names,
        }
    }

    /// Tri-state value of a boolean capability.
    #[must_use]
    pub fn flag(&self, code: Code) -> Flag {
        match &self.entries {
            Entries::Indexed(c) => code::ordinal(Section::Flag, code)
                .and_then(|i| c.flags.get(i).copied())
                .unwrap_or_default(),
            Entries::Keyed(e) => e.flags.get(&code).copied().unwrap_or_default(),
        }
    }

    /// Whether a boolean capability is present.
    #[must_use]
    pub fn has_flag(&self, code: Code) -> bool {
        self.flag(code).is_set()
    }

    /// A numeric capability, `None` when absent or cancelled.
    #[must_use]
    pub fn number(&self, code: Code) -> Option<i32> {
        match &self.entries {
            Entries::Indexed(c) => {
                code::ordinal(Section::Number, code).and_then(|i| c.numbers.get(i).copied().flatten())
            }
            Entries::Keyed(e) => e.numbers.get(&code).copied().flatten(),
        }
    }

    /// A string capability exactly as stored, padding included.
    #[must_use]
    pub fn string(&self, code: Code) -> Option<&[u8]> {
        match &self.entries {
            Entries::Indexed(c) => code::ordinal(Section::String, code)
                .and_then(|i| c.strings.get(i))
                .and_then(|s| s.as_deref()),
            Entries::Keyed(e) => e.strings.get(&code).and_then(|s| s.as_deref()),
        }
    }

    /// A string capability ready to send: delay padding removed.
    ///
    /// `ac` is returned untouched since its pairs are data, not a sequence.
    #[must_use]
    pub fn sequence(&self, code: Code) -> Option<Cow<'_, [u8]>> {
        let raw = self.string(code)?;
        if code == crate::code!("ac") {
            return Some(Cow::Borrowed(raw));
        }
        strip_padding(raw)
    }
}

/// Remove termcap and terminfo delay padding from a capability string.
///
/// Leading termcap delays (`50`, `3.5*`) and every terminfo `$<..>` block
/// are dropped. An AIX-style leading `@` or an empty result means absent.
#[must_use]
pub fn strip_padding(raw: &[u8]) -> Option<Cow<'_, [u8]>> {
    if raw.first() == Some(&b'@') {
        return None;
    }
    let mut start = raw.iter().position(|&b| !(b.is_ascii_digit() || b == b'.')).unwrap_or(raw.len());
    if raw.get(start) == Some(&b'*') {
        start += 1;
    }
    let s = &raw[start..];
    let out: Cow<'_, [u8]> = if s.windows(2).any(|w| w == b"$<") {
        let mut v = Vec::with_capacity(s.len());
        let mut i = 0;
        while i < s.len() {
            if s[i] == b'$' && s.get(i + 1) == Some(&b'<') {
                if let Some(close) = s[i..].iter().position(|&b| b == b'>') {
                    i += close + 1;
                    continue;
                }
            }
            v.push(s[i]);
            i += 1;
        }
        Cow::Owned(v)
    } else {
        Cow::Borrowed(s)
    };
    (!out.is_empty()).then_some(out)
}

// ─── Search path ────────────────────────────────────────────────────────────

/// Whether the inline `TERMCAP` entry may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermcapPolicy {
    /// Never consult `TERMCAP`.
    Never,
    /// Use it when usable, except for xterm-like names whose `TERMCAP` is
    /// known to be unreliable.
    #[default]
    Allow,
    /// Use it whenever it is usable.
    Force,
}

impl TermcapPolicy {
    /// Parse a user override: `0`/`off`/`no` → never, `force` → force,
    /// anything else → allow.
    #[must_use]
    pub fn from_setting(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "off" | "no" | "never" => Self::Never,
            "force" | "always" => Self::Force,
            _ => Self::Allow,
        }
    }
}

/// Where to look for capability entries.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
    termcap: Option<String>,
    policy: TermcapPolicy,
}

/// Fixed system locations, searched after the user's own.
const SYSTEM_DIRS: &[&str] = &[
    "/usr/share/terminfo",
    "/usr/lib/terminfo",
    "/usr/share/lib/terminfo",
    "/etc/terminfo",
    "/usr/local/lib/terminfo",
    "/lib/terminfo",
];

impl SearchPath {
    /// Build from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Reads `HOME`, `TERMINFO`, `TERMINFO_DIRS`, `TERMCAP` and the
    /// `VSCREEN_TERMCAP` override.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut dirs = Vec::new();
        if let Some(home) = get("HOME").filter(|h| !h.is_empty()) {
            dirs.push(Path::new(&home).join(".terminfo"));
        }
        if let Some(ti) = get("TERMINFO").filter(|t| !t.is_empty()) {
            dirs.push(PathBuf::from(ti));
        }
        if let Some(list) = get("TERMINFO_DIRS") {
            dirs.extend(list.split(':').filter(|d| !d.is_empty()).map(PathBuf::from));
        }
        dirs.extend(SYSTEM_DIRS.iter().map(PathBuf::from));
        Self {
            dirs,
            termcap: get("TERMCAP"),
            policy: get("VSCREEN_TERMCAP").map(|s| TermcapPolicy::from_setting(&s)).unwrap_or_default(),
        }
    }

    /// Search only `dirs`, with no termcap fallback.
    #[must_use]
    pub fn with_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs, termcap: None, policy: TermcapPolicy::Never }
    }

    /// Use `entry` as the inline termcap text.
    #[must_use]
    pub fn with_termcap(mut self, entry: impl Into<String>, policy: TermcapPolicy) -> Self {
        self.termcap = Some(entry.into());
        self.policy = policy;
        self
    }

    /// Directories in search order.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    #[must_use]
    pub const fn policy(&self) -> TermcapPolicy {
        self.policy
    }

    /// Candidate files for `name` in search order.
    #[must_use]
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let Some(first) = name.bytes().next() else { return Vec::new() };
        let letter = char::from(first).to_string();
        let hex = format!("{first:02x}");
        self.dirs
            .iter()
            .flat_map(|d| [d.join(&letter).join(name), d.join(&hex).join(name)])
            .collect()
    }

    fn termcap_for(&self, name: &str) -> Option<Database> {
        let text = self.termcap.as_deref()?;
        let usable = match self.policy {
            TermcapPolicy::Never => false,
            TermcapPolicy::Allow => !name.starts_with("xterm"),
            TermcapPolicy::Force => true,
        };
        if !usable {
            return None;
        }
        Database::from_termcap(text)
    }

    fn load(&self, name: &str) -> Result<Database> {
        if name.is_empty() || name.contains('/') || name.starts_with('.') {
            return Err(CapsError::InvalidName(name.to_owned()));
        }
        if let Some(db) = self.termcap_for(name) {
            log::debug!("{name}: using TERMCAP entry");
            return Ok(db);
        }
        for path in self.candidates(name) {
            match fs::read(&path) {
                Ok(bytes) => {
                    log::debug!("{name}: loading {}", path.display());
                    return Database::from_compiled(&path, &bytes);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => {}
                Err(e) => {
                    log::warn!("{}: {e}", path.display());
                }
            }
        }
        Err(CapsError::NotFound(name.to_owned()))
    }
}
