// SPDX-License-Identifier: MIT
//
// Configuration read at startup.
//
// `TermConfig` gathers everything the driver needs from the environment:
// the terminal name, where to find its capability entry, the default-color
// hint and the color overrides. It is built through a lookup closure so
// tests can describe an environment without touching the process one.
//
//   TERM                 terminal name
//   TERMINFO, ...        capability search path (see `vs_caps::SearchPath`)
//   VSCREEN_TERMCAP      0/off disables the TERMCAP fallback, force forces it
//   COLORFGBG            default colors, "fg;bg"
//   DEFAULT_COLORS       same, consulted when COLORFGBG is unset
//   COLORTERM            any value forces ANSI colors on
//   COLORTERM_BCE        any value declares background-color erase
//   LINES, COLUMNS       size fallback when the tty cannot be asked
//
// `ScreenOptions` holds the screen engine's knobs, set through builder
// methods.

use vs_caps::SearchPath;

use crate::color::{Named, parse_default_colors};

// ─── TermConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TermConfig {
    pub term: Option<String>,
    pub search: SearchPath,
    pub default_colors: Option<(Named, Named)>,
    pub force_ansi_colors: bool,
    pub force_bce: bool,
    pub lines: Option<u16>,
    pub columns: Option<u16>,
    /// Output rate used for pacing. `None` disables pacing.
    pub baud: Option<u32>,
}

impl TermConfig {
    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read an arbitrary environment.
    ///
    /// ```
    /// use vs_term::config::TermConfig;
    ///
    /// let cfg = TermConfig::from_lookup(|k| match k {
    ///     "TERM" => Some("xterm".into()),
    ///     "COLORTERM" => Some("truecolor".into()),
    ///     _ => None,
    /// });
    /// assert_eq!(cfg.term.as_deref(), Some("xterm"));
    /// assert!(cfg.force_ansi_colors);
    /// ```
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let default_colors = get("COLORFGBG")
            .or_else(|| get("DEFAULT_COLORS"))
            .and_then(|v| {
                let parsed = parse_default_colors(&v);
                if parsed.is_none() {
                    log::warn!("ignoring unparsable default colors {v:?}");
                }
                parsed
            });
        let dim = |k: &str| get(k).and_then(|v| v.trim().parse::<u16>().ok()).filter(|&n| n > 0);
        Self {
            term: get("TERM").filter(|t| !t.is_empty()),
            search: SearchPath::from_lookup(&get),
            default_colors,
            force_ansi_colors: get("COLORTERM").is_some(),
            force_bce: get("COLORTERM_BCE").is_some(),
            lines: dim("LINES"),
            columns: dim("COLUMNS"),
            baud: None,
        }
    }

    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: SearchPath) -> Self {
        self.search = search;
        self
    }

    #[must_use]
    pub const fn with_baud(mut self, baud: u32) -> Self {
        self.baud = Some(baud);
        self
    }
}

// ─── ScreenOptions ──────────────────────────────────────────────────────────

/// What writing a newline does on the virtual screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Newline {
    /// Stop writing the string at the newline.
    #[default]
    Ignored,
    /// Continue at the start of the next row.
    Wrap,
    /// Like `Wrap`, scrolling the virtual screen up at the bottom.
    Scroll,
    /// Show it like any other control byte, as `^J`.
    Printable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenOptions {
    pub tab_width: usize,
    pub newline: Newline,
    /// Treat high-bit bytes as halves of two-cell glyphs.
    pub wide_chars: bool,
    /// Lowest byte shown as itself; bytes from 0x80 below it are shown as
    /// `<XX>`.
    pub display_eight_bit: u8,
    /// Emit the blink attribute (some consoles use it for bright
    /// backgrounds).
    pub blink_mode: bool,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            tab_width: 8,
            newline: Newline::Ignored,
            wide_chars: false,
            display_eight_bit: 160,
            blink_mode: true,
        }
    }
}

impl ScreenOptions {
    #[must_use]
    pub const fn tab_width(mut self, n: usize) -> Self {
        self.tab_width = n;
        self
    }

    #[must_use]
    pub const fn newline(mut self, mode: Newline) -> Self {
        self.newline = mode;
        self
    }

    #[must_use]
    pub const fn wide_chars(mut self, on: bool) -> Self {
        self.wide_chars = on;
        self
    }

    #[must_use]
    pub const fn display_eight_bit(mut self, min: u8) -> Self {
        self.display_eight_bit = min;
        self
    }

    #[must_use]
    pub const fn blink_mode(mut self, on: bool) -> Self {
        self.blink_mode = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;
    use vs_caps::TermcapPolicy;

    fn env(pairs: &[(&str, &str)]) -> TermConfig {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        TermConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment() {
        let cfg = env(&[]);
        assert_eq!(cfg.term, None);
        assert_eq!(cfg.default_colors, None);
        assert!(!cfg.force_ansi_colors);
        assert!(!cfg.force_bce);
        assert_eq!(cfg.lines, None);
    }

    #[test]
    fn empty_term_counts_as_unset() {
        assert_eq!(env(&[("TERM", "")]).term, None);
    }

    #[test]
    fn colorfgbg_wins_over_default_colors() {
        let cfg = env(&[("COLORFGBG", "15;0"), ("DEFAULT_COLORS", "1;2")]);
        assert_eq!(cfg.default_colors, Some((Named::Index(15), Named::Index(0))));
        let cfg = env(&[("DEFAULT_COLORS", "1;2")]);
        assert_eq!(cfg.default_colors, Some((Named::Index(1), Named::Index(2))));
    }

    #[test]
    fn color_overrides() {
        let cfg = env(&[("COLORTERM", ""), ("COLORTERM_BCE", "1")]);
        assert!(cfg.force_ansi_colors);
        assert!(cfg.force_bce);
    }

    #[test]
    fn size_hints_must_be_positive_numbers() {
        let cfg = env(&[("LINES", "50"), ("COLUMNS", "0")]);
        assert_eq!(cfg.lines, Some(50));
        assert_eq!(cfg.columns, None);
        assert_eq!(env(&[("LINES", "tall")]).lines, None);
    }

    #[test]
    fn search_path_sees_the_same_environment() {
        let cfg = env(&[("TERMINFO", "/opt/ti"), ("VSCREEN_TERMCAP", "off")]);
        assert_eq!(cfg.search.dirs()[0], std::path::PathBuf::from("/opt/ti"));
        assert_eq!(cfg.search.policy(), TermcapPolicy::Never);
    }

    #[test]
    fn screen_option_builders() {
        let o = ScreenOptions::default().tab_width(4).newline(Newline::Scroll).wide_chars(true);
        assert_eq!(o.tab_width, 4);
        assert_eq!(o.newline, Newline::Scroll);
        assert!(o.wide_chars);
        assert_eq!(o.display_eight_bit, 160);
    }
}
