//! Styled fragments of quire output.
//!
//! Status lines read `<tag>: <text>` so they stay greppable without colors:
//!
//! ```text
//! done: Committed `Generated 14:02` (77c0aa13) in `Rewrite`
//!   Discarded: 2 later version(s)
//! unchanged: Already at the newest version
//! ```
//!
//! Tabs and versions always render as `` `label` (short id) ``; the short id
//! is what `quire switch` and `quire jump` accept as a prefix.

use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style as Paint};
use quire_core::{SessionTab, VersionNode};

/// `--color` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorMode {
    Always,
    Never,
    /// Colors when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
}

impl ColorMode {
    /// Whether output gets ANSI colors. See <https://no-color.org/>.
    pub fn resolve(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}

/// What a status line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A tab or history change went through.
    Done,
    Failed,
    /// The command worked but left something for the user to look at.
    Warning,
    Note,
    /// Next command to try.
    Hint,
    /// Nothing to do: empty draft, boundary of the history, same position.
    Unchanged,
}

impl Status {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Failed => "error",
            Self::Warning => "warning",
            Self::Note => "note",
            Self::Hint => "hint",
            Self::Unchanged => "unchanged",
        }
    }

    fn paint(self) -> Paint {
        match self {
            Self::Done => Paint::new().green(),
            Self::Failed => Paint::new().red().bold(),
            Self::Warning => Paint::new().yellow(),
            Self::Note => Paint::new().blue(),
            Self::Hint => Paint::new().cyan(),
            Self::Unchanged => Paint::new().dimmed(),
        }
    }
}

/// Renders quire's output pieces, colored or plain.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    colors: bool,
}

impl Style {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            colors: mode.resolve(),
        }
    }

    pub fn colors_enabled(&self) -> bool {
        self.colors
    }

    fn paint(&self, text: &str, paint: Paint) -> String {
        if self.colors {
            text.style(paint).to_string()
        } else {
            text.to_string()
        }
    }

    /// `done: Opened tab ...`
    pub fn status(&self, status: Status, text: &str) -> String {
        let tag = format!("{}:", status.tag());
        format!("{} {}", self.paint(&tag, status.paint()), text)
    }

    /// Indented follow-up to a status line.
    pub fn detail(&self, label: &str, value: &str) -> String {
        format!("  {}: {}", label, value)
    }

    pub fn heading(&self, title: &str) -> String {
        self.paint(title, Paint::new().bold())
    }

    /// A failure with the underlying cause and what to check.
    pub fn failure(&self, text: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut lines = vec![self.status(Status::Failed, text)];
        lines.extend(cause.map(|c| self.detail("cause", c)));
        lines.extend(hint.map(|h| self.detail("hint", h)));
        lines.join("\n")
    }

    /// A `quire config show` line.
    pub fn field(&self, key: &str, value: &str) -> String {
        format!("{} {}", self.paint(&format!("{}:", key), Paint::new().dimmed()), value)
    }

    /// First eight characters of an id, enough to use as a reference prefix.
    pub fn id(&self, id: &str) -> String {
        let short: String = id.chars().take(8).collect();
        self.paint(&short, Paint::new().yellow())
    }

    /// `` `Rewrite 2` (a81be004) ``
    pub fn tab(&self, tab: &SessionTab) -> String {
        format!("`{}` ({})", tab.label, self.id(tab.id.as_str()))
    }

    /// `` `Generated 14:02` (77c0aa13) ``
    pub fn version(&self, node: &VersionNode) -> String {
        format!("`{}` ({})", node.label, self.id(node.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{NewVersion, Preset, VersionGraph};

    fn plain() -> Style {
        Style::new(ColorMode::Never)
    }

    #[test]
    fn test_fixed_color_modes() {
        assert!(ColorMode::Always.resolve());
        assert!(!ColorMode::Never.resolve());
        assert!(Style::new(ColorMode::Always).colors_enabled());
    }

    #[test]
    fn test_status_lines_are_plain_without_colors() {
        let style = plain();
        assert_eq!(style.status(Status::Done, "Moved tab"), "done: Moved tab");
        assert_eq!(
            style.status(Status::Unchanged, "Already at the oldest version"),
            "unchanged: Already at the oldest version"
        );
        assert_eq!(style.detail("Ahead", "1 version(s)"), "  Ahead: 1 version(s)");
        assert_eq!(style.field("maxTabs", "3"), "maxTabs: 3");
    }

    #[test]
    fn test_colored_status_keeps_text() {
        let line = Style::new(ColorMode::Always).status(Status::Warning, "Could not save history");
        assert!(line.contains("\u{1b}["));
        assert!(line.ends_with(" Could not save history"));
    }

    #[test]
    fn test_failure_lists_cause_and_hint() {
        let out = plain().failure("Failed to initialize Quire", Some("bad yaml"), Some("fix it"));
        assert_eq!(
            out,
            "error: Failed to initialize Quire\n  cause: bad yaml\n  hint: fix it"
        );
        assert_eq!(plain().failure("Oops", None, None), "error: Oops");
    }

    #[test]
    fn test_tab_and_version_names() {
        let style = plain();
        let tab = SessionTab::new("Rewrite 2", Preset::new("Rewrite", "rewrite"));
        let shown = style.tab(&tab);
        assert!(shown.starts_with("`Rewrite 2` ("));
        assert_eq!(shown.len(), "`Rewrite 2` ()".len() + 8usize.min(tab.id.as_str().len()));

        let graph = VersionGraph::start().append_version(NewVersion::new("text", "Manual"));
        let node = graph.active_node().unwrap();
        assert!(style.version(node).starts_with("`Manual` ("));
        assert_eq!(style.id("0123456789abcdef"), "01234567");
        assert_eq!(style.id("abc"), "abc");
    }
}
