//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `quire tabs` | `render_tabs_table()` |
//! | `quire history` | `render_history_table()` |
//! | `quire presets` | `render_presets_table()` |
//! | `quire projects` | `render_projects_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};

use super::format::{format_relative_time, preview, truncate_str};

/// One open tab.
#[derive(Debug, Clone)]
pub struct TabRow {
    pub active: bool,
    pub id: String,
    pub label: String,
    pub preset: String,
    pub versions: usize,
    pub dirty: bool,
    pub draft: String,
}

/// One version in history order.
#[derive(Debug, Clone)]
pub struct VersionRow {
    pub active: bool,
    pub id: String,
    pub label: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub generated: bool,
    pub content: String,
}

/// One catalog preset.
#[derive(Debug, Clone)]
pub struct PresetRow {
    pub name: String,
    pub task_type: String,
    pub id: Option<String>,
}

/// One stored project.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: String,
    pub title: String,
    pub preset: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table
}

fn short(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Current terminal width, or 80 if it cannot be determined.
fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Width left for a free-text column after `used` columns of fixed content.
fn remaining_width(used: usize) -> usize {
    terminal_width().saturating_sub(used).clamp(16, 80)
}

/// Render open tabs for `quire tabs`.
///
/// # Example Output
///
/// ```text
///    #  ID        LABEL      PRESET    VERS  DRAFT
/// *  1  3f2a91c0  Rewrite    Rewrite      3  Second paragraph, tighter...
///    2  a81be004  Rewrite 2  Rewrite      1  -
/// ```
pub fn render_tabs_table(tabs: &[TabRow]) -> String {
    if tabs.is_empty() {
        return String::new();
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new(""),
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("ID"),
        Cell::new("LABEL"),
        Cell::new("PRESET"),
        Cell::new("VERS").set_alignment(CellAlignment::Right),
        Cell::new("DRAFT"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(1)),
        ColumnConstraint::LowerBoundary(Width::Fixed(2)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(4)),
    ]);

    let draft_width = remaining_width(56);
    for (i, tab) in tabs.iter().enumerate() {
        let marker = if tab.active { "*" } else { "" };
        let mut draft = preview(&tab.draft, draft_width);
        if tab.dirty {
            draft = format!("{} (edited)", draft);
        }
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(short(&tab.id)),
            Cell::new(truncate_str(&tab.label, 20)),
            Cell::new(truncate_str(&tab.preset, 14)),
            Cell::new(tab.versions).set_alignment(CellAlignment::Right),
            Cell::new(draft),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render a tab's history for `quire history`, oldest first.
///
/// # Example Output
///
/// ```text
///    #  ID        LABEL            WHEN        OUT  CONTENT
///    1  0b9d1e22  Start            2h ago           -
/// *  2  77c0aa13  Generated 14:02  just now    yes  Second paragraph...
/// ```
pub fn render_history_table(versions: &[VersionRow]) -> String {
    if versions.is_empty() {
        return String::new();
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new(""),
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("ID"),
        Cell::new("LABEL"),
        Cell::new("WHEN"),
        Cell::new("OUT"),
        Cell::new("CONTENT"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(1)),
        ColumnConstraint::LowerBoundary(Width::Fixed(2)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(10)),
        ColumnConstraint::LowerBoundary(Width::Fixed(10)),
        ColumnConstraint::LowerBoundary(Width::Fixed(3)),
    ]);

    let content_width = remaining_width(60);
    for (i, version) in versions.iter().enumerate() {
        let marker = if version.active { "*" } else { "" };
        let out = if version.generated { "yes" } else { "" };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(short(&version.id)),
            Cell::new(truncate_str(&version.label, 24)),
            Cell::new(format_relative_time(version.created_at)),
            Cell::new(out),
            Cell::new(preview(&version.content, content_width)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render the preset catalog for `quire presets`.
pub fn render_presets_table(presets: &[PresetRow]) -> String {
    if presets.is_empty() {
        return String::new();
    }

    let mut table = new_table();
    table.set_header(vec![Cell::new("NAME"), Cell::new("TASK"), Cell::new("ID")]);
    for preset in presets {
        table.add_row(vec![
            Cell::new(&preset.name),
            Cell::new(&preset.task_type),
            Cell::new(preset.id.as_deref().unwrap_or("-")),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render stored projects for `quire projects`, newest first.
pub fn render_projects_table(projects: &[ProjectRow]) -> String {
    if projects.is_empty() {
        return String::new();
    }

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("TITLE"),
        Cell::new("PRESET"),
        Cell::new("UPDATED"),
    ]);
    table.set_constraints(vec![ColumnConstraint::LowerBoundary(Width::Fixed(8))]);
    for project in projects {
        table.add_row(vec![
            Cell::new(&project.id),
            Cell::new(truncate_str(&project.title, 32)),
            Cell::new(project.preset.as_deref().unwrap_or("-")),
            Cell::new(format_relative_time(project.updated_at)),
        ]);
    }

    table.trim_fmt().to_string()
}
