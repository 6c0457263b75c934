//! CLI definition and command dispatch for Quire.
//!
//! This module defines the command-line interface using `clap` and provides
//! the `run()` function that dispatches commands to the engine.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (e.g., `--config`, `--data-dir`, `--verbose`)
//! 2. Environment variables (`QUIRE_CONFIG`, `QUIRE_HOME`, `QUIRE_VERBOSE`)
//! 3. Config file (`<data-dir>/config.yaml` or path from `--config`)
//! 4. Built-in defaults

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;

use crate::ui::{table, ColorMode, Status, Style};

use quire_core::{
    resolve_reference, PresetCatalog, ProjectId, QuireConfig, QuireEngine, QuireError,
    SendOutcome, SessionTab, CONFIG_FILENAME,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Quire – tabbed drafting sessions with linear version history
#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "QUIRE_VERBOSE")]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true, env = "QUIRE_QUIET")]
    pub quiet: bool,

    /// Path to configuration file (default: <data-dir>/config.yaml)
    #[arg(long, global = true, env = "QUIRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory for tabs, projects and presets (default: ~/.quire)
    #[arg(long, global = true, env = "QUIRE_HOME")]
    pub data_dir: Option<PathBuf>,

    /// Color output mode
    #[arg(
        long,
        global = true,
        env = "QUIRE_COLOR",
        value_enum,
        ignore_case = true,
        default_value_t = ColorMode::Auto
    )]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List open tabs
    #[command(after_help = r#"EXAMPLES:
    # Show open tabs; the active one is marked with *
    quire tabs

    # Get tabs as JSON for scripting
    quire tabs --json | jq '.activeTabId'
"#)]
    Tabs {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Open a new tab for a preset and make it active
    #[command(after_help = r#"EXAMPLES:
    # Open a rewrite session
    quire new rewrite

    # Preset names are case-insensitive; ids work too
    quire new Summarize
"#)]
    New {
        /// Preset name or id (see `quire presets`)
        preset: String,
    },

    /// Close a tab (default: the active tab)
    #[command(after_help = r#"EXAMPLES:
    # Close the active tab
    quire close

    # Close the second tab
    quire close 2
"#)]
    Close {
        /// Tab id, unique id prefix, or 1-based position
        tab: Option<String>,
    },

    /// Make a tab active
    #[command(after_help = r#"EXAMPLES:
    # Switch by position
    quire switch 1

    # Switch by id prefix
    quire switch 3f2a
"#)]
    Switch {
        /// Tab id, unique id prefix, or 1-based position
        tab: String,
    },

    /// Move a tab to another position
    #[command(after_help = r#"EXAMPLES:
    # Move the third tab to the front
    quire move 3 1
"#)]
    Move {
        /// Current 1-based position
        from: usize,
        /// New 1-based position
        to: usize,
    },

    /// Replace the active tab's draft
    #[command(after_help = r#"EXAMPLES:
    # Set the draft text
    quire draft "First paragraph of the letter"
"#)]
    Draft {
        /// New draft text
        text: String,
    },

    /// Commit the active tab's draft as a new version
    #[command(after_help = r#"EXAMPLES:
    # Snapshot with a generated label
    quire snapshot

    # Snapshot with a custom label
    quire snapshot --label "Before cuts"
"#)]
    Snapshot {
        /// Version label (default: "Snapshot HH:MM")
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Send the active tab's draft and record the reply as a new version
    #[command(after_help = r#"EXAMPLES:
    # Record a reply produced elsewhere
    quire send --reply "Dear team, ..."

    # Read the reply from stdin
    my-generator < draft.txt | quire send
"#)]
    Send {
        /// Reply text (read from stdin when omitted and stdin is not a terminal)
        #[arg(long)]
        reply: Option<String>,
    },

    /// Step the active tab's history back one version
    Undo,

    /// Step the active tab's history forward one version
    Redo,

    /// Make a version of the active tab current
    #[command(after_help = r#"EXAMPLES:
    # Jump to the second version in `quire history`
    quire jump 2

    # Jump by id prefix
    quire jump 77c0
"#)]
    Jump {
        /// Version id, unique id prefix, or 1-based position
        node: String,
    },

    /// Show the active tab's version history
    #[command(after_help = r#"EXAMPLES:
    # Show history, oldest first; the current version is marked with *
    quire history

    # Output as JSON
    quire history --json
"#)]
    History {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Open a stored project in a tab
    #[command(after_help = r#"EXAMPLES:
    # Open by position in `quire projects`
    quire open 1

    # Open by id prefix
    quire open 9c41
"#)]
    Open {
        /// Project id, unique id prefix, or 1-based position in `quire projects`
        project: String,
    },

    /// List stored projects
    Projects {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List available presets
    Presets,

    /// Close every tab and remove the saved tab state
    Reset,

    /// Configuration management commands
    #[command(after_help = r#"EXAMPLES:
    # Show resolved configuration
    quire config show
"#)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show resolved configuration
    #[command(after_help = r#"EXAMPLES:
    # Show resolved config
    quire config show

    # Output as JSON
    quire config show --json
"#)]
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Output
// ============================================================================

/// Style plus the `--quiet` switch. Errors and requested data always print.
struct Output {
    style: Style,
    quiet: bool,
}

impl Output {
    fn status(&self, status: Status, text: &str) {
        if !self.quiet {
            println!("{}", self.style.status(status, text));
        }
    }

    fn detail(&self, label: &str, value: &str) {
        if !self.quiet {
            println!("{}", self.style.detail(label, value));
        }
    }

    /// A tab's recorded error, such as a history save that did not reach its project.
    fn tab_error(&self, tab: &SessionTab) {
        if let Some(error) = &tab.error {
            eprintln!("{}", self.style.status(Status::Warning, error));
        }
    }
}

// ============================================================================
// Run function
// ============================================================================

/// Run the CLI application.
///
/// Parses command-line arguments, opens a `QuireEngine` over the data
/// directory, and dispatches to the appropriate command handler.
///
/// # Returns
///
/// Returns `ExitCode::SUCCESS` on success, or `ExitCode::FAILURE` on error.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always show (config issues, corrupt state purges);
    // debug only with --verbose.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "quire_core={},quire_db={},quire_cli={}",
        log_level, log_level, log_level
    );

    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let out = Output {
        style: Style::new(cli.color),
        quiet: cli.quiet,
    };

    let mut engine = match open_engine(&cli) {
        Ok(engine) => engine,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check config.yaml in your data directory (default: ~/.quire)".to_string(),
            };
            eprintln!(
                "{}",
                out.style.failure(
                    "Failed to initialize Quire",
                    Some(&format!("{:#}", e)),
                    Some(&hint),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    debug!(command = ?cli.command, "Running command");
    let result = match cli.command {
        Command::Tabs { json } => handle_tabs(&out, &engine, json),
        Command::New { preset } => handle_new(&out, &mut engine, &preset),
        Command::Close { tab } => handle_close(&out, &mut engine, tab.as_deref()),
        Command::Switch { tab } => handle_switch(&out, &mut engine, &tab),
        Command::Move { from, to } => handle_move(&out, &mut engine, from, to),
        Command::Draft { text } => handle_draft(&out, &mut engine, &text),
        Command::Snapshot { label } => handle_snapshot(&out, &mut engine, label.as_deref()),
        Command::Send { reply } => handle_send(&out, &mut engine, reply),
        Command::Undo => handle_step(&out, &mut engine, Step::Undo),
        Command::Redo => handle_step(&out, &mut engine, Step::Redo),
        Command::Jump { node } => handle_jump(&out, &mut engine, &node),
        Command::History { json } => handle_history(&out, &engine, json),
        Command::Open { project } => handle_open(&out, &mut engine, &project),
        Command::Projects { json } => handle_projects(&out, &engine, json),
        Command::Presets => handle_presets(&out, &engine),
        Command::Reset => handle_reset(&out, &mut engine),
        Command::Config { action } => handle_config(&out, &engine, action),
    };

    engine.flush();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", out.style.status(Status::Failed, &e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Resolve the data directory and config path, then open the engine.
fn open_engine(cli: &Cli) -> anyhow::Result<QuireEngine> {
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => QuireConfig::default_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?,
    };
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join(CONFIG_FILENAME));
    debug!(
        data_dir = %data_dir.display(),
        config = %config_path.display(),
        "Opening engine"
    );
    let config = QuireConfig::from_path(&config_path)?;
    QuireEngine::open(config, data_dir)
}

// ============================================================================
// Tab command handlers
// ============================================================================

fn handle_tabs(out: &Output, engine: &QuireEngine, json: bool) -> Result<(), QuireError> {
    let state = engine.manager().state();

    if json {
        let tabs: Vec<_> = state
            .tabs
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "label": t.label,
                    "preset": t.preset.name,
                    "projectId": t.project_id,
                    "draft": t.draft,
                    "versions": t.version_graph.len(),
                    "isDirty": t.is_dirty,
                    "error": t.error,
                })
            })
            .collect();
        let value = json!({ "activeTabId": state.active_tab_id, "tabs": tabs });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if state.is_empty() {
        out.status(Status::Note, "No tabs open");
        out.status(Status::Hint, "Open one with `quire new <preset>`");
        return Ok(());
    }

    let rows: Vec<table::TabRow> = state
        .tabs
        .iter()
        .map(|t| table::TabRow {
            active: state.active_tab_id.as_ref() == Some(&t.id),
            id: t.id.to_string(),
            label: t.label.clone(),
            preset: t.preset.name.clone(),
            versions: t.version_graph.len(),
            dirty: t.is_dirty,
            draft: t.draft.clone(),
        })
        .collect();
    println!("{}", table::render_tabs_table(&rows));

    if let Some(tab) = state.active_tab() {
        if let Some(error) = &tab.error {
            println!();
            println!("{}", out.style.status(Status::Warning, error));
        }
    }
    Ok(())
}

fn handle_new(out: &Output, engine: &mut QuireEngine, preset: &str) -> Result<(), QuireError> {
    let id = engine.create_tab(preset)?;
    let tab = engine.tab(&id)?;
    out.status(Status::Done, &format!("Opened tab {}", out.style.tab(tab)));
    Ok(())
}

fn handle_close(
    out: &Output,
    engine: &mut QuireEngine,
    reference: Option<&str>,
) -> Result<(), QuireError> {
    let id = engine.resolve_tab_or_active(reference)?;
    let label = engine.tab(&id)?.label.clone();
    engine.close_tab(&id);
    out.status(Status::Done, &format!("Closed tab `{}`", label));

    if let Ok(active) = engine.active_tab() {
        out.status(Status::Note, &format!("Active tab: `{}`", active.label));
    }
    Ok(())
}

fn handle_switch(
    out: &Output,
    engine: &mut QuireEngine,
    reference: &str,
) -> Result<(), QuireError> {
    let id = engine.resolve_tab(reference)?;
    engine.switch_tab(&id);
    let tab = engine.tab(&id)?;
    out.status(Status::Done, &format!("Switched to {}", out.style.tab(tab)));
    Ok(())
}

fn handle_move(
    out: &Output,
    engine: &mut QuireEngine,
    from: usize,
    to: usize,
) -> Result<(), QuireError> {
    let len = engine.manager().state().len();
    if from == 0 || to == 0 || from > len || to > len {
        return Err(QuireError::TabNotFound(format!(
            "position {} or {} (1..={} open)",
            from, to, len
        )));
    }
    if from == to {
        out.status(Status::Unchanged, "Tab already at that position");
        return Ok(());
    }
    engine.move_tab(from - 1, to - 1);
    out.status(Status::Done, &format!("Moved tab {} to position {}", from, to));
    Ok(())
}

fn handle_draft(out: &Output, engine: &mut QuireEngine, text: &str) -> Result<(), QuireError> {
    let id = engine.active_tab()?.id.clone();
    engine.update_draft(&id, text)?;
    out.status(
        Status::Done,
        &format!("Draft updated ({} chars)", text.chars().count()),
    );
    Ok(())
}

fn handle_snapshot(
    out: &Output,
    engine: &mut QuireEngine,
    label: Option<&str>,
) -> Result<(), QuireError> {
    let id = engine.active_tab()?.id.clone();
    let pruned = engine.snapshot(&id, label)?;
    report_commit(out, engine.tab(&id)?, pruned);
    Ok(())
}

fn handle_send(
    out: &Output,
    engine: &mut QuireEngine,
    reply: Option<String>,
) -> Result<(), QuireError> {
    let id = engine.active_tab()?.id.clone();
    let reply = match reply {
        Some(text) => text,
        None => read_reply_from_stdin()?,
    };

    match engine.send(&id, move |_draft| Ok(reply)) {
        SendOutcome::Skipped => {
            out.status(Status::Unchanged, "Nothing to send (draft is empty)");
            Ok(())
        }
        SendOutcome::Sent {
            project_id, pruned, ..
        } => {
            report_commit(out, engine.tab(&id)?, pruned);
            out.detail("Project", &out.style.id(project_id.as_str()));
            Ok(())
        }
        SendOutcome::Failed(message) => Err(QuireError::SendFailed(message)),
    }
}

/// Reply text from piped stdin; a terminal or empty input is an error.
fn read_reply_from_stdin() -> Result<String, QuireError> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(QuireError::Generation(
            "no reply given; pass --reply <text> or pipe it on stdin".to_string(),
        ));
    }
    let mut reply = String::new();
    stdin.lock().read_to_string(&mut reply)?;
    debug!(bytes = reply.len(), "Read reply from stdin");
    let reply = reply.trim_end().to_string();
    if reply.is_empty() {
        return Err(QuireError::Generation(
            "no reply given; pass --reply <text> or pipe it on stdin".to_string(),
        ));
    }
    Ok(reply)
}

fn report_commit(out: &Output, tab: &SessionTab, pruned: usize) {
    if let Some(node) = tab.version_graph.active_node() {
        out.status(
            Status::Done,
            &format!("Committed {} in `{}`", out.style.version(node), tab.label),
        );
    }
    if pruned > 0 {
        out.detail("Discarded", &format!("{} later version(s)", pruned));
    }
    out.tab_error(tab);
}

// ============================================================================
// History command handlers
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    Undo,
    Redo,
}

fn handle_step(out: &Output, engine: &mut QuireEngine, step: Step) -> Result<(), QuireError> {
    let id = engine.active_tab()?.id.clone();
    let moved = match step {
        Step::Undo => engine.undo(&id)?,
        Step::Redo => engine.redo(&id)?,
    };

    if !moved {
        let text = match step {
            Step::Undo => "Already at the oldest version",
            Step::Redo => "Already at the newest version",
        };
        out.status(Status::Unchanged, text);
        return Ok(());
    }

    report_active_version(out, engine.tab(&id)?);
    Ok(())
}

fn handle_jump(out: &Output, engine: &mut QuireEngine, reference: &str) -> Result<(), QuireError> {
    let id = engine.active_tab()?.id.clone();
    let node = engine.resolve_node(&id, reference)?;
    engine.jump(&id, &node)?;
    report_active_version(out, engine.tab(&id)?);
    Ok(())
}

fn report_active_version(out: &Output, tab: &SessionTab) {
    let graph = &tab.version_graph;
    if let Some(node) = graph.active_node() {
        out.status(Status::Done, &format!("Now at {}", out.style.version(node)));
    }
    if graph.has_redo() {
        out.detail(
            "Ahead",
            &format!(
                "{} version(s); a new commit discards them",
                graph.versions_ahead()
            ),
        );
    }
    out.tab_error(tab);
}

fn handle_history(out: &Output, engine: &QuireEngine, json: bool) -> Result<(), QuireError> {
    let tab = engine.active_tab()?;
    let graph = &tab.version_graph;
    let versions = graph.versions();

    if json {
        let value = json!({
            "tabId": tab.id,
            "activeId": graph.active_id(),
            "versions": versions,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if !out.quiet {
        println!(
            "{}",
            out.style
                .heading(&format!("HISTORY {} ({})", tab.label, tab.preset.name))
        );
        println!();
    }

    let rows: Vec<table::VersionRow> = versions
        .iter()
        .map(|n| table::VersionRow {
            active: &n.id == graph.active_id(),
            id: n.id.to_string(),
            label: n.label.clone(),
            created_at: n.created_at,
            generated: n.output_message_id.is_some(),
            content: n.content.clone(),
        })
        .collect();
    println!("{}", table::render_history_table(&rows));
    Ok(())
}

// ============================================================================
// Project and catalog handlers
// ============================================================================

fn handle_open(out: &Output, engine: &mut QuireEngine, reference: &str) -> Result<(), QuireError> {
    let projects = engine.messages().list()?;
    let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    let project_id = match resolve_reference(reference, &ids)? {
        Some(index) => ProjectId::new(projects[index].id.clone()),
        None => return Err(QuireError::ProjectNotFound(reference.to_string())),
    };

    let tab_id = engine.open_project(&project_id)?;
    let tab = engine.tab(&tab_id)?;
    out.status(
        Status::Done,
        &format!(
            "Opened project {} in `{}` ({} version(s), {} message(s))",
            out.style.id(project_id.as_str()),
            tab.label,
            tab.version_graph.len(),
            tab.messages.len()
        ),
    );
    Ok(())
}

fn handle_projects(out: &Output, engine: &QuireEngine, json: bool) -> Result<(), QuireError> {
    let projects = engine.messages().list()?;

    if json {
        let value: Vec<_> = projects
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "title": p.title,
                    "owner": p.owner,
                    "presetId": p.preset_id,
                    "updatedAt": p.updated_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if projects.is_empty() {
        out.status(Status::Note, "No projects yet");
        out.status(Status::Hint, "A project is created on the first `quire send`");
        return Ok(());
    }

    let rows: Vec<table::ProjectRow> = projects
        .into_iter()
        .map(|p| table::ProjectRow {
            id: p.id,
            title: p.title,
            preset: p.preset_id,
            updated_at: p.updated_at,
        })
        .collect();
    println!("{}", table::render_projects_table(&rows));
    Ok(())
}

fn handle_presets(out: &Output, engine: &QuireEngine) -> Result<(), QuireError> {
    let rows: Vec<table::PresetRow> = engine
        .presets()
        .presets()?
        .into_iter()
        .map(|p| table::PresetRow {
            name: p.name,
            task_type: p.task_type,
            id: p.id,
        })
        .collect();
    if rows.is_empty() {
        out.status(Status::Warning, "Preset catalog is empty");
        return Ok(());
    }
    println!("{}", table::render_presets_table(&rows));
    Ok(())
}

fn handle_reset(out: &Output, engine: &mut QuireEngine) -> Result<(), QuireError> {
    let count = engine.manager().state().len();
    engine.reset();
    out.status(
        Status::Done,
        &format!("Closed {} tab(s) and cleared saved state", count),
    );
    Ok(())
}

// ============================================================================
// Config command handler
// ============================================================================

fn handle_config(
    out: &Output,
    engine: &QuireEngine,
    action: ConfigAction,
) -> Result<(), QuireError> {
    match action {
        ConfigAction::Show { json } => handle_config_show(out, engine, json),
    }
}

/// Show resolved configuration.
fn handle_config_show(out: &Output, engine: &QuireEngine, json: bool) -> Result<(), QuireError> {
    let config = engine.config();

    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let style = &out.style;
    println!("{}", style.heading("CONFIG"));
    println!();
    println!("  {}", style.field("dataDir", &engine.data_dir().display().to_string()));
    println!("  {}", style.field("maxTabs", &config.max_tabs.to_string()));
    println!("  {}", style.field("storageKey", &config.storage_key));
    println!(
        "  {}",
        style.field(
            "migrationToleranceSecs",
            &config.migration_tolerance_secs.to_string()
        )
    );
    println!("  {}", style.field("autosave", &config.autosave.to_string()));
    println!("  {}", style.field("messageCap", &config.message_cap.to_string()));
    println!("  {}", style.field("historyLimit", &config.history_limit.to_string()));
    println!("  {}", style.field("owner", &config.owner));
    Ok(())
}
