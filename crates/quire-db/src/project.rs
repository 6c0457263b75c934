//! File-backed project and message store.
//!
//! Each project lives in its own directory:
//!
//! ```text
//! projects/<id>/project.json    metadata + last saved version graph
//! projects/<id>/messages.jsonl  append-only message log, one JSON object per line
//! ```
//!
//! Message ids are assigned by the store on append, which is why callers
//! back-fill ids into their in-memory logs after a successful write.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::kv::is_valid_key;

/// Subdirectory of the data directory that holds projects.
pub const PROJECTS_DIR: &str = "projects";

/// Metadata file inside a project directory.
pub const PROJECT_FILENAME: &str = "project.json";

/// Message log inside a project directory.
pub const MESSAGES_FILENAME: &str = "messages.jsonl";

// ============================================================================
// Records
// ============================================================================

/// Project metadata as stored in `project.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    pub title: String,
    pub owner: String,
    #[serde(default)]
    pub preset_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last version graph saved for this project, in whatever shape it was written.
    #[serde(default)]
    pub version_graph: Option<serde_json::Value>,
}

/// A message to append; the store assigns its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message as persisted in `messages.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// What `get` returns for a project.
#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub title: String,
    pub preset_id: Option<String>,
    pub messages: Vec<StoredMessage>,
    pub version_graph: Option<serde_json::Value>,
}

// ============================================================================
// FileProjectStore
// ============================================================================

/// Project store backed by one directory per project.
#[derive(Debug, Clone)]
pub struct FileProjectStore {
    root: PathBuf,
}

impl FileProjectStore {
    /// Open a store rooted at `root`. Directories are created lazily.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the store under `<data_dir>/projects`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join(PROJECTS_DIR))
    }

    /// Directory of project `id`. Ids that are not plain names (path
    /// separators, leading dots) cannot name a project.
    fn project_dir(&self, id: &str) -> DbResult<PathBuf> {
        if !is_valid_key(id) {
            return Err(DbError::ProjectNotFound { id: id.to_string() });
        }
        Ok(self.root.join(id))
    }

    /// Create a new project and return its record.
    pub fn create(
        &self,
        title: &str,
        owner: &str,
        preset_id: Option<&str>,
    ) -> DbResult<ProjectRecord> {
        let now = Utc::now();
        let record = ProjectRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            owner: owner.to_string(),
            preset_id: preset_id.map(str::to_string),
            created_at: now,
            updated_at: now,
            version_graph: None,
        };

        let dir = self.project_dir(&record.id)?;
        fs::create_dir_all(&dir)
            .map_err(|e| DbError::project_io(&dir, format!("Failed to create project: {}", e)))?;
        self.write_record(&record)?;

        debug!("Created project {} ({})", record.id, record.title);
        Ok(record)
    }

    /// Load a project's metadata.
    pub fn record(&self, id: &str) -> DbResult<ProjectRecord> {
        let path = self.project_dir(id)?.join(PROJECT_FILENAME);
        if !path.exists() {
            return Err(DbError::ProjectNotFound { id: id.to_string() });
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| DbError::project_io(&path, format!("Failed to read: {}", e)))?;
        serde_json::from_str(&content).map_err(|e| DbError::project_parse(&path, e.to_string()))
    }

    fn write_record(&self, record: &ProjectRecord) -> DbResult<()> {
        let path = self.project_dir(&record.id)?.join(PROJECT_FILENAME);
        let body = serde_json::to_string_pretty(record)?;
        fs::write(&path, body)
            .map_err(|e| DbError::project_io(&path, format!("Failed to write: {}", e)))
    }

    /// Append messages to a project's log, assigning ids.
    ///
    /// After appending, the log is trimmed to the newest `cap` messages
    /// (`cap == 0` disables trimming). Returns the created messages in input order.
    pub fn append_messages(
        &self,
        project_id: &str,
        messages: &[NewMessage],
        cap: usize,
    ) -> DbResult<Vec<StoredMessage>> {
        let mut record = self.record(project_id)?;
        let path = self.project_dir(project_id)?.join(MESSAGES_FILENAME);

        let created: Vec<StoredMessage> = messages
            .iter()
            .map(|m| StoredMessage {
                id: Uuid::new_v4().to_string(),
                role: m.role.clone(),
                content: m.content.clone(),
                created_at: m.created_at,
            })
            .collect();

        {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| DbError::project_io(&path, format!("Failed to open log: {}", e)))?;
            for message in &created {
                let line = serde_json::to_string(message)?;
                writeln!(file, "{}", line)
                    .map_err(|e| DbError::project_io(&path, format!("Failed to append: {}", e)))?;
            }
            file.flush()
                .map_err(|e| DbError::project_io(&path, format!("Failed to flush log: {}", e)))?;
        }

        if cap > 0 {
            let all = read_messages(&path)?;
            if all.len() > cap {
                let keep = &all[all.len() - cap..];
                write_messages(&path, keep)?;
                debug!(
                    "Trimmed project {} log from {} to {} messages",
                    project_id,
                    all.len(),
                    cap
                );
            }
        }

        record.updated_at = Utc::now();
        self.write_record(&record)?;

        debug!("Appended {} messages to project {}", created.len(), project_id);
        Ok(created)
    }

    /// Load a project with at most `limit` of its newest messages (`0` = all).
    pub fn get(&self, project_id: &str, limit: usize) -> DbResult<ProjectSnapshot> {
        let record = self.record(project_id)?;
        let path = self.project_dir(project_id)?.join(MESSAGES_FILENAME);
        let mut messages = read_messages(&path)?;
        if limit > 0 && messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }

        Ok(ProjectSnapshot {
            title: record.title,
            preset_id: record.preset_id,
            messages,
            version_graph: record.version_graph,
        })
    }

    /// Replace the saved version graph of a project.
    pub fn save_version_graph(&self, project_id: &str, graph: serde_json::Value) -> DbResult<()> {
        let mut record = self.record(project_id)?;
        record.version_graph = Some(graph);
        record.updated_at = Utc::now();
        self.write_record(&record)
    }

    /// List all projects, newest update first. Unreadable entries are skipped.
    pub fn list(&self) -> DbResult<Vec<ProjectRecord>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root)
            .map_err(|e| DbError::project_io(&self.root, format!("Failed to list: {}", e)))?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            match self.record(&id) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping project {}: {}", id, e),
            }
        }

        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }
}

fn read_messages(path: &Path) -> DbResult<Vec<StoredMessage>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| DbError::project_io(path, format!("Failed to open log: {}", e)))?;
    let reader = BufReader::new(file);
    let mut messages = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message = serde_json::from_str(&line).map_err(|e| {
            DbError::project_parse(path, format!("line {}: {}", line_num + 1, e))
        })?;
        messages.push(message);
    }

    Ok(messages)
}

fn write_messages(path: &Path, messages: &[StoredMessage]) -> DbResult<()> {
    let mut file = File::create(path)
        .map_err(|e| DbError::project_io(path, format!("Failed to rewrite log: {}", e)))?;
    for message in messages {
        let line = serde_json::to_string(message)?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}
