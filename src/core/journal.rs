//! Append-only, hash-chained journal of secret lifecycle events.
//!
//! Entries carry fingerprints only. Each entry hashes its canonical JSON
//! and links to the previous entry's hash.

use crate::constants;
use crate::core::file_lock::FileLock;
use crate::core::paths::DeploymentPaths;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    /// Reading the stored secret failed; only ever recorded as a failure.
    Load,
    Generate,
    Converge,
    Rotate,
    Rollback,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Load => "load",
            Event::Generate => "generate",
            Event::Converge => "converge",
            Event::Rotate => "rotate",
            Event::Rollback => "rollback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub event: Event,
    pub actor: String,
    pub host: String,
    pub pid: u32,
    pub secret_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
}

fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

fn detect_host() -> String {
    fs::read_to_string("/etc/hostname")
        .map(|h| h.trim().to_string())
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Record a successful event.
pub fn record(paths: &DeploymentPaths, event: Event, fingerprint: Option<String>) -> Result<()> {
    append(
        paths,
        event,
        fingerprint,
        Outcome {
            success: true,
            error: None,
        },
    )
}

/// Record a failed event with its error message.
pub fn record_failure(paths: &DeploymentPaths, event: Event, error: &str) -> Result<()> {
    append(
        paths,
        event,
        None,
        Outcome {
            success: false,
            error: Some(error.to_string()),
        },
    )
}

fn append(
    paths: &DeploymentPaths,
    event: Event,
    fingerprint: Option<String>,
    outcome: Outcome,
) -> Result<()> {
    let _lock = FileLock::exclusive(&paths.journal_lock)?;
    let prev_hash = last_entry_hash(&paths.journal)?;

    let mut entry = JournalEntry {
        timestamp: Utc::now(),
        event,
        actor: detect_actor(),
        host: detect_host(),
        pid: std::process::id(),
        secret_path: paths.secret_file.display().to_string(),
        fingerprint,
        outcome,
        prev_hash,
        entry_hash: None,
    };
    entry.entry_hash = Some(compute_entry_hash(&entry)?);

    let line = serde_json::to_string(&entry).context("serialize journal entry")?;
    append_line(&paths.journal, &line)?;
    tracing::debug!(event = event.as_str(), journal = %paths.journal.display(), "journal entry written");
    Ok(())
}

/// Hash of the entry's canonical JSON, `entry_hash` excluded.
fn compute_entry_hash(entry: &JournalEntry) -> Result<String> {
    let mut value = serde_json::to_value(entry).context("serialize for hash")?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("entry_hash");
    }
    let canonical = canonicalize(&value);
    let canonical_str = serde_json::to_string(&canonical).context("serialize canonical json")?;
    Ok(format!("{:064x}", Sha256::digest(canonical_str.as_bytes())))
}

/// Recursively sort object keys.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize(&map[k]));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {}", path.display()))?;
    writeln!(file, "{}", line).context("write journal entry")?;
    crate::util::fs::set_permissions(path, constants::JOURNAL_MODE)
}

fn last_entry_hash(path: &Path) -> Result<Option<String>> {
    let entries = read_entries(path)?;
    Ok(entries.last().and_then(|e| e.entry_hash.clone()))
}

fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path).with_context(|| format!("open journal {}", path.display()))?;
    let mut entries = Vec::new();
    let mut malformed = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.context("read journal line")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(_) => malformed += 1,
        }
    }
    if malformed > 0 {
        tracing::warn!(malformed, journal = %path.display(), "malformed journal entries skipped");
    }
    Ok(entries)
}

/// Read the newest `limit` entries (all when `None`).
pub fn read(paths: &DeploymentPaths, limit: Option<usize>) -> Result<Vec<JournalEntry>> {
    let mut entries = read_entries(&paths.journal)?;
    if let Some(limit) = limit {
        if entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
    }
    Ok(entries)
}

/// Check links and hashes. Returns (total, errors).
pub fn verify_chain(paths: &DeploymentPaths) -> Result<(usize, Vec<String>)> {
    let entries = read_entries(&paths.journal)?;
    let mut errors = Vec::new();
    let mut prev: Option<String> = None;

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && entry.prev_hash != prev {
            errors.push(format!("entry {}: prev_hash does not match previous entry", i + 1));
        }
        match &entry.entry_hash {
            Some(stored) => match compute_entry_hash(entry) {
                Ok(computed) if &computed == stored => {}
                Ok(_) => errors.push(format!("entry {}: entry_hash mismatch (tampered?)", i + 1)),
                Err(e) => errors.push(format!("entry {}: cannot compute hash: {}", i + 1, e)),
            },
            None => errors.push(format!("entry {}: missing entry_hash", i + 1)),
        }
        prev = entry.entry_hash.clone();
    }

    Ok((entries.len(), errors))
}
