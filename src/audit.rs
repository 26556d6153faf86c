//! Immutable operation journal.
//!
//! Records every facade operation that reached the onion. The log is
//! append-only and never holds plaintext, ciphertext or key material.
//! Facades forward each record to pluggable sinks, such as files or other
//! stores, once the operation has released the facade.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::status::Outcome;

/// A sink that receives audit records.
pub trait AuditSink: Send {
    /// Append a record. Called for every journaled operation.
    fn append(&mut self, record: AuditRecord);
}

/// What the caller asked the facade to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Poke,
    PokeDestructive,
    Peek,
}

/// A permanent record of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Label of the facade that ran the operation.
    pub label: String,
    pub operation: Operation,
    pub outcome: Outcome,
    /// Onion length after the operation.
    pub depth: usize,
    pub timestamp: DateTime<Utc>,
}

/// An append-only log of operations.
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new record. Existing records are never touched.
    pub fn append(&mut self, record: AuditRecord) {
        self.records.push(record);
    }

    /// Number of records journaled so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been journaled yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, AuditRecord> {
        self.records.iter()
    }
}

// ---------------------------------------------------------------------------
// Built-in sink: file
// ---------------------------------------------------------------------------

/// Writes audit records as JSON lines (one per record) to a file.
/// Creates the file if it doesn't exist; appends if it does.
pub struct FileAuditSink {
    file: std::fs::File,
}

impl FileAuditSink {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&mut self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(e) = writeln!(self.file, "{line}").and_then(|()| self.file.flush()) {
                    warn!(error = %e, "audit sink write failed");
                }
            }
            Err(e) => warn!(error = %e, "audit record not serialisable"),
        }
    }
}
