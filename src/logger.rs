//! Decision logger - durable record of every accepted recognition
//!
//! Records are keyed by a content-derived id. The JSONL file under the data
//! directory is append-only; the keyed view is rebuilt by replaying it, so a
//! re-logged id replaces the earlier entry instead of duplicating it.

use crate::catalog::CommandId;
use crate::error::LoggerError;
use crate::language::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = "decisions.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub id: String,
    pub text: String,
    pub command_matched: String,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub language: String,
    pub response_time_ms: f64,
    pub user_id: String,
}

impl TrainingRecord {
    /// New record stamped with the current time
    pub fn new(
        text: &str,
        command: CommandId,
        confidence: f32,
        language: Language,
        source: &str,
        response_time_ms: f64,
        user_id: &str,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: record_id(text, command.as_str(), &timestamp),
            text: text.to_string(),
            command_matched: command.to_string(),
            confidence,
            timestamp,
            source: source.to_string(),
            language: language.code().to_string(),
            response_time_ms,
            user_id: user_id.to_string(),
        }
    }
}

/// First 16 hex chars of SHA-256 over text, command and timestamp
fn record_id(text: &str, command: &str, timestamp: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(command.as_bytes());
    hasher.update(timestamp.to_rfc3339().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

// ============================================================================
// Storage
// ============================================================================

/// Keyed record storage behind the decision logger
pub trait RecordStore: Send {
    /// Insert or replace the record with the same id
    fn upsert(&mut self, record: &TrainingRecord) -> Result<(), LoggerError>;
    fn records(&self) -> Vec<&TrainingRecord>;
    fn size_bytes(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, TrainingRecord>,
}

impl RecordStore for MemoryStore {
    fn upsert(&mut self, record: &TrainingRecord) -> Result<(), LoggerError> {
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn records(&self) -> Vec<&TrainingRecord> {
        self.records.values().collect()
    }

    fn size_bytes(&self) -> u64 {
        0
    }
}

/// Append-only JSONL file plus an in-memory index keyed by record id
pub struct JsonlStore {
    path: PathBuf,
    file: File,
    index: BTreeMap<String, TrainingRecord>,
}

impl JsonlStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LoggerError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE_NAME);
        let index = if path.exists() { replay(&path)? } else { BTreeMap::new() };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!("Opened decision log {} ({} records)", path.display(), index.len());
        Ok(Self { path, file, index })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Rebuild the keyed view; a torn final line is skipped, corruption elsewhere is an error
fn replay(path: &Path) -> Result<BTreeMap<String, TrainingRecord>, LoggerError> {
    let reader = BufReader::new(File::open(path)?);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    let last = lines.len().saturating_sub(1);
    let mut index = BTreeMap::new();

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TrainingRecord>(line) {
            Ok(record) => {
                index.insert(record.id.clone(), record);
            }
            Err(e) if i == last => {
                tracing::warn!("Skipping incomplete last record in {}: {}", path.display(), e);
            }
            Err(e) => {
                return Err(LoggerError::Corrupt {
                    line: i + 1,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(index)
}

impl RecordStore for JsonlStore {
    fn upsert(&mut self, record: &TrainingRecord) -> Result<(), LoggerError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.index.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn records(&self) -> Vec<&TrainingRecord> {
        self.index.values().collect()
    }

    fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

// ============================================================================
// Statistics & export
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl Summary {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut minimum = f64::INFINITY;
        let mut maximum = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            minimum = minimum.min(v);
            maximum = maximum.max(v);
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            average: sum / count as f64,
            minimum,
            maximum,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_entries: usize,
    pub storage_size_bytes: u64,
    pub by_command: BTreeMap<String, usize>,
    pub by_language: BTreeMap<String, usize>,
    pub confidence: Summary,
    pub response_time_ms: Summary,
}

impl Statistics {
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Decision log: {} entries, {:.2} MB\n",
            self.total_entries,
            self.storage_size_bytes as f64 / (1024.0 * 1024.0)
        );
        for (lang, count) in &self.by_language {
            out.push_str(&format!("  {}: {} entries\n", lang, count));
        }
        out.push_str(&format!(
            "  confidence avg={:.2} min={:.2} max={:.2}\n",
            self.confidence.average, self.confidence.minimum, self.confidence.maximum
        ));
        out.push_str(&format!(
            "  response avg={:.1}ms min={:.1}ms max={:.1}ms\n",
            self.response_time_ms.average, self.response_time_ms.minimum, self.response_time_ms.maximum
        ));
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub training_examples: Vec<TrainingExample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub total_examples: usize,
    pub confidence_threshold: f32,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub label: String,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub language: String,
    pub response_time_ms: f64,
}

impl From<&TrainingRecord> for TrainingExample {
    fn from(record: &TrainingRecord) -> Self {
        Self {
            text: record.text.clone(),
            label: record.command_matched.clone(),
            confidence: record.confidence,
            timestamp: record.timestamp,
            source: record.source.clone(),
            language: record.language.clone(),
            response_time_ms: record.response_time_ms,
        }
    }
}

// ============================================================================
// Logger
// ============================================================================

pub struct DecisionLogger {
    store: Box<dyn RecordStore>,
}

impl DecisionLogger {
    pub fn new(store: Box<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Durable logger writing under `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LoggerError> {
        Ok(Self::new(Box::new(JsonlStore::open(dir)?)))
    }

    pub fn in_memory() -> Self {
        Self::new(Box::<MemoryStore>::default())
    }

    pub fn log(&mut self, record: &TrainingRecord) -> Result<(), LoggerError> {
        self.store.upsert(record)
    }

    pub fn statistics(&self) -> Statistics {
        let records = self.store.records();
        let mut by_command = BTreeMap::new();
        let mut by_language = BTreeMap::new();
        for record in &records {
            *by_command.entry(record.command_matched.clone()).or_insert(0) += 1;
            *by_language.entry(record.language.clone()).or_insert(0) += 1;
        }

        Statistics {
            total_entries: records.len(),
            storage_size_bytes: self.store.size_bytes(),
            by_command,
            by_language,
            confidence: Summary::of(records.iter().map(|r| r.confidence as f64)),
            response_time_ms: Summary::of(records.iter().map(|r| r.response_time_ms)),
        }
    }

    /// Records at or above `threshold`, newest first
    pub fn export(&self, threshold: f32) -> ExportDocument {
        let mut selected: Vec<&TrainingRecord> = self
            .store
            .records()
            .into_iter()
            .filter(|r| r.confidence >= threshold)
            .collect();
        selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

        let training_examples: Vec<TrainingExample> =
            selected.into_iter().map(TrainingExample::from).collect();

        ExportDocument {
            metadata: ExportMetadata {
                exported_at: Utc::now(),
                total_examples: training_examples.len(),
                confidence_threshold: threshold,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            training_examples,
        }
    }

    /// Export and write the document as pretty JSON
    pub fn export_to(&self, path: impl AsRef<Path>, threshold: f32) -> Result<ExportDocument, LoggerError> {
        let path = path.as_ref();
        let document = self.export(threshold);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(path, json)?;
        tracing::info!(
            "Exported {} examples to {}",
            document.metadata.total_examples,
            path.display()
        );
        Ok(document)
    }
}
