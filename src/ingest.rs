//! Ingestion: broker master files on disk → normalized rows in the store.
//!
//! A run reads every `*.json` file in a directory (sorted by name), normalizes
//! every record and upserts the result keyed on ticker inside one transaction.
//! Bad files are skipped, bad records are counted, and only a transaction-level
//! failure aborts the run (rolling everything back).
//!
//! Runs are mutually exclusive per [`Ingestor`]. A second concurrent call fails
//! fast with [`IngestError::AlreadyRunning`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use sqlx::error::ErrorKind;
use sqlx::{Acquire, SqlitePool};
use tokio::sync::Mutex;

use crate::db::instruments;
use crate::normalize::normalize_record;
use crate::raw::{parse_master_file, RawRecord};
use crate::types::{InstrumentRecord, SegmentCode};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("an ingestion run is already in progress")]
    AlreadyRunning,
    #[error("failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ingestion transaction failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Why a run left the store untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    DirectoryMissing,
    NoFiles,
    NoRecords,
}

/// Counters for a committed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_read: usize,
    pub files_skipped: usize,
    pub records_parsed: usize,
    pub upserted: usize,
    /// Records rejected by normalization or by a store constraint.
    pub failed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Skipped(SkipReason),
    Completed(IngestReport),
}

/// Runs ingestion against one pool, one run at a time.
pub struct Ingestor {
    pool: SqlitePool,
    running: Mutex<()>,
}

impl Ingestor {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            running: Mutex::new(()),
        }
    }

    /// Ingests every `*.json` file in `dir`.
    pub async fn run(&self, dir: &Path) -> Result<IngestOutcome, IngestError> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| IngestError::AlreadyRunning)?;
        info!("ingestion started dir={}", dir.display());

        let files = match list_master_files(dir).await? {
            Some(files) => files,
            None => {
                warn!("ingestion skipped: directory {} does not exist", dir.display());
                return Ok(IngestOutcome::Skipped(SkipReason::DirectoryMissing));
            }
        };
        if files.is_empty() {
            warn!("ingestion skipped: no .json files in {}", dir.display());
            return Ok(IngestOutcome::Skipped(SkipReason::NoFiles));
        }

        let mut report = IngestReport::default();
        let mut raw_records: Vec<RawRecord> = Vec::new();
        for path in &files {
            match read_master_file(path).await {
                Ok(records) => {
                    info!("read file={} records={}", path.display(), records.len());
                    report.files_read += 1;
                    raw_records.extend(records);
                }
                Err(e) => {
                    warn!("skipping file={}: {}", path.display(), e);
                    report.files_skipped += 1;
                }
            }
        }
        report.records_parsed = raw_records.len();
        if raw_records.is_empty() {
            warn!("ingestion skipped: no records in {} file(s)", files.len());
            return Ok(IngestOutcome::Skipped(SkipReason::NoRecords));
        }

        let mut normalized: Vec<InstrumentRecord> = Vec::with_capacity(raw_records.len());
        for raw in &raw_records {
            match normalize_record(raw) {
                Ok(record) => normalized.push(record),
                Err(e) => {
                    warn!("record rejected ticker={}: {}", raw.label(), e);
                    report.failed += 1;
                }
            }
        }
        log_segment_distribution(&normalized);

        let mut tx = self.pool.begin().await?;
        for record in &normalized {
            let mut savepoint = (&mut tx).begin().await?;
            match instruments::upsert(&mut savepoint, record).await {
                Ok(()) => {
                    savepoint.commit().await?;
                    report.upserted += 1;
                }
                Err(sqlx::Error::Database(e)) if is_record_violation(e.kind()) => {
                    savepoint.rollback().await?;
                    warn!("record failed ticker={}: {}", record.ticker, e);
                    report.failed += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        tx.commit().await?;

        info!(
            "ingestion finished files_read={} files_skipped={} records={} upserted={} failed={}",
            report.files_read,
            report.files_skipped,
            report.records_parsed,
            report.upserted,
            report.failed
        );
        Ok(IngestOutcome::Completed(report))
    }
}

/// Constraint violations reject one record. Any other database error aborts the batch.
fn is_record_violation(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation
    )
}

/// Sorted `*.json` paths in `dir`; `None` when the directory does not exist.
async fn list_master_files(dir: &Path) -> Result<Option<Vec<PathBuf>>, IngestError> {
    let io_err = |source: std::io::Error| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(e)),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json && entry.file_type().await.map_err(io_err)?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(Some(files))
}

#[derive(Debug, thiserror::Error)]
enum FileError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("parse failed: {0}")]
    Parse(#[from] crate::raw::MasterFileError),
}

async fn read_master_file(path: &Path) -> Result<Vec<RawRecord>, FileError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_master_file(&text)?)
}

fn log_segment_distribution(records: &[InstrumentRecord]) {
    let mut by_segment: BTreeMap<SegmentCode, usize> = BTreeMap::new();
    for record in records {
        *by_segment.entry(record.segment_id).or_default() += 1;
    }
    for (segment, count) in &by_segment {
        debug!("segment distribution segment={} records={}", segment.0, count);
    }
    info!(
        "normalized records={} segments={}",
        records.len(),
        by_segment.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect, schema, PoolSettings};

    async fn ingestor(dir: &tempfile::TempDir) -> Ingestor {
        let url = format!("sqlite://{}", dir.path().join("ingest.db").display());
        let pool = connect(&url, &PoolSettings::default()).await.unwrap();
        schema::migrate(&pool).await.unwrap();
        Ingestor::new(pool)
    }

    #[tokio::test]
    async fn missing_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(&dir).await;
        let outcome = ingestor.run(&dir.path().join("nope")).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped(SkipReason::DirectoryMissing));
    }

    #[tokio::test]
    async fn directory_without_json_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(&dir).await;
        let raw = dir.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        std::fs::write(raw.join("notes.txt"), "{}").unwrap();
        let outcome = ingestor.run(&raw).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped(SkipReason::NoFiles));
    }

    #[test]
    fn only_constraint_violations_fail_a_single_record() {
        assert!(is_record_violation(ErrorKind::UniqueViolation));
        assert!(is_record_violation(ErrorKind::ForeignKeyViolation));
        assert!(is_record_violation(ErrorKind::NotNullViolation));
        assert!(is_record_violation(ErrorKind::CheckViolation));
        assert!(!is_record_violation(ErrorKind::Other));
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(&dir).await;
        let _held = ingestor.running.lock().await;
        let err = ingestor.run(dir.path()).await.unwrap_err();
        assert!(matches!(err, IngestError::AlreadyRunning));
    }

    #[tokio::test]
    async fn list_master_files_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.JSON", "c.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.json")).unwrap();
        let files = list_master_files(dir.path()).await.unwrap().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json"]);
    }
}
