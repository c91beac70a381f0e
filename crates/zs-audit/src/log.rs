// log.rs — Append-only JSONL audit log.
//
// One JSON object per line. Each event carries the SHA-256 of the previous
// line in `previous_hash`, so inserting, removing or editing a line breaks
// the chain and `verify_chain` reports where.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::hasher;

pub struct AuditLog {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Hash of the last line written, for the next event's `previous_hash`.
    last_hash: Option<String>,
}

impl AuditLog {
    /// Open (or create) a log, recovering the chain head from existing lines.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        }

        let last_hash = if path.exists() {
            Self::read_last_hash(&path)?
        } else {
            None
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            last_hash,
        })
    }

    /// Link `event` to the chain, write it as one line and flush.
    pub fn append(&mut self, event: &mut AuditEvent) -> Result<(), AuditError> {
        event.previous_hash = self.last_hash.clone();
        let json = serde_json::to_string(event)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        self.last_hash = Some(hasher::hash_str(&json));
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_reader(path: &Path) -> Result<BufReader<File>, AuditError> {
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(BufReader::new(file))
    }

    /// All events, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        let mut events = Vec::new();
        for line in Self::open_reader(path.as_ref())?.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    /// The last `count` events, oldest first.
    pub fn tail(path: impl AsRef<Path>, count: usize) -> Result<Vec<AuditEvent>, AuditError> {
        let mut window: VecDeque<String> = VecDeque::with_capacity(count);
        for line in Self::open_reader(path.as_ref())?.lines() {
            let line = line?;
            if line.trim().is_empty() || count == 0 {
                continue;
            }
            if window.len() == count {
                window.pop_front();
            }
            window.push_back(line);
        }
        window
            .iter()
            .map(|line| serde_json::from_str(line).map_err(AuditError::from))
            .collect()
    }

    /// Check every link of the chain. Returns the number of events verified.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let mut previous_hash: Option<String> = None;
        let mut verified = 0;

        for (line_num, line) in Self::open_reader(path.as_ref())?.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: AuditEvent = serde_json::from_str(&line)?;
            if event.previous_hash != previous_hash {
                return Err(AuditError::IntegrityViolation {
                    line: line_num + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: event.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            // Hash the raw line; re-serializing could reorder fields.
            previous_hash = Some(hasher::hash_str(&line));
            verified += 1;
        }

        Ok(verified)
    }

    fn read_last_hash(path: &Path) -> Result<Option<String>, AuditError> {
        let mut last_line: Option<String> = None;
        for line in Self::open_reader(path)?.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last_line = Some(line);
            }
        }
        Ok(last_line.map(|line| hasher::hash_str(&line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditOutcome;
    use tempfile::tempdir;

    fn event(operation: &str) -> AuditEvent {
        AuditEvent::new("alice", "c1", operation, AuditOutcome::Success)
    }

    #[test]
    fn chain_survives_reopen() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join(".audit/audit.jsonl");

        {
            let mut log = AuditLog::open(&log_path).unwrap();
            log.append(&mut event("storage_write")).unwrap();
            log.append(&mut event("storage_read")).unwrap();
        }
        {
            let mut log = AuditLog::open(&log_path).unwrap();
            log.append(&mut event("storage_delete")).unwrap();
        }

        assert_eq!(AuditLog::verify_chain(&log_path).unwrap(), 3);
        let events = AuditLog::read_all(&log_path).unwrap();
        assert!(events[0].previous_hash.is_none());
        assert!(events[2].previous_hash.is_some());
    }

    #[test]
    fn tampering_is_detected() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");
        {
            let mut log = AuditLog::open(&log_path).unwrap();
            for op in ["a", "b", "c"] {
                log.append(&mut event(op)).unwrap();
            }
        }

        let original = fs::read_to_string(&log_path).unwrap();
        let edited = original.replacen("\"operation\":\"b\"", "\"operation\":\"x\"", 1);
        assert_ne!(original, edited);
        fs::write(&log_path, edited).unwrap();

        match AuditLog::verify_chain(&log_path) {
            Err(AuditError::IntegrityViolation { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected IntegrityViolation, got {:?}", other),
        }
    }

    #[test]
    fn tail_returns_latest_events() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");
        {
            let mut log = AuditLog::open(&log_path).unwrap();
            for op in ["a", "b", "c", "d"] {
                log.append(&mut event(op)).unwrap();
            }
        }
        let ops: Vec<String> = AuditLog::tail(&log_path, 2)
            .unwrap()
            .into_iter()
            .map(|e| e.operation)
            .collect();
        assert_eq!(ops, vec!["c", "d"]);
        assert!(AuditLog::tail(&log_path, 0).unwrap().is_empty());
    }
}
