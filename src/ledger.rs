//! Persisted record of completed jobs, keyed by content fingerprint.
//!
//! The ledger is a single JSON file rewritten atomically (temp file + rename) under one writer
//! lock, so concurrent workers never interleave writes and a crash never leaves a torn file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::job::Job;
use crate::output_type::OutputType;
use crate::{Error, Result};

/// File name of the ledger inside a batch output directory.
pub const LEDGER_FILE_NAME: &str = ".subtitler-ledger.json";

const LEDGER_VERSION: u32 = 1;

/// Stable hash identifying a job's cacheable identity.
///
/// Covers the input path, its size and modification time, the model and the output format;
/// changing any of them yields a different fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(
        input_path: &Path,
        file_size: u64,
        modified_nanos: u128,
        model_name: &str,
        output_format: OutputType,
    ) -> Self {
        let path = input_path.to_string_lossy();
        let size = file_size.to_string();
        let modified = modified_nanos.to_string();

        let mut hasher = Sha256::new();
        // Length-prefix every field so adjacent values cannot run together.
        for field in [
            path.as_bytes(),
            size.as_bytes(),
            modified.as_bytes(),
            model_name.as_bytes(),
            output_format.extension().as_bytes(),
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Fingerprint a job from the current state of its input file.
    pub fn for_job(job: &Job) -> Result<Self> {
        let meta = fs::metadata(&job.input_path)?;
        let modified_nanos = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Ok(Self::compute(
            &job.input_path,
            meta.len(),
            modified_nanos,
            &job.model_name,
            job.output_format,
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub fingerprint: Fingerprint,
    /// RFC 3339, UTC.
    pub completed_at: String,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    completed_at: String,
    output_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct LedgerFile<'a> {
    version: u32,
    entries: &'a BTreeMap<Fingerprint, StoredEntry>,
}

/// Shared store of completed jobs.
///
/// Reads and writes are serialized behind one mutex. Writes only add or replace entries by
/// fingerprint; nothing is ever removed.
#[derive(Debug)]
pub struct ResumeLedger {
    entries: Mutex<BTreeMap<Fingerprint, StoredEntry>>,
    /// Empty for an in-memory ledger.
    path: PathBuf,
}

impl ResumeLedger {
    /// Load the ledger at `path`.
    ///
    /// A missing file, a document that is not valid JSON, and individual malformed entries all
    /// degrade to cache misses. Only an I/O failure reading an existing file is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => parse_entries(&path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::ledger_io(&path, e)),
        };
        info!(path = %path.display(), entries = entries.len(), "loaded resume ledger");
        Ok(Self {
            entries: Mutex::new(entries),
            path,
        })
    }

    /// An empty ledger that persists to `path` without reading what is there.
    pub fn fresh(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            path: path.into(),
        }
    }

    /// A ledger without persistence.
    pub fn in_memory() -> Self {
        Self::fresh(PathBuf::new())
    }

    pub fn path(&self) -> Option<&Path> {
        (!self.path.as_os_str().is_empty()).then_some(self.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<LedgerEntry>> {
        let entries = self.lock()?;
        Ok(entries.get(fingerprint).map(|stored| LedgerEntry {
            fingerprint: fingerprint.clone(),
            completed_at: stored.completed_at.clone(),
            output_path: stored.output_path.clone(),
        }))
    }

    /// Add or replace `entry` and persist the whole ledger.
    ///
    /// The in-memory entry is kept even if persisting fails.
    pub fn record(&self, entry: LedgerEntry) -> Result<()> {
        let mut entries = self.lock()?;
        entries.insert(
            entry.fingerprint,
            StoredEntry {
                completed_at: entry.completed_at,
                output_path: entry.output_path,
            },
        );
        self.persist(&entries)
    }

    fn persist(&self, entries: &BTreeMap<Fingerprint, StoredEntry>) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }

        let doc = LedgerFile {
            version: LEDGER_VERSION,
            entries,
        };
        let json = serde_json::to_string_pretty(&doc)?;

        let io = |e| Error::ledger_io(&self.path, e);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json).map_err(io)?;
        fs::rename(&temp, &self.path).map_err(io)?;

        debug!(path = %self.path.display(), entries = entries.len(), "saved resume ledger");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<Fingerprint, StoredEntry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::ledger_io(&self.path, std::io::Error::other("ledger lock poisoned")))
    }
}

fn parse_entries(path: &Path, content: &str) -> BTreeMap<Fingerprint, StoredEntry> {
    let doc: serde_json::Value = match serde_json::from_str(content) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable resume ledger");
            return BTreeMap::new();
        }
    };

    let Some(raw) = doc.get("entries").and_then(|e| e.as_object()) else {
        warn!(path = %path.display(), "resume ledger has no entries object; starting empty");
        return BTreeMap::new();
    };

    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        match serde_json::from_value::<StoredEntry>(value.clone()) {
            Ok(stored) => {
                entries.insert(Fingerprint(key.clone()), stored);
            }
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "skipping malformed ledger entry");
            }
        }
    }
    entries
}
