//! Metadata sidecar: one JSON chunk record per line, keyed by the vector index id.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Product attributes carried alongside every chunk of that product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub problems_solved: Vec<String>,
    #[serde(default)]
    pub category: String,
}

/// One indexed chunk. `id` is the join key into the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: i64,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    pub text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub meta: ChunkMeta,
}

/// Records loaded from a sidecar file, looked up by id.
#[derive(Debug, Default)]
pub struct MetadataStore {
    records: HashMap<i64, ChunkRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON-lines sidecar. Blank lines are skipped; a later record with the same id replaces the earlier one.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let file = File::open(path).map_err(|e| MetadataError::Io(path.to_path_buf(), e))?;
        let mut store = Self::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| MetadataError::Io(path.to_path_buf(), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ChunkRecord = serde_json::from_str(&line).map_err(|e| MetadataError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                source: e,
            })?;
            store.insert(record);
        }
        Ok(store)
    }

    /// Writes `records` as a JSON-lines sidecar, one record per line.
    pub fn write(path: &Path, records: &[ChunkRecord]) -> Result<(), MetadataError> {
        let file = File::create(path).map_err(|e| MetadataError::Io(path.to_path_buf(), e))?;
        let mut out = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut out, record).map_err(MetadataError::Serialize)?;
            out.write_all(b"\n")
                .map_err(|e| MetadataError::Io(path.to_path_buf(), e))?;
        }
        out.flush().map_err(|e| MetadataError::Io(path.to_path_buf(), e))
    }

    pub fn insert(&mut self, record: ChunkRecord) {
        self.records.insert(record.id, record);
    }

    pub fn lookup(&self, id: i64) -> Option<&ChunkRecord> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ChunkRecord> for MetadataStore {
    fn from_iter<I: IntoIterator<Item = ChunkRecord>>(iter: I) -> Self {
        let mut store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("{path}:{line}: invalid metadata record: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to serialize metadata: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str) -> ChunkRecord {
        ChunkRecord {
            id,
            product_id: format!("p{id}"),
            product_name: name.to_string(),
            text: format!("{name} excerpt"),
            source: format!("https://example.com/{id}"),
            meta: ChunkMeta {
                key_ingredients: vec!["urea".into()],
                problems_solved: vec!["dryness".into()],
                category: "body".into(),
            },
        }
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.jsonl");
        let records = vec![record(1, "UreaRepair"), record(2, "Crème Hydratante")];
        MetadataStore::write(&path, &records).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.contains("Crème"));

        let store = MetadataStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup(2), Some(&records[1]));
        assert!(store.lookup(3).is_none());
    }

    #[test]
    fn load_skips_blank_lines_and_defaults_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.jsonl");
        std::fs::write(&path, "\n{\"id\": 4, \"text\": \"hello\"}\n   \n").unwrap();
        let store = MetadataStore::load(&path).unwrap();
        let r = store.lookup(4).unwrap();
        assert_eq!(r.text, "hello");
        assert_eq!(r.meta, ChunkMeta::default());
    }

    #[test]
    fn load_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.jsonl");
        std::fs::write(&path, "{\"id\": 1, \"text\": \"ok\"}\n{oops\n").unwrap();
        assert!(matches!(
            MetadataStore::load(&path),
            Err(MetadataError::Parse { line: 2, .. })
        ));
    }
}
