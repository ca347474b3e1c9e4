//! Flat inner-product vector index keyed by integer id.
//!
//! Vectors are L2-normalized on insert and on query, so the inner product is
//! cosine similarity. Search is exact (every entry is scored).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Id reported in search slots that have no entry behind them.
pub const NO_MATCH: i64 = -1;

const MAGIC: u32 = 0x5849_4B53; // "SKIX"
const VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 8;

#[derive(Debug, Clone)]
struct Entry {
    id: i64,
    vector: Vec<f32>,
}

/// In-memory vector index of fixed dimension. Persisted with [`VectorIndex::save`].
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dim: usize,
    entries: Vec<Entry>,
    ids: HashSet<i64>,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Adds `vectors` under `ids`. All-or-nothing: on error the index is unchanged.
    /// Ids must be new to the index and unique within the batch.
    pub fn add(&mut self, ids: &[i64], vectors: Vec<Vec<f32>>) -> Result<(), IndexError> {
        if ids.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
            });
        }
        let mut batch_ids = HashSet::with_capacity(ids.len());
        for (&id, v) in ids.iter().zip(&vectors) {
            if id < 0 {
                return Err(IndexError::InvalidId(id));
            }
            if self.ids.contains(&id) || !batch_ids.insert(id) {
                return Err(IndexError::DuplicateId(id));
            }
            if v.len() != self.dim {
                return Err(IndexError::Dimension {
                    expected: self.dim,
                    got: v.len(),
                });
            }
        }
        for (&id, v) in ids.iter().zip(vectors) {
            self.entries.push(Entry {
                id,
                vector: normalize(&v),
            });
            self.ids.insert(id);
        }
        Ok(())
    }

    /// Returns exactly `k` `(id, score)` slots, best first. Slots beyond the
    /// number of entries hold `(NO_MATCH, f32::NEG_INFINITY)`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(i64, f32)>, IndexError> {
        if query.len() != self.dim {
            return Err(IndexError::Dimension {
                expected: self.dim,
                got: query.len(),
            });
        }
        let q = normalize(query);
        let mut scored: Vec<(i64, f32)> = self
            .entries
            .iter()
            .map(|e| (e.id, dot(&q, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored.resize(k, (NO_MATCH, f32::NEG_INFINITY));
        Ok(scored)
    }

    /// Writes the index as a little-endian binary file.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let mut buffer = Vec::with_capacity(HEADER_LEN + self.entries.len() * (8 + self.dim * 4));
        buffer.extend_from_slice(&MAGIC.to_le_bytes());
        buffer.extend_from_slice(&VERSION.to_le_bytes());
        buffer.extend_from_slice(&(self.dim as u32).to_le_bytes());
        buffer.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        for e in &self.entries {
            buffer.extend_from_slice(&e.id.to_le_bytes());
            for &val in &e.vector {
                buffer.extend_from_slice(&val.to_le_bytes());
            }
        }
        std::fs::write(path, buffer).map_err(|e| IndexError::Io(path.to_path_buf(), e))
    }

    /// Reads an index written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path).map_err(|e| IndexError::Io(path.to_path_buf(), e))?;
        Self::from_bytes(&bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut reader = Reader { bytes, cursor: 0 };
        if reader.u32()? != MAGIC {
            return Err(IndexError::Corrupt("invalid magic".to_string()));
        }
        let version = reader.u16()?;
        if version != VERSION {
            return Err(IndexError::Corrupt(format!("unsupported version {version}")));
        }
        let dim = reader.u32()? as usize;
        let count = reader.u64()? as usize;
        let expected = dim
            .checked_mul(4)
            .and_then(|row| row.checked_add(8))
            .and_then(|row| row.checked_mul(count))
            .and_then(|body| body.checked_add(HEADER_LEN))
            .ok_or_else(|| IndexError::Corrupt("header overflows".to_string()))?;
        if bytes.len() != expected {
            return Err(IndexError::Corrupt(format!(
                "expected {expected} bytes for {count} vectors of dim {dim}, found {}",
                bytes.len()
            )));
        }

        let mut index = Self::new(dim);
        for _ in 0..count {
            let id = reader.i64()?;
            let mut vector = Vec::with_capacity(dim);
            for _ in 0..dim {
                vector.push(reader.f32()?);
            }
            if !index.ids.insert(id) {
                return Err(IndexError::DuplicateId(id));
            }
            // Stored vectors are already normalized.
            index.entries.push(Entry { id, vector });
        }
        Ok(index)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], IndexError> {
        let end = self.cursor + N;
        let slice = self
            .bytes
            .get(self.cursor..end)
            .ok_or_else(|| IndexError::Corrupt("file too short".to_string()))?;
        self.cursor = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, IndexError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, IndexError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn u64(&mut self) -> Result<u64, IndexError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64, IndexError> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn f32(&mut self) -> Result<f32, IndexError> {
        Ok(f32::from_le_bytes(self.take()?))
    }
}

/// Scales `v` to unit L2 norm. Zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("{ids} ids for {vectors} vectors")]
    LengthMismatch { ids: usize, vectors: usize },
    #[error("vector dimension {got} does not match index dimension {expected}")]
    Dimension { expected: usize, got: usize },
    #[error("id {0} is already in the index")]
    DuplicateId(i64),
    #[error("id {0} is negative")]
    InvalidId(i64),
    #[error("index file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("corrupt index file: {0}")]
    Corrupt(String),
}
