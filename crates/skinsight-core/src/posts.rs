//! Social posts input: JSON-lines `{timestamp, clean_text}` records.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub clean_text: String,
}

impl Post {
    pub fn new(timestamp: &str, clean_text: &str) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            clean_text: clean_text.to_string(),
        }
    }

    /// Calendar day of the post; `None` when the timestamp is not recognised.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_date(&self.timestamp)
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (optionally with `T`), or a bare `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Reads posts from a JSON-lines file, skipping blank lines.
pub fn read_posts(path: &Path) -> Result<Vec<Post>, PostError> {
    let file = File::open(path).map_err(|e| PostError::Read(path.to_path_buf(), e))?;
    let mut posts = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| PostError::Read(path.to_path_buf(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let post = serde_json::from_str(&line).map_err(|e| PostError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            source: e,
        })?;
        posts.push(post);
    }
    Ok(posts)
}

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{path}:{line}: invalid post: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}
