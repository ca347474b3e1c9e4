//! Product catalog input: JSON-lines product pages, turned into numbered document chunks.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::chunks::{chunk_text, ChunkError};
use crate::metadata::{ChunkMeta, ChunkRecord};

/// A scraped product page, as it appears in the input file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Product {
    /// Either a string or a number in the scraped data.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub problems_solved: Vec<String>,
    #[serde(default)]
    pub category: String,
}

impl Product {
    /// Stable product key: `id`, else `product_name`, else `fallback`.
    fn product_id(&self, fallback: impl FnOnce() -> String) -> String {
        let from_id = match &self.id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        from_id
            .or_else(|| Some(self.product_name.clone()).filter(|s| !s.is_empty()))
            .unwrap_or_else(fallback)
    }

    /// Body to index: the full text, or the short description when there is none.
    fn body(&self) -> &str {
        if self.text.is_empty() {
            &self.short_description
        } else {
            &self.text
        }
    }

    fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            key_ingredients: self.key_ingredients.clone(),
            problems_solved: self.problems_solved.clone(),
            category: self.category.clone(),
        }
    }
}

/// Reads products from a JSON-lines file, skipping blank lines.
pub fn read_products(path: &Path) -> Result<Vec<Product>, ProductError> {
    let file = File::open(path).map_err(|e| ProductError::Read(path.to_path_buf(), e))?;
    let mut products = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ProductError::Read(path.to_path_buf(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        let product = serde_json::from_str(&line).map_err(|e| ProductError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            source: e,
        })?;
        products.push(product);
    }
    Ok(products)
}

/// Chunks every product body and numbers the chunks 1..=N in input order.
/// Products with no text produce no chunks and consume no ids.
pub fn chunk_products(
    products: &[Product],
    size: usize,
    overlap: usize,
) -> Result<Vec<ChunkRecord>, ProductError> {
    let mut records = Vec::new();
    let mut next_id: i64 = 1;
    for product in products {
        let product_id = product.product_id(|| format!("prod_{next_id}"));
        let chunks = chunk_text(product.body(), size, overlap)?;
        for text in chunks {
            records.push(ChunkRecord {
                id: next_id,
                product_id: product_id.clone(),
                product_name: product.product_name.clone(),
                text,
                source: product.source.clone(),
                meta: product.meta(),
            });
            next_id += 1;
        }
    }
    Ok(records)
}

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{path}:{line}: invalid product record: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Product {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn ids_are_monotonic_across_products() {
        let products = vec![
            parse(r#"{"id": "urea-5", "product_name": "UreaRepair", "text": "aaaaaaaaaaaa"}"#),
            parse(r#"{"product_name": "Empty"}"#),
            parse(r#"{"id": 42, "short_description": "short one", "category": "face"}"#),
        ];
        let records = chunk_products(&products, 8, 2).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(records[..2].iter().all(|r| r.product_id == "urea-5"));
        assert_eq!(records[2].product_id, "42");
        assert_eq!(records[2].text, "short on");
        assert_eq!(records[2].meta.category, "face");
    }

    #[test]
    fn product_id_falls_back() {
        let named = parse(r#"{"product_name": "Lotion", "text": "x"}"#);
        assert_eq!(named.product_id(|| "unused".into()), "Lotion");
        let anon = parse(r#"{"id": "", "text": "x"}"#);
        assert_eq!(anon.product_id(|| "prod_9".into()), "prod_9");
    }

    #[test]
    fn read_products_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.jsonl");
        std::fs::write(
            &path,
            "{\"product_name\": \"A\", \"text\": \"alpha\"}\n\n{\"product_name\": \"B\", \"key_ingredients\": [\"urea\"]}\n",
        )
        .unwrap();
        let products = read_products(&path).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].key_ingredients, vec!["urea".to_string()]);
    }

    #[test]
    fn read_products_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.jsonl");
        std::fs::write(&path, "{\"text\": \"ok\"}\nnot json\n").unwrap();
        assert!(matches!(
            read_products(&path),
            Err(ProductError::Parse { line: 2, .. })
        ));
    }
}
