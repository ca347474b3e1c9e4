//! Splits document text into overlapping fixed-size windows for embedding.
//! Sizes are counted in characters, not bytes, so multi-byte text never splits mid-char.

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default overlap between consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 400;

/// Splits `text` into windows of `size` chars, each starting `size - overlap` chars after the last.
/// Windows are trimmed; windows that trim to nothing are dropped.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    if size == 0 {
        return Err(ChunkError::ZeroSize);
    }
    if overlap >= size {
        return Err(ChunkError::OverlapTooLarge { size, overlap });
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + size).min(len);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end >= len {
            break;
        }
        start = end - overlap;
    }
    Ok(chunks)
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("overlap {overlap} must be smaller than chunk size {size}")]
    OverlapTooLarge { size: usize, overlap: usize },
}
