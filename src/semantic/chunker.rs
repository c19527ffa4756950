//! Fixed-size text chunking with overlap.

/// Split text into overlapping windows of `chunk_size` characters,
/// stepping by `chunk_size - overlap`. Windows are counted in characters
/// so multi-byte text never splits mid-codepoint. Chunks are trimmed and
/// empties dropped.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if chunk_size == 0 {
        return Vec::new();
    }
    // Config validation guarantees overlap < chunk_size; clamp anyway so a
    // direct caller can never loop forever.
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let chars = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars {
        let end = (start + chunk_size).min(chars);
        let piece = text[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end == chars {
            break;
        }
        start += step;
    }
    chunks
}
