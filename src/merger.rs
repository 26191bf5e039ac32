use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkMergeInfo {
    pub index: usize,
    pub line_count: usize,
    pub char_length: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeInfo {
    pub chunk_count: usize,
    pub total_length: usize,
    pub chunks: Vec<ChunkMergeInfo>,
}

/// Concatenates translated chunks in order, one `\n` between each.
///
/// Chunks are cut on line breaks, so no reflow or overlap handling happens here.
pub fn merge<S: AsRef<str>>(chunk_texts: &[S]) -> String {
    let capacity = chunk_texts.iter().map(|s| s.as_ref().len() + 1).sum();
    let mut out = String::with_capacity(capacity);
    for (i, text) in chunk_texts.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(text.as_ref());
    }
    out
}

/// Same text as [`merge`], plus per-chunk line and length figures.
pub fn merge_with_info<S: AsRef<str>>(chunk_texts: &[S]) -> (String, MergeInfo) {
    let merged = merge(chunk_texts);
    let chunks = chunk_texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let text = text.as_ref();
            ChunkMergeInfo {
                index: i + 1,
                line_count: text.split('\n').count(),
                char_length: text.chars().count(),
            }
        })
        .collect();
    let info = MergeInfo {
        chunk_count: chunk_texts.len(),
        total_length: merged.chars().count(),
        chunks,
    };
    (merged, info)
}
