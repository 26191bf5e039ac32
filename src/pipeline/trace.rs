use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::chunker::ChunkRange;

/// Writes per-chunk responses to a directory for offline inspection.
pub struct TraceWriter {
    dir: PathBuf,
}

impl TraceWriter {
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create trace dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `kind` is `raw` or `clean`; line numbers in the name are 1-based.
    pub fn write_chunk_text(&self, range: ChunkRange, kind: &str, text: &str) -> anyhow::Result<()> {
        let path = self.dir.join(chunk_file_name(range, kind));
        std::fs::write(&path, text).with_context(|| format!("write trace: {}", path.display()))?;
        Ok(())
    }
}

fn chunk_file_name(range: ChunkRange, kind: &str) -> String {
    format!(
        "chunk_{:06}-{:06}.{kind}.txt",
        range.start_line + 1,
        range.end_line + 1
    )
}
