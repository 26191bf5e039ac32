use thiserror::Error;

use crate::chunker::ChunkRange;

/// Opaque failure from a translation backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A chunk could not be turned into translated text.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation failed for {range}")]
    Remote {
        range: ChunkRange,
        #[source]
        source: BoxError,
    },

    #[error("response for {range} held only glossary/domain echo")]
    ExtractionEmpty { range: ChunkRange },

    #[error("worker translating {range} panicked")]
    WorkerPanicked { range: ChunkRange },
}

impl TranslateError {
    pub fn range(&self) -> ChunkRange {
        match self {
            Self::Remote { range, .. }
            | Self::ExtractionEmpty { range }
            | Self::WorkerPanicked { range } => *range,
        }
    }
}
