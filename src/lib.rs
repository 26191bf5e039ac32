pub mod chunker;
pub mod client;
pub mod config;
pub mod error;
pub mod merger;
pub mod pipeline;
pub mod progress;
pub mod sanitize;
pub mod terminology;
pub mod textutil;
pub mod tokens;

pub use chunker::{Chunk, ChunkInfo, ChunkRange, PartitionStrategy, TextChunker};
pub use error::{BoxError, TranslateError};
pub use pipeline::{PipelineConfig, SegmentTranslator, TranslationOptions, TranslatorPipeline, Usage};
pub use tokens::{CharEstimateCounter, TiktokenCounter, TokenCounter};
