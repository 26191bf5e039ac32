mod config;
mod trace;
mod translator;

pub use config::{init_default_config, ConfigOverrides, PipelineConfig, API_KEY_ENV, CONFIG_ENV};
pub use trace::TraceWriter;
pub use translator::{
    ChunkTranslation, EmptyChunkPolicy, RawTranslation, SegmentTranslator, TranslationOptions,
    TranslationOutput, TranslatorPipeline, Usage,
};
