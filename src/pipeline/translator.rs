use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::chunker::{Chunk, ChunkRange, TextChunker};
use crate::error::{BoxError, TranslateError};
use crate::merger::{merge_with_info, MergeInfo};
use crate::progress::{ChunkEvent, ProgressSink, SilentProgress};
use crate::sanitize::sanitize;
use crate::terminology::TermPair;
use crate::textutil::post_process_translation;
use crate::tokens::TokenCounter;

use super::trace::TraceWriter;
use super::PipelineConfig;

/// Per-request options, serialised as the provider's `translation_options`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TranslationOptions {
    pub source_lang: String,
    pub target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<TermPair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tm_list: Vec<TermPair>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

impl Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), Add::add)
    }
}

/// Unprocessed response for one segment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTranslation {
    pub text: String,
    pub usage: Usage,
}

/// The remote translate call. Implementations own retries and rate limiting.
pub trait SegmentTranslator: Send + Sync {
    fn translate_segment(
        &self,
        text: &str,
        options: &TranslationOptions,
    ) -> Result<RawTranslation, BoxError>;
}

impl<T: SegmentTranslator + ?Sized> SegmentTranslator for &T {
    fn translate_segment(
        &self,
        text: &str,
        options: &TranslationOptions,
    ) -> Result<RawTranslation, BoxError> {
        (**self).translate_segment(text, options)
    }
}

impl<T: SegmentTranslator + ?Sized> SegmentTranslator for Box<T> {
    fn translate_segment(
        &self,
        text: &str,
        options: &TranslationOptions,
    ) -> Result<RawTranslation, BoxError> {
        (**self).translate_segment(text, options)
    }
}

/// What to do with a chunk whose response was nothing but echo artifacts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyChunkPolicy {
    /// Keep the chunk as empty text and log a warning.
    #[default]
    Keep,
    Fail,
}

impl EmptyChunkPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Fail => "fail",
        }
    }
}

impl FromStr for EmptyChunkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown empty chunk policy: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkTranslation {
    pub range: ChunkRange,
    pub text: String,
    pub usage: Usage,
    /// The response was all artifacts and `text` was left empty.
    pub extraction_empty: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationOutput {
    pub text: String,
    pub usage: Usage,
    pub merge_info: MergeInfo,
}

impl Default for TranslationOutput {
    fn default() -> Self {
        Self {
            text: String::new(),
            usage: Usage::default(),
            merge_info: MergeInfo {
                chunk_count: 0,
                total_length: 0,
                chunks: Vec::new(),
            },
        }
    }
}

pub struct TranslatorPipeline<C, T> {
    options: TranslationOptions,
    chunker: TextChunker<C>,
    translator: T,
    workers: usize,
    empty_chunk_policy: EmptyChunkPolicy,
    trace: Option<TraceWriter>,
    progress: Box<dyn ProgressSink>,
}

impl<C: TokenCounter, T: SegmentTranslator> TranslatorPipeline<C, T> {
    pub fn new(cfg: &PipelineConfig, chunker: TextChunker<C>, translator: T) -> anyhow::Result<Self> {
        let trace = match cfg.trace_dir.as_ref() {
            Some(dir) => Some(TraceWriter::new(dir.clone())?),
            None => None,
        };
        tracing::debug!(
            workers = cfg.workers,
            empty_chunk_policy = cfg.empty_chunk_policy.as_str(),
            trace = trace.is_some(),
            "pipeline ready"
        );
        Ok(Self {
            options: cfg.translation_options(),
            chunker,
            translator,
            workers: cfg.workers.max(1),
            empty_chunk_policy: cfg.empty_chunk_policy,
            trace,
            progress: Box::new(SilentProgress),
        })
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &TranslationOptions {
        &self.options
    }

    pub fn chunker(&self) -> &TextChunker<C> {
        &self.chunker
    }

    /// Translates a whole document: chunk, translate, clean, merge, normalise.
    ///
    /// A blank document yields empty output without any remote call. The
    /// first failed chunk aborts the document and no further chunks are
    /// sent; use [`Self::translate_chunks`] to keep partial results instead.
    pub fn translate_text(&self, text: &str) -> Result<TranslationOutput, TranslateError> {
        if text.trim().is_empty() {
            return Ok(TranslationOutput::default());
        }

        let chunks = self.chunker.get_chunks(text);
        let lines = chunks.last().map_or(0, |c| c.end_line() + 1);
        self.progress.on_event(&ChunkEvent::Planned {
            chunks: chunks.len(),
            lines,
        });

        let mut texts = Vec::with_capacity(chunks.len());
        let mut usage = Usage::default();
        // skipped chunks only ever follow a failed one
        for result in self.run_chunks(&chunks, true).into_iter().flatten() {
            let chunk = result?;
            usage += chunk.usage;
            texts.push(chunk.text);
        }

        let (merged, merge_info) = merge_with_info(&texts);
        let text = post_process_translation(&merged, &self.options.target_lang);
        self.progress.on_event(&ChunkEvent::Merged {
            chunks: merge_info.chunk_count,
            chars: merge_info.total_length,
        });

        Ok(TranslationOutput {
            text,
            usage,
            merge_info,
        })
    }

    /// Translates and cleans each chunk; results come back in chunk order.
    ///
    /// Every chunk is attempted, whatever happens to the others.
    pub fn translate_chunks(&self, chunks: &[Chunk]) -> Vec<Result<ChunkTranslation, TranslateError>> {
        self.run_chunks(chunks, false).into_iter().flatten().collect()
    }

    /// Runs chunks through the translator, in order or on the worker pool.
    ///
    /// With `stop_on_error`, no chunk is started once one has failed; the
    /// chunks never started come back as `None`.
    fn run_chunks(
        &self,
        chunks: &[Chunk],
        stop_on_error: bool,
    ) -> Vec<Option<Result<ChunkTranslation, TranslateError>>> {
        let total = chunks.len();
        let done = AtomicUsize::new(0);
        let run = |chunk: &Chunk| {
            let result = self.translate_chunk(chunk);
            match &result {
                Ok(_) => self.progress.on_event(&ChunkEvent::Translated {
                    done: done.fetch_add(1, Ordering::Relaxed) + 1,
                    total,
                    range: chunk.range,
                }),
                Err(e) => self.progress.on_event(&ChunkEvent::Failed {
                    range: chunk.range,
                    message: e.to_string(),
                }),
            }
            result
        };

        let workers = self.workers.min(total);
        if workers <= 1 {
            let mut results = Vec::with_capacity(total);
            for chunk in chunks {
                let result = run(chunk);
                let failed = result.is_err();
                results.push(Some(result));
                if failed && stop_on_error {
                    break;
                }
            }
            results.resize_with(total, || None);
            return results;
        }

        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let slots: Mutex<Vec<Option<Result<ChunkTranslation, TranslateError>>>> =
            Mutex::new((0..total).map(|_| None).collect());

        std::thread::scope(|scope| {
            let (run, next, stop, slots) = (&run, &next, &stop, &slots);
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || loop {
                        if stop.load(Ordering::Acquire) {
                            break;
                        }
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        if i >= total {
                            break;
                        }
                        let result = run(&chunks[i]);
                        if stop_on_error && result.is_err() {
                            stop.store(true, Ordering::Release);
                        }
                        slots.lock().unwrap_or_else(PoisonError::into_inner)[i] = Some(result);
                    })
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    tracing::error!("translation worker panicked");
                }
            }
        });

        // indices below this were handed to a worker; an empty slot there means it panicked
        let claimed = next.into_inner().min(total);
        slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .zip(chunks)
            .enumerate()
            .map(|(i, (slot, chunk))| match slot {
                None if i < claimed => Some(Err(TranslateError::WorkerPanicked { range: chunk.range })),
                slot => slot,
            })
            .collect()
    }

    fn translate_chunk(&self, chunk: &Chunk) -> Result<ChunkTranslation, TranslateError> {
        let range = chunk.range;
        let raw = self
            .translator
            .translate_segment(&chunk.text, &self.options)
            .map_err(|source| TranslateError::Remote { range, source })?;
        tracing::debug!(
            %range,
            chars = raw.text.chars().count(),
            total_tokens = raw.usage.total_tokens,
            "received chunk response"
        );
        self.trace_chunk(range, "raw", &raw.text);

        let (text, extraction_empty) = match sanitize(&raw.text, self.options.domains.as_deref()) {
            Ok(text) => (text, false),
            Err(e) => match self.empty_chunk_policy {
                EmptyChunkPolicy::Fail => return Err(TranslateError::ExtractionEmpty { range }),
                EmptyChunkPolicy::Keep => {
                    tracing::warn!(
                        %range,
                        skipped_lines = e.skipped_lines,
                        "response held no translation, keeping chunk empty"
                    );
                    (String::new(), true)
                }
            },
        };
        self.trace_chunk(range, "clean", &text);

        Ok(ChunkTranslation {
            range,
            text,
            usage: raw.usage,
            extraction_empty,
        })
    }

    fn trace_chunk(&self, range: ChunkRange, kind: &str, text: &str) {
        if let Some(trace) = self.trace.as_ref() {
            if let Err(e) = trace.write_chunk_text(range, kind, text) {
                tracing::warn!(error = %format!("{e:#}"), "trace write failed");
            }
        }
    }
}
