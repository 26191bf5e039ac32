use thiserror::Error;
use tiktoken_rs::CoreBPE;

pub const DEFAULT_ENCODING: &str = "cl100k_base";

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("unknown tokenizer encoding: {0}")]
    UnknownEncoding(String),

    #[error("failed to load tokenizer encoding {name}: {message}")]
    Load { name: String, message: String },
}

/// Maps one line of text to its token cost.
///
/// Implementations must be deterministic: the same line always costs the
/// same for a given counter.
pub trait TokenCounter: Send + Sync {
    fn count(&self, line: &str) -> usize;

    fn count_lines(&self, lines: &[&str]) -> Vec<usize> {
        lines.iter().map(|line| self.count(line)).collect()
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for &T {
    fn count(&self, line: &str) -> usize {
        (**self).count(line)
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for Box<T> {
    fn count(&self, line: &str) -> usize {
        (**self).count(line)
    }
}

/// BPE token counter backed by a tiktoken vocabulary.
pub struct TiktokenCounter {
    name: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new(encoding: &str) -> Result<Self, TokenizerError> {
        let name = encoding.trim().to_ascii_lowercase();
        let loaded = match name.as_str() {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "p50k_edit" => tiktoken_rs::p50k_edit(),
            "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
            _ => return Err(TokenizerError::UnknownEncoding(encoding.to_string())),
        };
        let bpe = loaded.map_err(|e| TokenizerError::Load {
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { name, bpe })
    }

    pub fn cl100k() -> Result<Self, TokenizerError> {
        Self::new(DEFAULT_ENCODING)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("name", &self.name)
            .finish()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, line: &str) -> usize {
        // `<|endoftext|>` and friends in user text are counted as plain text.
        self.bpe.encode_ordinary(line).len()
    }
}

/// Vocabulary-free estimate: one token per four characters, rounded up.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharEstimateCounter;

impl TokenCounter for CharEstimateCounter {
    fn count(&self, line: &str) -> usize {
        line.chars().count().div_ceil(4)
    }
}
