use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::tokens::TokenCounter;

mod greedy;
mod optimal;

pub use greedy::greedy_partition;
pub use optimal::optimal_partition;

/// Default soft target per chunk when none is configured.
pub const DEFAULT_TARGET_TOKENS: usize = 3500;

/// Upper bound on the soft per-chunk target, whatever the configured target.
pub const PREFERRED_LIMIT_CAP: usize = 4000;

/// A chunk may only exceed this when a single line alone does.
pub const HARD_LIMIT: usize = 8000;

pub fn preferred_limit(target_tokens: usize) -> usize {
    target_tokens.clamp(1, PREFERRED_LIMIT_CAP)
}

/// Number of chunks needed to keep `total` near `limit` per chunk (at least one).
pub(crate) fn chunks_for(total: usize, limit: usize) -> usize {
    total.div_ceil(limit.max(1)).max(1)
}

/// Contiguous, inclusive span of 0-based line indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    pub start_line: usize,
    pub end_line: usize,
    pub token_total: usize,
}

impl ChunkRange {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lines {}-{}", self.start_line + 1, self.end_line + 1)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartitionStrategy {
    Greedy,
    #[default]
    Optimal,
}

impl PartitionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greedy => "greedy",
            Self::Optimal => "dp",
        }
    }
}

impl FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(Self::Greedy),
            "dp" | "optimal" => Ok(Self::Optimal),
            other => Err(format!("unknown partition strategy: {other}")),
        }
    }
}

/// Splits per-line token costs into contiguous chunk ranges.
pub fn partition(
    line_tokens: &[usize],
    target_tokens: usize,
    strategy: PartitionStrategy,
) -> Vec<ChunkRange> {
    match strategy {
        PartitionStrategy::Greedy => greedy_partition(line_tokens, target_tokens),
        PartitionStrategy::Optimal => optimal_partition(line_tokens, target_tokens),
    }
}

/// Chunk text plus the range it was cut from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub range: ChunkRange,
}

impl Chunk {
    pub fn start_line(&self) -> usize {
        self.range.start_line
    }

    pub fn end_line(&self) -> usize {
        self.range.end_line
    }
}

/// Human-readable chunk description (1-based indices).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    pub index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub line_count: usize,
    pub tokens: usize,
    pub text: String,
}

/// Joins the lines of each range with `\n`.
///
/// Panics if a range points past the end of `lines`.
pub fn materialize(lines: &[&str], ranges: &[ChunkRange]) -> Vec<Chunk> {
    ranges
        .iter()
        .map(|r| Chunk {
            text: lines[r.start_line..=r.end_line].join("\n"),
            range: *r,
        })
        .collect()
}

/// Splits on every Unicode line boundary, not just `\n` and `\r\n`: a lone
/// `\r`, vertical tab, form feed, the C1/file separators, U+2028 and U+2029
/// all end a line. A trailing break does not add an empty last line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

pub struct TextChunker<C> {
    target_tokens: usize,
    counter: C,
    strategy: PartitionStrategy,
}

impl<C: TokenCounter> TextChunker<C> {
    pub fn new(counter: C) -> Self {
        Self {
            target_tokens: DEFAULT_TARGET_TOKENS,
            counter,
            strategy: PartitionStrategy::default(),
        }
    }

    pub fn with_target_tokens(mut self, target_tokens: usize) -> Self {
        self.target_tokens = target_tokens;
        self
    }

    pub fn with_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn target_tokens(&self) -> usize {
        self.target_tokens
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    pub fn split_text(&self, text: &str) -> Vec<ChunkRange> {
        let lines = split_lines(text);
        self.partition_lines(&lines)
    }

    fn partition_lines(&self, lines: &[&str]) -> Vec<ChunkRange> {
        if lines.is_empty() {
            return vec![];
        }
        let line_tokens = self.counter.count_lines(lines);
        let ranges = partition(&line_tokens, self.target_tokens, self.strategy);
        tracing::debug!(
            lines = lines.len(),
            tokens = line_tokens.iter().sum::<usize>(),
            chunks = ranges.len(),
            strategy = self.strategy.as_str(),
            "partitioned document"
        );
        ranges
    }

    pub fn get_chunks(&self, text: &str) -> Vec<Chunk> {
        let lines = split_lines(text);
        let ranges = self.partition_lines(&lines);
        materialize(&lines, &ranges)
    }

    pub fn get_chunk_info(&self, text: &str) -> Vec<ChunkInfo> {
        self.get_chunks(text)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| ChunkInfo {
                index: i + 1,
                start_line: chunk.range.start_line + 1,
                end_line: chunk.range.end_line + 1,
                line_count: chunk.range.line_count(),
                tokens: chunk.range.token_total,
                text: chunk.text,
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::ChunkRange;

    /// Panics unless `ranges` tile `0..costs.len()` in order with correct totals.
    pub fn assert_tiles(costs: &[usize], ranges: &[ChunkRange]) {
        if costs.is_empty() {
            assert!(ranges.is_empty());
            return;
        }
        let mut next = 0usize;
        for r in ranges {
            assert_eq!(r.start_line, next, "gap or overlap at {r:?}");
            assert!(r.start_line <= r.end_line, "inverted range {r:?}");
            let sum: usize = costs[r.start_line..=r.end_line].iter().sum();
            assert_eq!(r.token_total, sum, "bad total for {r:?}");
            next = r.end_line + 1;
        }
        assert_eq!(next, costs.len(), "lines left uncovered");
    }

    pub fn max_total(ranges: &[ChunkRange]) -> usize {
        ranges.iter().map(|r| r.token_total).max().unwrap_or(0)
    }
}
