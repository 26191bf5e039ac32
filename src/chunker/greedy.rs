use super::{chunks_for, preferred_limit, ChunkRange, HARD_LIMIT};

/// Per-chunk goal and the point past which a chunk must be closed.
#[derive(Clone, Copy, Debug)]
struct Budget {
    target: usize,
    threshold: usize,
}

impl Budget {
    fn new(remaining_tokens: usize, remaining_chunks: usize) -> Self {
        let target = remaining_tokens.div_ceil(remaining_chunks.max(1));
        let slack = (target / 10).max(50);
        Self {
            target,
            threshold: (target + slack).min(HARD_LIMIT),
        }
    }
}

/// Single left-to-right pass accumulating lines toward an adaptive target.
///
/// After each chunk the target is recomputed from the remaining tokens and
/// the remaining chunk budget, so later chunks absorb earlier over- or
/// undershoot. Not globally optimal; see [`super::optimal_partition`].
pub fn greedy_partition(line_tokens: &[usize], target_tokens: usize) -> Vec<ChunkRange> {
    let n = line_tokens.len();
    let mut ranges = Vec::new();
    if n == 0 {
        return ranges;
    }

    let total: usize = line_tokens.iter().sum();
    let estimated_chunks = chunks_for(total, preferred_limit(target_tokens));
    let mut budget = Budget::new(total, estimated_chunks);
    let mut remaining = total;
    let mut start = 0usize;

    while start < n {
        let (end, acc) = close_chunk(line_tokens, start, budget);
        ranges.push(ChunkRange {
            start_line: start,
            end_line: end,
            token_total: acc,
        });

        start = end + 1;
        remaining -= acc;
        if remaining > 0 {
            budget = Budget::new(remaining, estimated_chunks.saturating_sub(ranges.len()));
        }
    }

    ranges
}

/// Returns the inclusive end line and token total of the chunk starting at `start`.
fn close_chunk(line_tokens: &[usize], start: usize, budget: Budget) -> (usize, usize) {
    let mut acc = 0usize;
    let mut end = start;

    for (j, &tok) in line_tokens.iter().enumerate().skip(start) {
        if tok > HARD_LIMIT {
            // Oversized lines always travel alone.
            if j == start {
                return (j, tok);
            }
            return (j - 1, acc);
        }

        if acc + tok > budget.threshold {
            if j == start {
                return (j, tok);
            }
            let without = acc;
            let with = acc + tok;
            let closer_without = without.abs_diff(budget.target) <= with.abs_diff(budget.target);
            if closer_without || with > HARD_LIMIT {
                return (j - 1, without);
            }
            return (j, with);
        }

        acc += tok;
        end = j;
    }

    (end, acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::test_support::assert_tiles;

    fn totals(ranges: &[ChunkRange]) -> Vec<usize> {
        ranges.iter().map(|r| r.token_total).collect()
    }

    #[test]
    fn adapts_target_after_each_chunk() {
        let costs = vec![100; 10];
        let ranges = greedy_partition(&costs, 350);
        assert_tiles(&costs, &ranges);
        assert_eq!(totals(&ranges), vec![300, 400, 300]);
    }

    #[test]
    fn small_document_is_one_chunk() {
        let costs = vec![10, 20, 30];
        let ranges = greedy_partition(&costs, 3500);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].token_total, 60);
    }

    #[test]
    fn oversized_line_is_split_off_from_accumulated_lines() {
        let costs = vec![500, 600, 9000, 400];
        let ranges = greedy_partition(&costs, 3500);
        assert_tiles(&costs, &ranges);
        assert!(ranges
            .iter()
            .any(|r| r.start_line == 2 && r.end_line == 2 && r.token_total == 9000));
    }

    #[test]
    fn first_line_over_threshold_stands_alone() {
        // the 7000-token line overshoots the threshold on its own and must not pull in neighbours
        let costs = vec![7000, 10, 10];
        let ranges = greedy_partition(&costs, 3500);
        assert_tiles(&costs, &ranges);
        assert_eq!(ranges[0].end_line, 0);
        assert_eq!(ranges[0].token_total, 7000);
    }

    #[test]
    fn zero_cost_lines_collapse_into_one_chunk() {
        let costs = vec![0; 25];
        let ranges = greedy_partition(&costs, 3500);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end_line, 24);
    }

    #[test]
    fn never_merges_past_hard_limit() {
        let costs = vec![4000, 4000, 4000, 4000];
        let ranges = greedy_partition(&costs, 4000);
        assert_tiles(&costs, &ranges);
        assert!(ranges.iter().all(|r| r.token_total <= HARD_LIMIT));
    }
}
