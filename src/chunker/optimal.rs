use std::ops::Range;

use super::{chunks_for, preferred_limit, ChunkRange, HARD_LIMIT};

/// Min-max linear partition over line boundaries.
///
/// Lines costing more than [`HARD_LIMIT`] become singleton chunks and split
/// the document into independent runs. Each run starts from the chunk count
/// suggested by the preferred limit (never below what the hard limit
/// demands) and adds chunks until its largest one fits under the hard
/// limit, or every line is its own chunk.
///
/// A single DP over the whole document could never bring an oversized line
/// under the hard limit, so its retry would climb to one chunk per line.
/// Splitting at those lines keeps the same largest chunk with far fewer
/// chunks.
pub fn optimal_partition(line_tokens: &[usize], target_tokens: usize) -> Vec<ChunkRange> {
    let preferred = preferred_limit(target_tokens);
    let mut ranges = Vec::new();
    let mut run_start = 0usize;

    for (i, &tokens) in line_tokens.iter().enumerate() {
        if tokens > HARD_LIMIT {
            partition_run(line_tokens, run_start..i, preferred, &mut ranges);
            ranges.push(ChunkRange {
                start_line: i,
                end_line: i,
                token_total: tokens,
            });
            run_start = i + 1;
        }
    }
    partition_run(line_tokens, run_start..line_tokens.len(), preferred, &mut ranges);

    ranges
}

fn partition_run(
    line_tokens: &[usize],
    lines: Range<usize>,
    preferred: usize,
    out: &mut Vec<ChunkRange>,
) {
    let n = lines.len();
    if n == 0 {
        return;
    }

    let prefix = prefix_sums(&line_tokens[lines.clone()]);
    let total = prefix[n];
    let estimated = chunks_for(total, preferred);
    let floor = chunks_for(total, HARD_LIMIT);

    let mut k = estimated.max(floor).min(n);
    let ranges = loop {
        let (worst, ranges) = solve(&prefix, k);
        if worst <= HARD_LIMIT || k >= n {
            break ranges;
        }
        tracing::debug!(k, worst, "largest chunk over hard limit, adding a chunk");
        k += 1;
    };

    out.extend(ranges.into_iter().map(|r| ChunkRange {
        start_line: r.start_line + lines.start,
        end_line: r.end_line + lines.start,
        token_total: r.token_total,
    }));
}

fn prefix_sums(line_tokens: &[usize]) -> Vec<usize> {
    let mut prefix = Vec::with_capacity(line_tokens.len() + 1);
    prefix.push(0);
    let mut acc = 0usize;
    for &t in line_tokens {
        acc += t;
        prefix.push(acc);
    }
    prefix
}

/// Row-major `(line_count + 1) x (parts + 1)` table.
struct Table {
    cols: usize,
    cells: Vec<usize>,
}

impl Table {
    fn new(rows: usize, cols: usize, fill: usize) -> Self {
        Self {
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> usize {
        self.cells[i * self.cols + j]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, v: usize) {
        self.cells[i * self.cols + j] = v;
    }
}

/// Splits all lines into exactly `k` parts (`1 <= k <= n`) minimising the
/// largest part. Returns that largest sum and the parts in line order.
fn solve(prefix: &[usize], k: usize) -> (usize, Vec<ChunkRange>) {
    let n = prefix.len() - 1;
    // best(i, j): smallest achievable largest part for the first i lines in j parts
    let mut best = Table::new(n + 1, k + 1, usize::MAX);
    // split(i, j): line count covered by the first j - 1 parts in that optimum
    let mut split = Table::new(n + 1, k + 1, 0);

    for i in 1..=n {
        best.set(i, 1, prefix[i]);
    }

    for j in 2..=k {
        for i in j..=n {
            let tail = |x: usize| prefix[i] - prefix[x];
            // best(x, j - 1) never decreases in x and tail(x) never increases, so
            // the optimum sits at the first x where the head catches up with the
            // tail, or just before it.
            let (mut lo, mut hi) = (j - 1, i);
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                if best.get(mid, j - 1) >= tail(mid) {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }

            let mut pick = None::<(usize, usize)>;
            for x in [lo.checked_sub(1), Some(lo)].into_iter().flatten() {
                if x < j - 1 || x > i - 1 {
                    continue;
                }
                let cost = best.get(x, j - 1).max(tail(x));
                if pick.map_or(true, |(_, c)| cost < c) {
                    pick = Some((x, cost));
                }
            }
            if let Some((x, cost)) = pick {
                best.set(i, j, cost);
                split.set(i, j, x);
            }
        }
    }

    let mut ranges = Vec::with_capacity(k);
    let mut end = n;
    for j in (1..=k).rev() {
        let start = split.get(end, j);
        ranges.push(ChunkRange {
            start_line: start,
            end_line: end - 1,
            token_total: prefix[end] - prefix[start],
        });
        end = start;
    }
    ranges.reverse();

    (best.get(n, k), ranges)
}
