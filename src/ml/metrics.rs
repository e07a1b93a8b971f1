// ============================================================
// Layer 5 — R@N, IoU=θ Evaluation Metric
// ============================================================
// For every query: rank the valid cells of its probability map,
// keep the N best, convert each to seconds and count a hit when
// any of them overlaps the gold moment with IoU ≥ θ.
//
// The score of a split is hits / queries.

use crate::data::proposals::{compute_overlap, ProposalGrid};

#[derive(Debug, Clone, Copy)]
pub struct GroundingMetric {
    pub grid:         ProposalGrid,
    pub top_n:        usize,
    pub threshold:    f64,
    pub step_seconds: f64,
}

impl GroundingMetric {
    /// Top-N cells of one `[T, K]` score map as `(start, end)` seconds.
    /// Only cells that end inside the video (`video_len` steps) are ranked.
    pub fn top_n_intervals(&self, scores: &[f32], video_len: usize) -> Vec<(f64, f64)> {
        let k = self.grid.k;
        let mut order: Vec<usize> = (0..scores.len())
            .filter(|&i| self.grid.is_valid(i / k, i % k, video_len))
            .collect();
        // stable: ties keep grid order
        order.sort_by(|&a, &b| {
            scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal)
        });

        order
            .into_iter()
            .take(self.top_n)
            .map(|i| {
                let (s, e) = self.grid.span(i / k, i % k);
                (s as f64 * self.step_seconds, e as f64 * self.step_seconds)
            })
            .collect()
    }

    /// Count the hits of a batch.
    ///
    /// `scores` is row-major `[batch, t_steps, K]` (probs · mask),
    /// `video_lens` holds the unpadded length of every video and
    /// `gold` one `(start, end)` in seconds per query.
    pub fn top_n_iou(
        &self,
        scores:     &[f32],
        t_steps:    usize,
        video_lens: &[usize],
        gold:       &[(f64, f64)],
    ) -> usize {
        let per_query = t_steps * self.grid.k;
        scores
            .chunks_exact(per_query.max(1))
            .zip(video_lens)
            .zip(gold)
            .filter(|((map, &len), &g)| {
                self.top_n_intervals(map, len)
                    .into_iter()
                    .any(|candidate| compute_overlap(candidate, g) >= self.threshold)
            })
            .count()
    }
}
