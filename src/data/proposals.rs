// ============================================================
// Layer 4 — Proposal Grid
// ============================================================
// TGN scores a fixed grid of candidate moments per video:
//
//   for every feature step t and every bucket k in 0..K
//     candidate (t, k) = steps [t, t + (k + 1)·δ)
//
// A cell is valid only if the candidate ends inside the video.
// A valid cell is a positive example when its temporal IoU with
// the gold moment reaches the labelling threshold θ.
//
//   t →   0   1   2   3   4   5        video_len = 6, δ = 2, K = 3
//   k=0  [===)                         valid for t ≤ 4
//   k=1  [=======)                     valid for t ≤ 2
//   k=2  [===========)                 valid for t = 0
//
// Positives are rare (a handful of cells per query out of T·K),
// so the loss re-weights both classes per bucket with the
// corpus-wide balance computed by `find_bce_weights`.

use serde::{Deserialize, Serialize};

/// Temporal IoU of two `[start, end]` intervals in any common unit.
pub fn compute_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let inter = (a.1.min(b.1) - a.0.max(b.0)).max(0.0);
    let union = a.1.max(b.1) - a.0.min(b.0);
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Geometry of the candidate grid (K buckets of width multiples of δ).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProposalGrid {
    pub k:     usize,
    pub delta: usize,
}

impl ProposalGrid {
    pub fn new(k: usize, delta: usize) -> Self {
        Self { k, delta }
    }

    /// Candidate `(start, end)` in feature steps, end exclusive.
    pub fn span(&self, t: usize, k: usize) -> (usize, usize) {
        (t, t + (k + 1) * self.delta)
    }

    pub fn is_valid(&self, t: usize, k: usize, video_len: usize) -> bool {
        self.span(t, k).1 <= video_len
    }

    /// Row-major `[t_steps, K]` validity mask (1.0 / 0.0).
    /// `t_steps` may exceed `video_len` when the batch is padded.
    pub fn mask(&self, video_len: usize, t_steps: usize) -> Vec<f32> {
        let mut mask = Vec::with_capacity(t_steps * self.k);
        for t in 0..t_steps {
            for k in 0..self.k {
                mask.push(if self.is_valid(t, k, video_len) { 1.0 } else { 0.0 });
            }
        }
        mask
    }

    /// Row-major `[t_steps, K]` binary labels for one query.
    /// `gold` is the annotated moment in (fractional) feature steps.
    pub fn labels(
        &self,
        video_len: usize,
        t_steps:   usize,
        gold:      (f64, f64),
        threshold: f64,
    ) -> Vec<f32> {
        let mut labels = Vec::with_capacity(t_steps * self.k);
        for t in 0..t_steps {
            for k in 0..self.k {
                let positive = self.is_valid(t, k, video_len) && {
                    let (s, e) = self.span(t, k);
                    compute_overlap((s as f64, e as f64), gold) >= threshold
                };
                labels.push(if positive { 1.0 } else { 0.0 });
            }
        }
        labels
    }
}

/// Per-bucket class weights for the binary cross-entropy.
///
/// `w0[k]` multiplies the positive term and equals the fraction of
/// negatives in bucket k; `w1[k]` multiplies the negative term and
/// equals the fraction of positives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BceWeights {
    pub w0: Vec<f32>,
    pub w1: Vec<f32>,
}

/// Count positive and negative valid cells per bucket over a split.
///
/// `items` yields `(video_len, gold_in_steps)` for every query.
pub fn find_bce_weights<I>(grid: &ProposalGrid, items: I, threshold: f64) -> BceWeights
where
    I: IntoIterator<Item = (usize, (f64, f64))>,
{
    let mut positives = vec![0u64; grid.k];
    let mut negatives = vec![0u64; grid.k];

    for (video_len, gold) in items {
        let labels = grid.labels(video_len, video_len, gold, threshold);
        for t in 0..video_len {
            for k in 0..grid.k {
                if !grid.is_valid(t, k, video_len) {
                    continue;
                }
                if labels[t * grid.k + k] > 0.5 {
                    positives[k] += 1;
                } else {
                    negatives[k] += 1;
                }
            }
        }
    }

    let (w0, w1) = positives
        .iter()
        .zip(&negatives)
        .map(|(&pos, &neg)| {
            let total = pos + neg;
            if total == 0 {
                (0.5, 0.5)
            } else {
                (neg as f32 / total as f32, pos as f32 / total as f32)
            }
        })
        .unzip();

    BceWeights { w0, w1 }
}
