// ============================================================
// Layer 4 — Grounding Batcher
// ============================================================
// Implements Burn's Batcher trait: turns a Vec<GroundingItem>
// into padded tensors for one forward pass.
//
//   words          [batch, max_words]      Int, <pad>-padded
//   visual         [batch, max_steps, D]   zero-padded features
//   labels         [batch, max_steps, K]   0/1 proposal labels
//
// Lengths and gold timestamps stay on the host: the model needs
// the lengths to mask padding, and the evaluation metric works on
// seconds.

use std::sync::Arc;

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::{dataset::GroundingItem, proposals::ProposalGrid, vocab::Vocab};

#[derive(Debug, Clone)]
pub struct GroundingBatch<B: Backend> {
    pub words:          Tensor<B, 2, Int>,
    pub word_lengths:   Vec<usize>,
    pub visual:         Tensor<B, 3>,
    pub visual_lengths: Vec<usize>,
    pub labels:         Tensor<B, 3>,
    pub start_times:    Vec<f64>,
    pub end_times:      Vec<f64>,
}

impl<B: Backend> GroundingBatch<B> {
    pub fn len(&self) -> usize {
        self.word_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_lengths.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct GroundingBatcher<B: Backend> {
    device:       B::Device,
    vocab:        Arc<Vocab>,
    grid:         ProposalGrid,
    threshold:    f64,
    step_seconds: f64,
}

impl<B: Backend> GroundingBatcher<B> {
    pub fn new(
        device:       B::Device,
        vocab:        Arc<Vocab>,
        grid:         ProposalGrid,
        threshold:    f64,
        step_seconds: f64,
    ) -> Self {
        Self { device, vocab, grid, threshold, step_seconds }
    }
}

impl<B: Backend> Batcher<GroundingItem, GroundingBatch<B>> for GroundingBatcher<B> {
    fn batch(&self, items: Vec<GroundingItem>) -> GroundingBatch<B> {
        let batch_size = items.len();
        let dim        = items.first().map(|i| i.features.dim).unwrap_or(0);
        let max_steps  = items.iter().map(GroundingItem::video_len).max().unwrap_or(0).max(1);
        let k          = self.grid.k;

        let sents: Vec<Vec<String>> = items.iter().map(|i| i.caption.tokens.clone()).collect();
        let words = self.vocab.to_input_tensor::<B>(&sents, &self.device);

        // ── Zero-padded visual features ──────────────────────────────────────
        let mut visual = vec![0.0f32; batch_size * max_steps * dim];
        for (b, item) in items.iter().enumerate() {
            let offset = b * max_steps * dim;
            visual[offset..offset + item.features.values.len()]
                .copy_from_slice(&item.features.values);
        }

        // ── Proposal labels ──────────────────────────────────────────────────
        let labels: Vec<f32> = items
            .iter()
            .flat_map(|item| {
                let gold = (
                    item.caption.start_time / self.step_seconds,
                    item.caption.end_time / self.step_seconds,
                );
                self.grid.labels(item.video_len(), max_steps, gold, self.threshold)
            })
            .collect();

        GroundingBatch {
            words,
            word_lengths: items.iter().map(|i| i.caption.len()).collect(),
            visual: Tensor::<B, 1>::from_floats(visual.as_slice(), &self.device)
                .reshape([batch_size, max_steps, dim]),
            visual_lengths: items.iter().map(GroundingItem::video_len).collect(),
            labels: Tensor::<B, 1>::from_floats(labels.as_slice(), &self.device)
                .reshape([batch_size, max_steps, k]),
            start_times: items.iter().map(|i| i.caption.start_time).collect(),
            end_times:   items.iter().map(|i| i.caption.end_time).collect(),
        }
    }
}
