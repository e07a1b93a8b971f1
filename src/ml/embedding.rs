// ============================================================
// Layer 5 — Frozen Word Embedding
// ============================================================
// Lookup table initialised from the pretrained word vectors.
//
// The table is held as a plain tensor rather than a module
// Param, so it never shows up in the gradients and the optimizer
// never touches it.

use burn::{prelude::*, tensor::backend::AutodiffBackend};

#[derive(Debug, Clone)]
pub struct WordEmbedding<B: Backend> {
    weight: Tensor<B, 2>,
}

impl<B: Backend> WordEmbedding<B> {
    /// `table` is row-major `[vocab_size, dim]`.
    pub fn from_table(table: &[f32], vocab_size: usize, dim: usize, device: &B::Device) -> Self {
        let weight = Tensor::<B, 1>::from_floats(table, device).reshape([vocab_size, dim]);
        Self { weight }
    }

    /// ids `[batch, len]` → vectors `[batch, len, dim]`
    pub fn forward(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        burn::tensor::module::embedding(self.weight.clone(), ids)
    }

    pub fn vocab_size(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn dim(&self) -> usize {
        self.weight.dims()[1]
    }
}

impl<B: AutodiffBackend> WordEmbedding<B> {
    /// Same table on the inner (non-autodiff) backend, for validation.
    pub fn valid(&self) -> WordEmbedding<B::InnerBackend> {
        WordEmbedding { weight: self.weight.clone().inner() }
    }
}
