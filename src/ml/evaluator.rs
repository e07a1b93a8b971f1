// ============================================================
// Layer 5 — Validator
// ============================================================
// Scores a model on one split with R@N, IoU=θ:
//
//   for every batch
//     embed words → TGN forward → probs · mask (on the host)
//     count the queries whose top-N cells hit the gold moment
//   score = hits / queries
//
// Runs on a plain (non-autodiff) backend: during training this is
// B::InnerBackend via model.valid(), for `eval` it is the backend
// the checkpoint was loaded on.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::*,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::data::{
    batcher::{GroundingBatch, GroundingBatcher},
    dataset::GroundingDataset,
};
use crate::ml::{embedding::WordEmbedding, metrics::GroundingMetric, model::Tgn};

pub struct Validator<B: Backend> {
    loader:      Arc<dyn DataLoader<GroundingBatch<B>>>,
    metric:      GroundingMetric,
    num_samples: usize,
}

impl<B: Backend> Validator<B> {
    pub fn new(
        dataset:    GroundingDataset,
        batcher:    GroundingBatcher<B>,
        batch_size: usize,
        metric:     GroundingMetric,
    ) -> Self {
        let num_samples = dataset.len();
        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(batch_size)
            .num_workers(1)
            .build(dataset);
        Self { loader, metric, num_samples }
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Fraction of queries with at least one top-N hit.
    pub fn score(&self, model: &Tgn<B>, embedding: &WordEmbedding<B>) -> Result<f64> {
        let progress = ProgressBar::new(self.num_samples as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:30} {pos}/{len} queries [{elapsed}<{eta}]")?
                .progress_chars("=>-"),
        );

        let mut hits    = 0usize;
        let mut samples = 0usize;

        for batch in self.loader.iter() {
            let n = batch.len();
            let textual = embedding.forward(batch.words);
            let output  = model.forward(
                textual,
                &batch.word_lengths,
                batch.visual,
                &batch.visual_lengths,
            );

            let [_, t_steps, _] = output.probs.dims();
            let scores = (output.probs * output.mask)
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow!("Cannot read validation scores: {e:?}"))?;

            let gold: Vec<(f64, f64)> = batch
                .start_times
                .iter()
                .copied()
                .zip(batch.end_times.iter().copied())
                .collect();

            hits    += self.metric.top_n_iou(&scores, t_steps, &batch.visual_lengths, &gold);
            samples += n;
            progress.inc(n as u64);
        }
        progress.finish_and_clear();

        if samples == 0 {
            bail!("validation split yielded no samples");
        }
        tracing::debug!("R@{} IoU={}: {}/{}", self.metric.top_n, self.metric.threshold, hits, samples);
        Ok(hits as f64 / samples as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use burn::backend::NdArray;

    use crate::data::{npy::FeatureMatrix, proposals::ProposalGrid, vocab::Vocab};
    use crate::domain::caption::Caption;
    use crate::ml::model::TgnConfig;

    #[test]
    fn test_score_is_a_fraction_of_queries() {
        let device = Default::default();
        let grid   = ProposalGrid::new(2, 1);

        let captions = Arc::new(vec![
            Caption::new("v", vec!["a".into()], 0.0, 1.0),
            Caption::new("v", vec!["b".into(), "a".into()], 1.0, 3.0),
            Caption::new("v", vec!["zzz".into()], 2.0, 4.0),
        ]);
        let mut features = HashMap::new();
        features.insert("v".to_string(), Arc::new(FeatureMatrix::new(4, 3, vec![0.1; 12]).unwrap()));

        let vocab   = Arc::new(Vocab::from_words(["a", "b"]));
        let batcher = GroundingBatcher::<NdArray>::new(device, Arc::clone(&vocab), grid, 0.5, 1.0);
        let metric  = GroundingMetric { grid, top_n: 1, threshold: 0.5, step_seconds: 1.0 };
        let validator = Validator::new(
            GroundingDataset::new(captions, Arc::new(features)),
            batcher,
            2,
            metric,
        );
        assert_eq!(validator.num_samples(), 3);

        let model     = TgnConfig::new(2, 3, 2, 1)
            .with_hidden_size_textual(4)
            .with_hidden_size_visual(4)
            .with_hidden_size_ilstm(4)
            .with_attention_size(4)
            .init::<NdArray>(&device);
        let embedding = WordEmbedding::from_table(&[0.0; 8], vocab.len(), 2, &device);

        let score = validator.score(&model, &embedding).unwrap();
        assert!((0.0..=1.0).contains(&score));
        // three queries → the score is a multiple of 1/3
        let scaled = score * 3.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }
}
