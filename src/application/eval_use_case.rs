// ============================================================
// Layer 2 — EvalUseCase
// ============================================================
// Scores a saved checkpoint on one split:
//
//   Step 1: Rebuild TgnConfig from <model-save-path>.json
//   Step 2: Load word vectors, check their size against the config
//   Step 3: Load the split's captions and features
//   Step 4: Load the weights and run the validation pass
//
// No autodiff is involved, so the plain backend is used.

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::application::{BackendKind, CorpusKind};
use crate::data::{
    batcher::GroundingBatcher,
    corpus::{CorpusOverrides, GroundingCorpus},
    dataset::GroundingDataset,
    vocab::Vocab,
    word_vectors::WordVectors,
};
use crate::domain::caption::Split;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    embedding::WordEmbedding,
    evaluator::Validator,
    metrics::GroundingMetric,
    model::{Tgn, TgnConfig},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    pub corpus:            CorpusKind,
    pub textual_data_path: PathBuf,
    pub visual_data_path:  PathBuf,
    pub word_vectors:      PathBuf,
    pub model_save_path:   PathBuf,
    pub backend:           BackendKind,
    pub split:             Split,
    pub batch_size:        usize,
    pub threshold:         f64,
    pub top_n_eval:        usize,
    pub fps:               Option<f64>,
    pub sample_rate:       Option<usize>,
}

/// R@N, IoU=θ of a checkpoint on one split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub split:     Split,
    pub top_n:     usize,
    pub threshold: f64,
    pub samples:   usize,
    pub score:     f64,
}

pub struct EvalUseCase {
    config: EvalConfig,
}

impl EvalUseCase {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let cfg = &self.config;
        if cfg.batch_size == 0 || cfg.top_n_eval == 0 {
            bail!("--batch-size and --top-n-eval must be at least 1");
        }

        // ── Step 1: Architecture ─────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.model_save_path);
        let model_cfg   = checkpoints.load_config()?;

        // ── Step 2: Word vectors ─────────────────────────────────────────────
        let vectors = WordVectors::load(&cfg.word_vectors)?;
        if vectors.dim() != model_cfg.word_embed_size {
            bail!(
                "word vectors have dimension {} but the model was trained with {}",
                vectors.dim(),
                model_cfg.word_embed_size
            );
        }
        let vocab = Arc::new(Vocab::from_words(vectors.words()));

        // ── Step 3: Split ────────────────────────────────────────────────────
        let source = cfg.corpus.source(&cfg.textual_data_path);
        let corpus = GroundingCorpus::load(
            source.as_ref(),
            &cfg.visual_data_path,
            &[cfg.split],
            &CorpusOverrides { fps: cfg.fps, sample_rate: cfg.sample_rate },
        )?;
        if corpus.visual_feature_size() != model_cfg.visual_feature_size {
            bail!(
                "visual features have dimension {} but the model was trained with {}",
                corpus.visual_feature_size(),
                model_cfg.visual_feature_size
            );
        }

        // ── Step 4: Score ────────────────────────────────────────────────────
        let inputs = EvalInputs {
            cfg,
            model_cfg:   &model_cfg,
            checkpoints: &checkpoints,
            corpus:      &corpus,
            vocab,
            vectors:     &vectors,
        };
        let (samples, score) = match cfg.backend {
            BackendKind::Wgpu    => inputs.run::<Wgpu>(WgpuDevice::default())?,
            BackendKind::NdArray => inputs.run::<NdArray>(NdArrayDevice::default())?,
        };

        Ok(EvalReport {
            split: cfg.split,
            top_n: cfg.top_n_eval,
            threshold: cfg.threshold,
            samples,
            score,
        })
    }
}

struct EvalInputs<'a> {
    cfg:         &'a EvalConfig,
    model_cfg:   &'a TgnConfig,
    checkpoints: &'a CheckpointManager,
    corpus:      &'a GroundingCorpus,
    vocab:       Arc<Vocab>,
    vectors:     &'a WordVectors,
}

impl EvalInputs<'_> {
    fn run<B: Backend>(self, device: B::Device) -> Result<(usize, f64)> {
        let model: Tgn<B> = self.model_cfg.init(&device);
        let model         = self.checkpoints.load_model(model, &device)?;

        let table     = self.vectors.embedding_matrix(&self.vocab);
        let embedding =
            WordEmbedding::<B>::from_table(&table, self.vocab.len(), self.vectors.dim(), &device);

        let grid    = self.model_cfg.grid();
        let step    = self.corpus.step_seconds();
        let batcher = GroundingBatcher::<B>::new(device, self.vocab, grid, self.cfg.threshold, step);
        let metric  = GroundingMetric {
            grid,
            top_n:        self.cfg.top_n_eval,
            threshold:    self.cfg.threshold,
            step_seconds: step,
        };
        let captions  = self.corpus.non_empty_captions(self.cfg.split)?;
        let validator = Validator::new(
            GroundingDataset::new(captions, self.corpus.feature_table()),
            batcher,
            self.cfg.batch_size,
            metric,
        );

        let score = validator.score(&model, &embedding)?;
        Ok((validator.num_samples(), score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{fixtures::TinyCorpus, train_use_case::TrainUseCase};

    fn eval_config(tiny: &TinyCorpus, split: Split) -> EvalConfig {
        EvalConfig {
            corpus:            CorpusKind::Tacos,
            textual_data_path: tiny.textual.clone(),
            visual_data_path:  tiny.visual.clone(),
            word_vectors:      tiny.glove.clone(),
            model_save_path:   tiny.model_save_path(),
            backend:           BackendKind::NdArray,
            split,
            batch_size:        2,
            threshold:         0.5,
            top_n_eval:        1,
            fps:               Some(10.0),
            sample_rate:       Some(5),
        }
    }

    #[test]
    fn test_eval_scores_trained_checkpoint() {
        let tiny = TinyCorpus::new();
        TrainUseCase::new(tiny.train_config()).execute().unwrap();

        let report = EvalUseCase::new(eval_config(&tiny, Split::Test)).execute().unwrap();
        assert_eq!(report.split, Split::Test);
        assert_eq!(report.samples, 2);
        assert!((0.0..=1.0).contains(&report.score));
    }

    #[test]
    fn test_eval_without_checkpoint_fails() {
        let tiny = TinyCorpus::new();
        assert!(EvalUseCase::new(eval_config(&tiny, Split::Val)).execute().is_err());
    }
}
