// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Check the configuration          (Layer 2)
//   Step 2: Load pretrained word vectors     (Layer 4 - data)
//   Step 3: Load train/val captions + feats  (Layer 4 - data)
//   Step 4: Build the vocabulary             (Layer 4 - data)
//   Step 5: Open the scalar log, save config (Layer 6 - infra)
//   Step 6: Run the training loop            (Layer 5 - ml)

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use serde::{Deserialize, Serialize};

use crate::application::{BackendKind, CorpusKind};
use crate::data::{
    corpus::{CorpusOverrides, GroundingCorpus},
    vocab::Vocab,
    word_vectors::WordVectors,
};
use crate::domain::caption::Split;
use crate::infra::scalars::ScalarLog;
use crate::ml::{
    schedule::DecayPolicy,
    trainer::{run_training, TrainOutcome},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every option of a training run. Serialisable so the run's settings
// are kept next to its scalar log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub corpus:              CorpusKind,
    pub textual_data_path:   PathBuf,
    pub visual_data_path:    PathBuf,
    pub word_vectors:        PathBuf,
    pub model_save_path:     PathBuf,
    pub log_dir:             PathBuf,
    pub backend:             BackendKind,
    pub seed:                u64,

    pub batch_size:          usize,
    pub hidden_size_textual: usize,
    pub hidden_size_visual:  usize,
    pub hidden_size_ilstm:   usize,
    pub attention_size:      usize,
    pub k:                   usize,
    pub delta:               usize,
    pub threshold:           f64,
    pub fps:                 Option<f64>,
    pub sample_rate:         Option<usize>,

    pub log_every:           usize,
    pub max_iter:            usize,
    pub valid_niter:         usize,
    pub lr:                  f64,
    pub lr_decay:            f64,
    pub patience:            usize,
    pub max_num_trial:       usize,
    pub top_n_eval:          usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpus:              CorpusKind::Tacos,
            textual_data_path:   PathBuf::from("data/textual"),
            visual_data_path:    PathBuf::from("data/visual"),
            word_vectors:        PathBuf::from("glove.6B.50d.txt"),
            model_save_path:     PathBuf::from("model.bin"),
            log_dir:             PathBuf::from("runs"),
            backend:             BackendKind::Wgpu,
            seed:                42,
            batch_size:          64,
            hidden_size_textual: 512,
            hidden_size_visual:  512,
            hidden_size_ilstm:   512,
            attention_size:      256,
            k:                   16,
            delta:               4,
            threshold:           0.5,
            fps:                 None,
            sample_rate:         None,
            log_every:           10,
            max_iter:            10_000,
            valid_niter:         50,
            lr:                  1e-3,
            lr_decay:            0.5,
            patience:            2,
            max_num_trial:       3,
            top_n_eval:          1,
        }
    }
}

impl TrainConfig {
    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch-size", self.batch_size),
            ("K", self.k),
            ("delta", self.delta),
            ("log-every", self.log_every),
            ("max-iter", self.max_iter),
            ("valid-niter", self.valid_niter),
            ("patience", self.patience),
            ("max-num-trial", self.max_num_trial),
            ("top-n-eval", self.top_n_eval),
        ];
        for (name, value) in positive {
            if value == 0 {
                bail!("--{name} must be at least 1");
            }
        }
        if !(self.lr > 0.0) {
            bail!("--lr must be positive, got {}", self.lr);
        }
        if !(self.lr_decay > 0.0 && self.lr_decay <= 1.0) {
            bail!("--lr-decay must be in (0, 1], got {}", self.lr_decay);
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            bail!("--threshold must be in (0, 1], got {}", self.threshold);
        }
        Ok(())
    }

    pub fn decay_policy(&self) -> DecayPolicy {
        DecayPolicy {
            patience:      self.patience,
            max_num_trial: self.max_num_trial,
            lr_decay:      self.lr_decay,
        }
    }

    pub fn overrides(&self) -> CorpusOverrides {
        CorpusOverrides { fps: self.fps, sample_rate: self.sample_rate }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: Configuration ────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Word vectors ─────────────────────────────────────────────
        let vectors = WordVectors::load(&cfg.word_vectors)?;

        // ── Step 3: Corpus ───────────────────────────────────────────────────
        let source = cfg.corpus.source(&cfg.textual_data_path);
        let corpus = GroundingCorpus::load(
            source.as_ref(),
            &cfg.visual_data_path,
            &[Split::Train, Split::Val],
            &cfg.overrides(),
        )?;
        tracing::info!(
            "{}: fps={}, sample rate={}, one feature step = {:.3}s",
            corpus.name(),
            corpus.fps(),
            corpus.sample_rate(),
            corpus.step_seconds(),
        );

        // ── Step 4: Vocabulary ───────────────────────────────────────────────
        let vocab = Arc::new(Vocab::from_words(vectors.words()));
        tracing::info!("Vocabulary: {} words", vocab.len());

        // ── Step 5: Monitoring ───────────────────────────────────────────────
        let mut scalars = ScalarLog::new(&cfg.log_dir)?;
        let run_config  = cfg.log_dir.join("train_config.json");
        fs::write(&run_config, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write '{}'", run_config.display()))?;

        // ── Step 6: Training loop (Layer 5) ──────────────────────────────────
        match cfg.backend {
            BackendKind::Wgpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                run_training::<Autodiff<Wgpu>>(cfg, &corpus, vocab, &vectors, device, &mut scalars)
            }
            BackendKind::NdArray => {
                tracing::info!("Using ndarray CPU backend");
                run_training::<Autodiff<NdArray>>(
                    cfg,
                    &corpus,
                    vocab,
                    &vectors,
                    NdArrayDevice::default(),
                    &mut scalars,
                )
            }
        }
    }
}
