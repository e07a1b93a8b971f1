// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Iteration-driven loop with validation-based early stopping:
//
//   loop over epochs (the iteration counter is never reset)
//     loop over batches
//       forward → weighted BCE → backward → Adam step at current lr
//       every log-every   : log report window, write loss/train
//       every valid-niter : log cumulative window, validate,
//                           write score/val, apply the verdict
//       stop at max-iter
//
// The loop itself only talks to a `GroundingSession`, so the
// scheduling logic is tested with a stub session. `BurnSession`
// is the real one: it owns the model, the optimiser, the frozen
// embedding and the validator.
//
// Burn notes:
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - the validation batcher therefore also uses B::InnerBackend

use std::{sync::Arc, time::Instant};

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{GroundingBatch, GroundingBatcher},
    corpus::GroundingCorpus,
    dataset::GroundingDataset,
    proposals::find_bce_weights,
    vocab::Vocab,
    word_vectors::WordVectors,
};
use crate::domain::{caption::Split, traits::ScalarSink};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    embedding::WordEmbedding,
    evaluator::Validator,
    init::ParamInitializer,
    loss::{weighted_bce, ClassWeights},
    metrics::GroundingMetric,
    model::{Tgn, TgnConfig},
    schedule::{DecayPolicy, TrainState, Verdict},
};

pub const TAG_TRAIN_LOSS: &str = "loss/train";
pub const TAG_VAL_SCORE:  &str = "score/val";

#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    pub max_iter:    usize,
    pub log_every:   usize,
    pub valid_niter: usize,
    pub lr:          f64,
    pub policy:      DecayPolicy,
}

/// Summed loss of one batch and the number of samples in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchStats {
    pub loss:    f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainOutcome {
    /// `max-iter` was reached
    Completed { iterations: usize, best_score: Option<f64> },
    /// Decay trials were exhausted
    EarlyStopped { iterations: usize, best_score: Option<f64> },
}

impl TrainOutcome {
    pub fn iterations(&self) -> usize {
        match self {
            Self::Completed { iterations, .. } | Self::EarlyStopped { iterations, .. } => *iterations,
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        match self {
            Self::Completed { best_score, .. } | Self::EarlyStopped { best_score, .. } => *best_score,
        }
    }
}

/// Everything the loop needs from a model + optimiser pair.
pub trait GroundingSession {
    type Batch;

    /// One forward/backward/update step at learning rate `lr`.
    fn train_step(&mut self, batch: Self::Batch, lr: f64) -> Result<BatchStats>;

    /// Score the current model on the validation split.
    fn validate(&mut self) -> Result<f64>;

    /// Persist model and optimiser state as the new best.
    fn save_checkpoint(&mut self) -> Result<()>;

    /// Replace model and optimiser state with the last saved best.
    fn restore_checkpoint(&mut self) -> Result<()>;
}

/// Run the loop until `max-iter` or early stop.
///
/// `epoch` is called once per pass over the training split and must
/// yield at least one batch.
pub fn run_loop<S, I, F>(
    session: &mut S,
    mut epoch: F,
    cfg:     &LoopConfig,
    scalars: &mut dyn ScalarSink,
) -> Result<TrainOutcome>
where
    S: GroundingSession,
    F: FnMut() -> I,
    I: Iterator<Item = S::Batch>,
{
    let mut state        = TrainState::new(cfg.lr);
    let mut epoch_no     = 0usize;
    let train_started    = Instant::now();
    let mut report_timer = Instant::now();

    tracing::info!("begin training...");

    loop {
        epoch_no += 1;
        let mut yielded = false;

        for batch in epoch() {
            yielded = true;

            let stats = session.train_step(batch, state.lr)?;
            state.record_batch(stats.loss, stats.samples);
            let iteration = state.iteration;

            // ── Progress report ──────────────────────────────────────────────
            if iteration % cfg.log_every == 0 {
                let report  = state.take_report();
                let elapsed = report_timer.elapsed().as_secs_f64();
                tracing::info!(
                    "epoch {}, iter {}, avg. loss {:.4}, speed {:.2} samples/sec, time elapsed {:.2} sec",
                    epoch_no,
                    iteration,
                    report.average(),
                    report.samples as f64 / elapsed.max(f64::EPSILON),
                    train_started.elapsed().as_secs_f64(),
                );
                scalars.add_scalar(TAG_TRAIN_LOSS, report.average(), iteration)?;
                report_timer = Instant::now();
            }

            // ── Validation ───────────────────────────────────────────────────
            if iteration % cfg.valid_niter == 0 {
                let cumulative = state.take_cumulative();
                tracing::info!(
                    "epoch {}, iter {}, cum. loss {:.4}, cum. examples {}",
                    epoch_no,
                    iteration,
                    cumulative.average(),
                    cumulative.samples,
                );

                tracing::info!("begin validation ...");
                let score = session.validate()?;
                tracing::info!("validation: iter {}, dev. score {:.4}", iteration, score);
                scalars.add_scalar(TAG_VAL_SCORE, score, iteration)?;

                match state.observe(score, &cfg.policy) {
                    Verdict::Improved => {
                        tracing::info!("save currently the best model");
                        session.save_checkpoint()?;
                    }
                    Verdict::Patience { patience } => {
                        tracing::info!("hit patience {}", patience);
                    }
                    Verdict::Decay { trial, lr } => {
                        tracing::info!("hit patience {}", cfg.policy.patience);
                        tracing::info!("hit #{} trial", trial);
                        tracing::info!("load previously best model and decay learning rate to {}", lr);
                        session.restore_checkpoint()?;
                    }
                    Verdict::EarlyStop { trial } => {
                        tracing::info!("hit patience {}", cfg.policy.patience);
                        tracing::info!("hit #{} trial", trial);
                        tracing::info!("early stop!");
                        return Ok(TrainOutcome::EarlyStopped {
                            iterations: iteration,
                            best_score: state.best_score(),
                        });
                    }
                }
            }

            if iteration >= cfg.max_iter {
                tracing::info!("reached maximum number of iterations!");
                return Ok(TrainOutcome::Completed {
                    iterations: iteration,
                    best_score: state.best_score(),
                });
            }
        }

        if !yielded {
            bail!("training split yielded no batches in epoch {epoch_no}");
        }
    }
}

// ─── Burn Session ─────────────────────────────────────────────────────────────

pub struct BurnSession<B: AutodiffBackend, O> {
    model:       Tgn<B>,
    optim:       O,
    embedding:   WordEmbedding<B>,
    weights:     ClassWeights<B>,
    validator:   Validator<B::InnerBackend>,
    checkpoints: CheckpointManager,
    device:      B::Device,
}

impl<B, O> BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Tgn<B>, B> + Clone,
{
    pub fn new(
        model:       Tgn<B>,
        optim:       O,
        embedding:   WordEmbedding<B>,
        weights:     ClassWeights<B>,
        validator:   Validator<B::InnerBackend>,
        checkpoints: CheckpointManager,
        device:      B::Device,
    ) -> Self {
        Self { model, optim, embedding, weights, validator, checkpoints, device }
    }
}

impl<B, O> GroundingSession for BurnSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Tgn<B>, B> + Clone,
{
    type Batch = GroundingBatch<B>;

    fn train_step(&mut self, batch: GroundingBatch<B>, lr: f64) -> Result<BatchStats> {
        let samples = batch.len();
        let textual = self.embedding.forward(batch.words);
        let output  = self.model.forward(
            textual,
            &batch.word_lengths,
            batch.visual,
            &batch.visual_lengths,
        );
        let loss = weighted_bce(output.probs, batch.labels, output.mask, &self.weights);
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        // Backward pass + Adam update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(lr, self.model.clone(), grads);

        Ok(BatchStats { loss: loss_val, samples })
    }

    fn validate(&mut self) -> Result<f64> {
        // model.valid() → Tgn<B::InnerBackend>, no autodiff graph
        self.validator.score(&self.model.valid(), &self.embedding.valid())
    }

    fn save_checkpoint(&mut self) -> Result<()> {
        self.checkpoints.save(&self.model, &self.optim)
    }

    fn restore_checkpoint(&mut self) -> Result<()> {
        self.model = self.checkpoints.load_model(self.model.clone(), &self.device)?;
        self.optim = self.checkpoints.load_optimizer::<B, _>(self.optim.clone(), &self.device)?;
        Ok(())
    }
}

/// Build the model, optimiser and loaders, then run the loop.
pub fn run_training<B: AutodiffBackend>(
    cfg:     &TrainConfig,
    corpus:  &GroundingCorpus,
    vocab:   Arc<Vocab>,
    vectors: &WordVectors,
    device:  B::Device,
    scalars: &mut dyn ScalarSink,
) -> Result<TrainOutcome> {
    B::seed(cfg.seed);

    let train_captions = corpus.non_empty_captions(Split::Train)?;
    let val_captions   = corpus.non_empty_captions(Split::Val)?;

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = TgnConfig::new(vectors.dim(), corpus.visual_feature_size(), cfg.k, cfg.delta)
        .with_hidden_size_textual(cfg.hidden_size_textual)
        .with_hidden_size_visual(cfg.hidden_size_visual)
        .with_hidden_size_ilstm(cfg.hidden_size_ilstm)
        .with_attention_size(cfg.attention_size);
    let grid = model_cfg.grid();

    let model: Tgn<B> = ParamInitializer::apply(model_cfg.init(&device));
    tracing::info!(
        "TGN ready: K={}, delta={}, word dim={}, visual dim={}",
        cfg.k,
        cfg.delta,
        vectors.dim(),
        corpus.visual_feature_size(),
    );

    let checkpoints = CheckpointManager::new(&cfg.model_save_path);
    checkpoints.save_config(&model_cfg)?;

    // ── Frozen word embedding ─────────────────────────────────────────────────
    let table     = vectors.embedding_matrix(&vocab);
    let embedding = WordEmbedding::<B>::from_table(&table, vocab.len(), vectors.dim(), &device);

    // ── Class balance over the training split ─────────────────────────────────
    let bce = find_bce_weights(&grid, corpus.gold_steps(Split::Train), cfg.threshold);
    tracing::info!("BCE weights w0={:?} w1={:?}", bce.w0, bce.w1);
    let weights = ClassWeights::new(&bce, &device);

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let optim = AdamConfig::new()
        .with_beta_1(0.5)
        .with_beta_2(0.999)
        .init::<B, Tgn<B>>();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = GroundingBatcher::<B>::new(
        device.clone(),
        Arc::clone(&vocab),
        grid,
        cfg.threshold,
        corpus.step_seconds(),
    );
    let train_loader = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(GroundingDataset::new(train_captions, corpus.feature_table()));

    // ── Validation (InnerBackend — no autodiff overhead) ──────────────────────
    let val_batcher = GroundingBatcher::<B::InnerBackend>::new(
        device.clone(),
        Arc::clone(&vocab),
        grid,
        cfg.threshold,
        corpus.step_seconds(),
    );
    let metric = GroundingMetric {
        grid,
        top_n:        cfg.top_n_eval,
        threshold:    cfg.threshold,
        step_seconds: corpus.step_seconds(),
    };
    let validator = Validator::new(
        GroundingDataset::new(val_captions, corpus.feature_table()),
        val_batcher,
        cfg.batch_size,
        metric,
    );

    let mut session = BurnSession::new(model, optim, embedding, weights, validator, checkpoints, device);

    let loop_cfg = LoopConfig {
        max_iter:    cfg.max_iter,
        log_every:   cfg.log_every,
        valid_niter: cfg.valid_niter,
        lr:          cfg.lr,
        policy:      cfg.decay_policy(),
    };
    run_loop(&mut session, || train_loader.iter(), &loop_cfg, scalars)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::batcher::Batcher,
    };

    use crate::data::{
        dataset::GroundingItem,
        npy::FeatureMatrix,
        proposals::{BceWeights, ProposalGrid},
    };
    use crate::domain::caption::Caption;

    /// Batches are `(summed loss, samples)`; validation pops scripted scores.
    #[derive(Default)]
    struct StubSession {
        scores:   VecDeque<f64>,
        current:  f64,
        lrs:      Vec<f64>,
        saved:    Vec<f64>,
        restores: usize,
    }

    impl StubSession {
        fn with_scores(scores: &[f64]) -> Self {
            Self { scores: scores.iter().copied().collect(), ..Self::default() }
        }
    }

    impl GroundingSession for StubSession {
        type Batch = (f64, usize);

        fn train_step(&mut self, (loss, samples): (f64, usize), lr: f64) -> Result<BatchStats> {
            self.lrs.push(lr);
            Ok(BatchStats { loss, samples })
        }

        fn validate(&mut self) -> Result<f64> {
            self.current = self.scores.pop_front().unwrap_or(0.0);
            Ok(self.current)
        }

        fn save_checkpoint(&mut self) -> Result<()> {
            self.saved.push(self.current);
            Ok(())
        }

        fn restore_checkpoint(&mut self) -> Result<()> {
            self.restores += 1;
            Ok(())
        }
    }

    fn loop_cfg(max_iter: usize, valid_niter: usize, patience: usize, max_num_trial: usize) -> LoopConfig {
        LoopConfig {
            max_iter,
            log_every: 1,
            valid_niter,
            lr: 1.0,
            policy: DecayPolicy { patience, max_num_trial, lr_decay: 0.5 },
        }
    }

    fn sink() -> Vec<(String, f64, usize)> {
        Vec::new()
    }

    fn epoch_of(n: usize) -> impl FnMut() -> std::vec::IntoIter<(f64, usize)> {
        move || vec![(1.0, 1); n].into_iter()
    }

    #[test]
    fn test_early_stop_halts_iterations() {
        let mut session = StubSession::with_scores(&[0.3, 0.2, 0.1]);
        let mut scalars = sink();

        let outcome = run_loop(&mut session, epoch_of(3), &loop_cfg(100, 2, 2, 1), &mut scalars).unwrap();

        // stop on the third validation, at iteration 6; nothing runs after it
        assert_eq!(outcome, TrainOutcome::EarlyStopped { iterations: 6, best_score: Some(0.3) });
        assert_eq!(session.lrs.len(), 6);
        assert_eq!(session.saved, vec![0.3]);
        assert_eq!(session.restores, 0);
    }

    #[test]
    fn test_iteration_counter_crosses_epochs() {
        let mut session = StubSession::default();
        let mut scalars = sink();
        let mut epochs  = 0;

        let outcome = run_loop(
            &mut session,
            || {
                epochs += 1;
                vec![(1.0, 1); 3].into_iter()
            },
            &loop_cfg(7, 1_000, 2, 3),
            &mut scalars,
        )
        .unwrap();

        assert_eq!(outcome, TrainOutcome::Completed { iterations: 7, best_score: None });
        assert_eq!(epochs, 3);
        let steps: Vec<usize> = scalars.iter().map(|(_, _, step)| *step).collect();
        assert_eq!(steps, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_checkpoint_tracks_best_score() {
        let mut session = StubSession::with_scores(&[0.2, 0.5, 0.3, 0.6, 0.1]);
        let mut scalars = sink();

        let outcome = run_loop(&mut session, epoch_of(4), &loop_cfg(5, 1, 10, 3), &mut scalars).unwrap();

        assert_eq!(session.saved, vec![0.2, 0.5, 0.6]);
        assert_eq!(outcome.best_score(), Some(0.6));
        assert_eq!(outcome.iterations(), 5);
    }

    #[test]
    fn test_decay_reloads_and_lowers_lr() {
        let mut session = StubSession::with_scores(&[0.5, 0.4, 0.3, 0.2]);
        let mut scalars = sink();

        let outcome = run_loop(&mut session, epoch_of(10), &loop_cfg(100, 1, 1, 3), &mut scalars).unwrap();

        assert_eq!(session.lrs, vec![1.0, 1.0, 0.5, 0.25]);
        assert_eq!(session.restores, 2);
        assert!(matches!(outcome, TrainOutcome::EarlyStopped { iterations: 4, .. }));
    }

    #[test]
    fn test_report_window_average_is_written() {
        let mut session = StubSession::default();
        let mut scalars = sink();
        let mut cfg     = loop_cfg(2, 1_000, 2, 3);
        cfg.log_every   = 2;

        run_loop(&mut session, || vec![(2.0, 10), (4.0, 10)].into_iter(), &cfg, &mut scalars).unwrap();

        assert_eq!(scalars, vec![(TAG_TRAIN_LOSS.to_string(), 0.3, 2)]);
    }

    #[test]
    fn test_validation_scores_are_written() {
        let mut session = StubSession::with_scores(&[0.1, 0.2]);
        let mut scalars = sink();
        let mut cfg     = loop_cfg(4, 2, 2, 3);
        cfg.log_every   = 1_000;

        run_loop(&mut session, epoch_of(4), &cfg, &mut scalars).unwrap();

        assert_eq!(
            scalars,
            vec![(TAG_VAL_SCORE.to_string(), 0.1, 2), (TAG_VAL_SCORE.to_string(), 0.2, 4)]
        );
    }

    #[test]
    fn test_empty_epoch_is_an_error() {
        let mut session = StubSession::default();
        let mut scalars = sink();
        assert!(run_loop(&mut session, epoch_of(0), &loop_cfg(5, 1, 2, 3), &mut scalars).is_err());
    }

    // ── BurnSession on a real model ──────────────────────────────────────────

    type TrainBackend = Autodiff<NdArray>;

    fn tiny_model_config() -> TgnConfig {
        TgnConfig::new(2, 3, 2, 1)
            .with_hidden_size_textual(4)
            .with_hidden_size_visual(4)
            .with_hidden_size_ilstm(4)
            .with_attention_size(4)
    }

    fn output_probs(model: &Tgn<TrainBackend>) -> Vec<f32> {
        let device  = Default::default();
        let textual = Tensor::<TrainBackend, 3>::ones([1, 2, 2], &device);
        let visual  = Tensor::<TrainBackend, 3>::ones([1, 4, 3], &device);
        model
            .forward(textual, &[2], visual, &[4])
            .probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap()
    }

    fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_restore_rolls_back_and_training_resumes() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let grid   = ProposalGrid::new(2, 1);
        let vocab  = Arc::new(Vocab::from_words(["a", "b"]));

        let captions = Arc::new(vec![
            Caption::new("v", vec!["a".into(), "b".into()], 0.0, 2.0),
            Caption::new("v", vec!["b".into()], 1.0, 4.0),
        ]);
        let feats = FeatureMatrix::new(4, 3, (0..12).map(|i| i as f32 / 12.0).collect()).unwrap();
        let mut features = HashMap::new();
        features.insert("v".to_string(), Arc::new(feats));
        let features = Arc::new(features);

        let items: Vec<GroundingItem> = captions
            .iter()
            .map(|c| GroundingItem { caption: c.clone(), features: Arc::clone(&features["v"]) })
            .collect();
        let batcher = GroundingBatcher::<TrainBackend>::new(device, Arc::clone(&vocab), grid, 0.5, 1.0);

        let validator = Validator::new(
            GroundingDataset::new(Arc::clone(&captions), Arc::clone(&features)),
            GroundingBatcher::<NdArray>::new(device, Arc::clone(&vocab), grid, 0.5, 1.0),
            2,
            GroundingMetric { grid, top_n: 1, threshold: 0.5, step_seconds: 1.0 },
        );
        let embedding = WordEmbedding::<TrainBackend>::from_table(
            &[0.0, 0.0, 0.1, 0.1, 0.3, -0.2, -0.1, 0.4],
            vocab.len(),
            2,
            &device,
        );
        let weights = ClassWeights::new(&BceWeights { w0: vec![0.5; 2], w1: vec![0.5; 2] }, &device);
        let optim   = AdamConfig::new()
            .with_beta_1(0.5)
            .with_beta_2(0.999)
            .init::<TrainBackend, Tgn<TrainBackend>>();

        let mut session = BurnSession::new(
            tiny_model_config().init::<TrainBackend>(&device),
            optim,
            embedding,
            weights,
            validator,
            CheckpointManager::new(dir.path().join("model.bin")),
            device,
        );
        let lr = 0.05;

        // one step fills the Adam moments, then both records are written together
        session.train_step(batcher.batch(items.clone()), lr).unwrap();
        session.save_checkpoint().unwrap();
        let saved = output_probs(&session.model);

        session.train_step(batcher.batch(items.clone()), lr).unwrap();
        assert!(max_abs_diff(&saved, &output_probs(&session.model)) > 1e-6);

        session.restore_checkpoint().unwrap();
        assert!(max_abs_diff(&saved, &output_probs(&session.model)) < 1e-6);
        assert!(!session.optim.to_record().is_empty());

        // gradients still reach the reloaded parameters
        let stats = session.train_step(batcher.batch(items), lr).unwrap();
        assert!(stats.loss.is_finite());
        assert_eq!(stats.samples, 2);
        assert!(max_abs_diff(&saved, &output_probs(&session.model)) > 1e-6);

        let score = session.validate().unwrap();
        assert!((0.0..=1.0).contains(&score));
    }
}
