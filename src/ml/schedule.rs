// ============================================================
// Layer 5 — Training State and Decay Schedule
// ============================================================
// All mutable bookkeeping of the training loop lives in one
// struct, so the early-stopping logic can be exercised without a
// model, a dataset or a GPU.
//
// Two independent loss windows are kept:
//   report window      reset at every log line (`log-every`)
//   cumulative window  reset at every validation (`valid-niter`)
//
// After each validation `judge` decides what happens next:
//
//   score beats every earlier score ─────────────► Improved
//   otherwise patience + 1 < limit ──────────────► Patience
//   otherwise trial + 1 < max-num-trial ─────────► Decay   (lr × decay, reload best)
//   otherwise ───────────────────────────────────► EarlyStop

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPolicy {
    /// Non-improving validations tolerated before a decay trial
    pub patience:      usize,
    /// Decay trials tolerated before stopping
    pub max_num_trial: usize,
    /// Multiplicative learning-rate factor applied on each trial
    pub lr_decay:      f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// New best score: reset patience and checkpoint
    Improved,
    /// No improvement yet within tolerance
    Patience { patience: usize },
    /// Roll back to the best checkpoint with a smaller learning rate
    Decay { trial: usize, lr: f64 },
    /// Trials exhausted
    EarlyStop { trial: usize },
}

/// Decide the outcome of one validation from the scores seen so far.
pub fn judge(
    history:   &[f64],
    score:     f64,
    patience:  usize,
    num_trial: usize,
    lr:        f64,
    policy:    &DecayPolicy,
) -> Verdict {
    if history.iter().all(|&best| score > best) {
        return Verdict::Improved;
    }

    let patience = patience + 1;
    if patience < policy.patience {
        return Verdict::Patience { patience };
    }

    let trial = num_trial + 1;
    if trial >= policy.max_num_trial {
        Verdict::EarlyStop { trial }
    } else {
        Verdict::Decay { trial, lr: lr * policy.lr_decay }
    }
}

/// Accumulated loss over a window of batches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossWindow {
    pub loss:    f64,
    pub samples: usize,
}

impl LossWindow {
    fn add(&mut self, loss: f64, samples: usize) {
        self.loss    += loss;
        self.samples += samples;
    }

    /// Summed loss divided by the number of samples (NaN when empty)
    pub fn average(&self) -> f64 {
        if self.samples == 0 {
            f64::NAN
        } else {
            self.loss / self.samples as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainState {
    pub iteration: usize,
    pub patience:  usize,
    pub num_trial: usize,
    pub lr:        f64,
    report:        LossWindow,
    cumulative:    LossWindow,
    val_scores:    Vec<f64>,
}

impl TrainState {
    pub fn new(lr: f64) -> Self {
        Self {
            iteration:  0,
            patience:   0,
            num_trial:  0,
            lr,
            report:     LossWindow::default(),
            cumulative: LossWindow::default(),
            val_scores: Vec::new(),
        }
    }

    /// Account for one optimisation step.
    pub fn record_batch(&mut self, loss: f64, samples: usize) {
        self.iteration += 1;
        self.report.add(loss, samples);
        self.cumulative.add(loss, samples);
    }

    /// Read and reset the report window.
    pub fn take_report(&mut self) -> LossWindow {
        std::mem::take(&mut self.report)
    }

    /// Read and reset the cumulative window.
    pub fn take_cumulative(&mut self) -> LossWindow {
        std::mem::take(&mut self.cumulative)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.val_scores.iter().copied().reduce(f64::max)
    }

    /// Record a validation score and apply the resulting verdict.
    pub fn observe(&mut self, score: f64, policy: &DecayPolicy) -> Verdict {
        let verdict = judge(
            &self.val_scores,
            score,
            self.patience,
            self.num_trial,
            self.lr,
            policy,
        );
        self.val_scores.push(score);

        match verdict {
            Verdict::Improved => self.patience = 0,
            Verdict::Patience { patience } => self.patience = patience,
            Verdict::Decay { trial, lr } => {
                self.num_trial = trial;
                self.lr        = lr;
                self.patience  = 0;
            }
            Verdict::EarlyStop { trial } => {
                self.num_trial = trial;
                self.patience  = policy.patience;
            }
        }
        verdict
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn policy(patience: usize, max_num_trial: usize) -> DecayPolicy {
        DecayPolicy { patience, max_num_trial, lr_decay: 0.5 }
    }

    #[test]
    fn test_first_score_is_an_improvement() {
        assert_eq!(judge(&[], 0.0, 0, 0, 1e-3, &policy(2, 3)), Verdict::Improved);
    }

    #[test]
    fn test_equal_score_is_not_an_improvement() {
        let v = judge(&[0.4], 0.4, 0, 0, 1e-3, &policy(2, 3));
        assert_eq!(v, Verdict::Patience { patience: 1 });
    }

    #[test]
    fn test_patience_two_single_trial_stops_on_third_validation() {
        let p = policy(2, 1);
        let mut state = TrainState::new(1e-3);
        assert_eq!(state.observe(0.3, &p), Verdict::Improved);
        assert_eq!(state.observe(0.2, &p), Verdict::Patience { patience: 1 });
        assert_eq!(state.observe(0.1, &p), Verdict::EarlyStop { trial: 1 });
        assert_eq!(state.num_trial, 1);
        assert_eq!(state.lr, 1e-3);
    }

    #[test]
    fn test_decay_fires_once_and_resets_patience() {
        let p = policy(2, 3);
        let mut state = TrainState::new(1e-3);
        state.observe(0.5, &p);
        state.observe(0.4, &p);
        assert_eq!(state.observe(0.3, &p), Verdict::Decay { trial: 1, lr: 5e-4 });
        assert_eq!((state.patience, state.num_trial, state.lr), (0, 1, 5e-4));

        // patience counts again from zero after the decay
        assert_eq!(state.observe(0.2, &p), Verdict::Patience { patience: 1 });
        assert_eq!(state.observe(0.1, &p), Verdict::Decay { trial: 2, lr: 2.5e-4 });
        assert_eq!(state.observe(0.0, &p), Verdict::Patience { patience: 1 });
        assert_eq!(state.observe(0.0, &p), Verdict::EarlyStop { trial: 3 });
    }

    #[test]
    fn test_improvement_resets_patience() {
        let p = policy(3, 3);
        let mut state = TrainState::new(1e-3);
        state.observe(0.5, &p);
        state.observe(0.4, &p);
        state.observe(0.45, &p);
        assert_eq!(state.patience, 2);
        assert_eq!(state.observe(0.6, &p), Verdict::Improved);
        assert_eq!(state.patience, 0);
    }

    #[test]
    fn test_improvements_track_running_maximum() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = policy(1_000, 1_000);

        for _ in 0..50 {
            let mut state = TrainState::new(1e-3);
            let mut saved: Option<f64> = None;

            for _ in 0..40 {
                let score: f64 = rng.gen_range(0.0..1.0);
                if state.observe(score, &p) == Verdict::Improved {
                    saved = Some(score);
                }
                // the checkpoint always holds the best score so far
                assert_eq!(saved, state.best_score());
            }
        }
    }

    #[test]
    fn test_patience_steps_by_one_until_limit() {
        let p = policy(4, 2);
        let mut state = TrainState::new(1e-3);
        state.observe(1.0, &p);
        for expected in 1..4 {
            assert_eq!(state.observe(0.0, &p), Verdict::Patience { patience: expected });
            assert_eq!(state.patience, expected);
        }
        assert!(matches!(state.observe(0.0, &p), Verdict::Decay { trial: 1, .. }));
    }

    #[test]
    fn test_report_average_and_reset() {
        let mut state = TrainState::new(1e-3);
        state.record_batch(2.0, 10);
        state.record_batch(4.0, 10);

        let report = state.take_report();
        assert_eq!(report.average(), 0.3);
        assert_eq!(state.take_report(), LossWindow::default());

        // the cumulative window is independent of the report window
        let cumulative = state.take_cumulative();
        assert_eq!((cumulative.loss, cumulative.samples), (6.0, 20));
        assert_eq!(state.iteration, 2);
    }

    #[test]
    fn test_empty_window_average_is_nan() {
        assert!(LossWindow::default().average().is_nan());
    }
}
