// ============================================================
// Layer 5 — Weighted Binary Cross-Entropy
// ============================================================
//   loss = −Σ_{b,t,k} mask · ( w0[k] · y · log p
//                            + w1[k] · (1 − y) · log(1 − p) )
//
// Summed (not averaged) over the batch; the training loop divides
// by the number of samples when it reports.

use burn::prelude::*;

use crate::data::proposals::BceWeights;

/// Probabilities are kept this far away from 0 and 1 before the logs.
pub const PROB_EPSILON: f32 = 1.0e-7;

/// Per-bucket class weights living on the training device.
#[derive(Debug, Clone)]
pub struct ClassWeights<B: Backend> {
    pub w0: Tensor<B, 1>,
    pub w1: Tensor<B, 1>,
}

impl<B: Backend> ClassWeights<B> {
    pub fn new(weights: &BceWeights, device: &B::Device) -> Self {
        Self {
            w0: Tensor::<B, 1>::from_floats(weights.w0.as_slice(), device),
            w1: Tensor::<B, 1>::from_floats(weights.w1.as_slice(), device),
        }
    }
}

pub fn weighted_bce<B: Backend>(
    probs:   Tensor<B, 3>,
    labels:  Tensor<B, 3>,
    mask:    Tensor<B, 3>,
    weights: &ClassWeights<B>,
) -> Tensor<B, 1> {
    let [batch, steps, k] = probs.dims();
    let w0 = weights.w0.clone().reshape([1, 1, k]).expand([batch, steps, k]);
    let w1 = weights.w1.clone().reshape([1, 1, k]).expand([batch, steps, k]);

    let probs = probs.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
    let positive = w0 * labels.clone() * probs.clone().log();
    let negative = w1 * labels.neg().add_scalar(1.0) * probs.neg().add_scalar(1.0).log();

    ((positive + negative) * mask).sum().neg()
}
