// ============================================================
// Layer 5 — Parameter Initialisation
// ============================================================
// Re-initialises every float parameter of a module:
//
//   rank ≥ 2  → Xavier normal, std = sqrt(2 / (fan_in + fan_out))
//   rank 1    → standard normal N(0, 1)
//
// For rank > 2 the trailing dimensions form the receptive field
// and scale both fans. Gradient tracking is carried over from the
// tensor being replaced.

use burn::{
    module::{Module, ModuleMapper, ParamId},
    prelude::*,
    tensor::Distribution,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct ParamInitializer;

impl ParamInitializer {
    pub fn apply<B: Backend, M: Module<B>>(module: M) -> M {
        module.map(&mut ParamInitializer)
    }
}

/// Xavier-normal standard deviation for a tensor of the given shape.
pub fn xavier_std(dims: &[usize]) -> f64 {
    let receptive: usize = dims.iter().skip(2).product();
    let fan_out = dims[0] * receptive;
    let fan_in  = dims[1] * receptive;
    (2.0 / (fan_in + fan_out) as f64).sqrt()
}

impl<B: Backend> ModuleMapper<B> for ParamInitializer {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        let dims          = tensor.dims();
        let device        = tensor.device();
        let requires_grad = tensor.is_require_grad();

        let std = if D > 1 { xavier_std(&dims) } else { 1.0 };
        Tensor::<B, D>::random(dims, Distribution::Normal(0.0, std), &device)
            .set_require_grad(requires_grad)
    }
}
