// ============================================================
// Layer 5 — Temporal Grounding Network (TGN)
// ============================================================
// Three recurrent encoders and a grounding head:
//
//   words  [B, N, E] ──► textual LSTM ──► h_s [B, N, Hs]
//   frames [B, T, D] ──► visual LSTM  ──► h_v [B, T, Hv]
//
//   for t in 0..T                                   (interaction LSTM)
//     e_t   = w · tanh(W_s h_s + W_v h_v[t] + W_r h_r[t-1])   [B, N]
//     α_t   = softmax(e_t) over real words
//     c_t   = Σ α_t · h_s                                    [B, Hs]
//     h_r[t] = iLSTM([h_v[t] ; c_t], state)                  [B, Hr]
//
//   probs = sigmoid(W_g h_r)                                  [B, T, K]
//   mask  = 1 where candidate (t, k) lies inside the video
//
// The interaction LSTM is stepped one frame at a time so that the
// attention at step t can read its own previous state.

use burn::{
    nn::{Linear, LinearConfig, Lstm, LstmConfig, LstmState},
    prelude::*,
    tensor::activation::{sigmoid, softmax},
};

use crate::data::proposals::ProposalGrid;

const MASKED_ENERGY: f32 = -1.0e9;

#[derive(Config, Debug)]
pub struct TgnConfig {
    pub word_embed_size:     usize,
    pub visual_feature_size: usize,
    /// Number of duration buckets scored per time step
    pub k:                   usize,
    /// Width of the smallest bucket, in feature steps
    pub delta:               usize,
    #[config(default = 512)]
    pub hidden_size_textual: usize,
    #[config(default = 512)]
    pub hidden_size_visual:  usize,
    #[config(default = 512)]
    pub hidden_size_ilstm:   usize,
    #[config(default = 256)]
    pub attention_size:      usize,
}

impl TgnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Tgn<B> {
        let ilstm_input = self.hidden_size_visual + self.hidden_size_textual;
        Tgn {
            textual_lstm:   LstmConfig::new(self.word_embed_size, self.hidden_size_textual, true)
                .init(device),
            visual_lstm:    LstmConfig::new(self.visual_feature_size, self.hidden_size_visual, true)
                .init(device),
            ilstm:          LstmConfig::new(ilstm_input, self.hidden_size_ilstm, true).init(device),
            att_textual:    LinearConfig::new(self.hidden_size_textual, self.attention_size)
                .with_bias(false)
                .init(device),
            att_visual:     LinearConfig::new(self.hidden_size_visual, self.attention_size)
                .init(device),
            att_recurrent:  LinearConfig::new(self.hidden_size_ilstm, self.attention_size)
                .with_bias(false)
                .init(device),
            att_score:      LinearConfig::new(self.attention_size, 1).with_bias(false).init(device),
            grounding_head: LinearConfig::new(self.hidden_size_ilstm, self.k).init(device),
            hidden_textual: self.hidden_size_textual,
            hidden_visual:  self.hidden_size_visual,
            hidden_ilstm:   self.hidden_size_ilstm,
            k:              self.k,
            delta:          self.delta,
        }
    }

    pub fn grid(&self) -> ProposalGrid {
        ProposalGrid::new(self.k, self.delta)
    }
}

#[derive(Module, Debug)]
pub struct Tgn<B: Backend> {
    pub textual_lstm:   Lstm<B>,
    pub visual_lstm:    Lstm<B>,
    pub ilstm:          Lstm<B>,
    pub att_textual:    Linear<B>,
    pub att_visual:     Linear<B>,
    pub att_recurrent:  Linear<B>,
    pub att_score:      Linear<B>,
    pub grounding_head: Linear<B>,
    pub hidden_textual: usize,
    pub hidden_visual:  usize,
    pub hidden_ilstm:   usize,
    pub k:              usize,
    pub delta:          usize,
}

/// Match probabilities and validity mask, both `[batch, T, K]`.
#[derive(Debug, Clone)]
pub struct TgnOutput<B: Backend> {
    pub probs: Tensor<B, 3>,
    pub mask:  Tensor<B, 3>,
}

impl<B: Backend> Tgn<B> {
    pub fn grid(&self) -> ProposalGrid {
        ProposalGrid::new(self.k, self.delta)
    }

    pub fn forward(
        &self,
        textual:        Tensor<B, 3>,
        text_lengths:   &[usize],
        visual:         Tensor<B, 3>,
        visual_lengths: &[usize],
    ) -> TgnOutput<B> {
        let [batch, n_words, _] = textual.dims();
        let [_, t_steps, _]     = visual.dims();
        let device              = visual.device();

        let (h_s, _) = self.textual_lstm.forward(textual, None); // [B, N, Hs]
        let (h_v, _) = self.visual_lstm.forward(visual, None);   // [B, T, Hv]

        let pad_words = length_mask::<B>(text_lengths, n_words, &device).equal_elem(0.0);
        let proj_s    = self.att_textual.forward(h_s.clone()); // [B, N, A]

        let mut h_r   = Tensor::<B, 2>::zeros([batch, self.hidden_ilstm], &device);
        let mut state: Option<LstmState<B, 2>> = None;
        let mut steps = Vec::with_capacity(t_steps);

        for t in 0..t_steps {
            let h_v_t = h_v
                .clone()
                .slice([0..batch, t..t + 1, 0..self.hidden_visual])
                .reshape([batch, self.hidden_visual]);

            // ── Attention over the query words ───────────────────────────────
            let query  = self.att_visual.forward(h_v_t.clone())
                + self.att_recurrent.forward(h_r.clone()); // [B, A]
            let energy = self
                .att_score
                .forward((proj_s.clone() + query.unsqueeze_dim::<3>(1)).tanh())
                .reshape([batch, n_words])
                .mask_fill(pad_words.clone(), MASKED_ENERGY);
            let alpha   = softmax(energy, 1); // [B, N]
            let context = (alpha.unsqueeze_dim::<3>(2) * h_s.clone())
                .sum_dim(1)
                .reshape([batch, self.hidden_textual]);

            // ── One interaction step ─────────────────────────────────────────
            let input          = Tensor::cat(vec![h_v_t, context], 1).unsqueeze_dim::<3>(1);
            let (out, next)    = self.ilstm.forward(input, state);
            h_r   = out.reshape([batch, self.hidden_ilstm]);
            state = Some(next);
            steps.push(h_r.clone());
        }

        let h_r   = Tensor::stack::<3>(steps, 1); // [B, T, Hr]
        let probs = sigmoid(self.grounding_head.forward(h_r));
        let mask  = proposal_mask::<B>(&self.grid(), visual_lengths, t_steps, &device);

        TgnOutput { probs, mask }
    }
}

/// `[batch, max_len]` with 1.0 on real positions and 0.0 on padding.
pub fn length_mask<B: Backend>(lengths: &[usize], max_len: usize, device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = lengths
        .iter()
        .flat_map(|&len| (0..max_len).map(move |i| if i < len { 1.0 } else { 0.0 }))
        .collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([lengths.len(), max_len])
}

/// `[batch, t_steps, K]` validity of every candidate given each video's length.
pub fn proposal_mask<B: Backend>(
    grid:    &ProposalGrid,
    lengths: &[usize],
    t_steps: usize,
    device:  &B::Device,
) -> Tensor<B, 3> {
    let flat: Vec<f32> = lengths.iter().flat_map(|&len| grid.mask(len, t_steps)).collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([lengths.len(), t_steps, grid.k])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn tiny_config() -> TgnConfig {
        TgnConfig::new(4, 3, 2, 1)
            .with_hidden_size_textual(5)
            .with_hidden_size_visual(6)
            .with_hidden_size_ilstm(7)
            .with_attention_size(8)
    }

    #[test]
    fn test_forward_shapes_and_ranges() {
        let device = Default::default();
        let model  = tiny_config().init::<NdArray>(&device);

        let textual = Tensor::<NdArray, 3>::ones([2, 3, 4], &device);
        let visual  = Tensor::<NdArray, 3>::ones([2, 5, 3], &device);
        let out     = model.forward(textual, &[3, 1], visual, &[5, 2]);

        assert_eq!(out.probs.dims(), [2, 5, 2]);
        assert_eq!(out.mask.dims(), [2, 5, 2]);

        let probs = out.probs.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!(probs.iter().all(|&p| p > 0.0 && p < 1.0));

        // second video has 2 steps: only (0,0), (0,1), (1,0) are valid
        let mask = out.mask.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(&mask[10..], &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_padded_words_do_not_change_output() {
        let device = Default::default();
        let model  = tiny_config().init::<NdArray>(&device);
        let visual = Tensor::<NdArray, 3>::ones([1, 3, 3], &device);

        let short  = Tensor::<NdArray, 3>::ones([1, 2, 4], &device);
        let padded = Tensor::cat(vec![short.clone(), Tensor::zeros([1, 2, 4], &device) + 7.0], 1);

        let a = model.forward(short, &[2], visual.clone(), &[3]).probs;
        let b = model.forward(padded, &[2], visual, &[3]).probs;

        let a = a.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let b = b.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_length_mask() {
        let device = Default::default();
        let mask   = length_mask::<NdArray>(&[2, 0], 3, &device);
        let values = mask.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
