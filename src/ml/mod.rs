// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, runs or trains the network lives here.
//
//   model.rs      — TGN: textual / visual / interaction LSTMs with
//                   word attention and a K-bucket grounding head
//   embedding.rs  — frozen lookup table from pretrained vectors
//   init.rs       — Xavier-normal / N(0, 1) parameter re-init
//   loss.rs       — per-bucket weighted binary cross-entropy
//   metrics.rs    — R@N, IoU=θ over the proposal grid
//   schedule.rs   — training state, patience / decay / early stop
//   evaluator.rs  — validation pass over one split
//   trainer.rs    — the training loop and the burn session behind it

pub mod embedding;
pub mod evaluator;
pub mod init;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod schedule;
pub mod trainer;
