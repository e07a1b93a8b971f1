// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence that several layers rely on but none of them owns:
//
//   checkpoint.rs — best model + optimiser records and the model
//                   config JSON, at paths derived from
//                   `--model-save-path`
//
//   scalars.rs    — training curves (loss/train, score/val)
//                   appended to a CSV file under `--log-dir`

/// Model / optimiser checkpoint saving and loading
pub mod checkpoint;

/// Scalar time-series CSV logger
pub mod scalars;
