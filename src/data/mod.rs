// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the files on disk and the tensors fed to
// the model:
//
//   annotation JSON ──► TacosSource / ActivityNetSource
//                          │   (Preprocessor tokenises sentences)
//                          ▼
//   <video>.npy ──────► GroundingCorpus  (captions + features + fps)
//                          │
//                          ▼
//                      GroundingDataset  (Burn Dataset)
//                          │
//   glove.txt ──► Vocab ──►▼
//                      GroundingBatcher  (padding + proposal labels)
//                          │
//                          ▼
//                      DataLoader → training loop

/// Caption text normalisation and tokenisation
pub mod preprocessor;

/// Word ↔ id mapping and padded id tensors
pub mod vocab;

/// GloVe text-format loader and embedding table
pub mod word_vectors;

/// Minimal reader/writer for `.npy` feature files
pub mod npy;

/// TACoS annotation files
pub mod tacos;

/// ActivityNet Captions annotation files
pub mod activitynet;

/// Captions + features + corpus statistics
pub mod corpus;

/// Candidate grid, labels and class-balance weights
pub mod proposals;

/// Burn Dataset over one split
pub mod dataset;

/// Burn Batcher producing padded tensors
pub mod batcher;
