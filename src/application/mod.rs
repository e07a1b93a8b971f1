// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one goal (training a model or
// evaluating a checkpoint).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing (that's Layer 1)
//   - Only workflow coordination and backend selection

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{activitynet::ActivityNetSource, tacos::TacosSource};
use crate::domain::traits::AnnotationSource;

// The training workflow
pub mod train_use_case;

// Scoring a saved checkpoint on one split
pub mod eval_use_case;

/// The benchmark a run reads its annotations from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorpusKind {
    Tacos,
    ActivityNet,
}

impl CorpusKind {
    pub fn source(self, textual_data_path: &Path) -> Box<dyn AnnotationSource> {
        match self {
            CorpusKind::Tacos       => Box::new(TacosSource::new(textual_data_path)),
            CorpusKind::ActivityNet => Box::new(ActivityNetSource::new(textual_data_path)),
        }
    }
}

/// Tensor backend the model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// GPU through wgpu
    Wgpu,
    /// CPU through ndarray
    NdArray,
}

/// On-disk TACoS-shaped corpus shared by the use-case tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::{fs, path::PathBuf};

    use tempfile::TempDir;

    use crate::application::{train_use_case::TrainConfig, BackendKind};
    use crate::data::{
        corpus::feature_path,
        npy::{to_npy_bytes, FeatureMatrix},
    };

    pub struct TinyCorpus {
        pub dir:     TempDir,
        pub textual: PathBuf,
        pub visual:  PathBuf,
        pub glove:   PathBuf,
    }

    impl TinyCorpus {
        /// One 8-step video with two captions in every split.
        pub fn new() -> Self {
            let dir     = tempfile::tempdir().unwrap();
            let textual = dir.path().join("textual");
            let visual  = dir.path().join("visual");
            fs::create_dir_all(&textual).unwrap();
            fs::create_dir_all(&visual).unwrap();

            let split = r#"{
                "v1.avi": {
                    "fps": 10.0, "num_frames": 40,
                    "timestamps": [[0, 10], [20, 40]],
                    "sentences": ["a person cuts", "a person washes"]
                }
            }"#;
            for name in ["train.json", "val.json", "test.json"] {
                fs::write(textual.join(name), split).unwrap();
            }
            let feats = FeatureMatrix::new(8, 3, (0..24).map(|i| i as f32 / 24.0).collect()).unwrap();
            fs::write(feature_path(&visual, "v1"), to_npy_bytes(&feats)).unwrap();

            let glove = dir.path().join("glove.txt");
            fs::write(&glove, "a 0.1 0.2\nperson 0.3 0.1\ncuts -0.2 0.5\n").unwrap();

            Self { dir, textual, visual, glove }
        }

        pub fn model_save_path(&self) -> PathBuf {
            self.dir.path().join("ckpt").join("model.bin")
        }

        /// Small CPU run: 4 iterations, validation every 2.
        pub fn train_config(&self) -> TrainConfig {
            TrainConfig {
                textual_data_path:   self.textual.clone(),
                visual_data_path:    self.visual.clone(),
                word_vectors:        self.glove.clone(),
                model_save_path:     self.model_save_path(),
                log_dir:             self.dir.path().join("runs"),
                backend:             BackendKind::NdArray,
                fps:                 Some(10.0),
                sample_rate:         Some(5),
                batch_size:          2,
                hidden_size_textual: 4,
                hidden_size_visual:  4,
                hidden_size_ilstm:   4,
                attention_size:      4,
                k:                   2,
                delta:               1,
                log_every:           1,
                valid_niter:         2,
                max_iter:            4,
                ..TrainConfig::default()
            }
        }
    }
}
