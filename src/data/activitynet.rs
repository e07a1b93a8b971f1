// ============================================================
// Layer 4 — ActivityNet Captions Annotation Source
// ============================================================
// Files: train.json, val_1.json (validation), val_2.json (test).
//
//   "v_QOlSCBRmfWY": {
//     "duration": 82.73,
//     "timestamps": [[0.83, 19.86], [17.37, 60.81], ...],   ← seconds
//     "sentences":  ["A young woman is seen standing ...", ...]
//   }

use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::preprocessor::Preprocessor;
use crate::domain::{
    caption::{Caption, Split},
    traits::AnnotationSource,
};

pub const ACTIVITYNET_FPS: f64 = 25.0;
pub const ACTIVITYNET_SAMPLE_RATE: usize = 16;

#[derive(Debug, Deserialize)]
struct ActivityNetVideo {
    duration:   f64,
    timestamps: Vec<[f64; 2]>,
    sentences:  Vec<String>,
}

pub struct ActivityNetSource {
    dir:          PathBuf,
    preprocessor: Preprocessor,
}

impl ActivityNetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), preprocessor: Preprocessor::new() }
    }

    fn split_file(split: Split) -> &'static str {
        match split {
            Split::Train => "train.json",
            Split::Val   => "val_1.json",
            Split::Test  => "val_2.json",
        }
    }

    fn parse(&self, json: &str) -> Result<Vec<Caption>> {
        let videos: BTreeMap<String, ActivityNetVideo> = serde_json::from_str(json)?;
        let mut captions = Vec::new();

        for (video_id, video) in videos {
            if video.timestamps.len() != video.sentences.len() {
                tracing::warn!(
                    "{}: {} timestamps but {} sentences, extra entries ignored",
                    video_id,
                    video.timestamps.len(),
                    video.sentences.len()
                );
            }
            let duration = video.duration.max(0.0);

            for ([start, end], sentence) in video.timestamps.iter().zip(&video.sentences) {
                let tokens = self.preprocessor.tokenize(sentence);
                if tokens.is_empty() {
                    continue;
                }
                captions.push(Caption::new(
                    video_id.clone(),
                    tokens,
                    start.clamp(0.0, duration),
                    end.clamp(0.0, duration),
                ));
            }
        }
        Ok(captions)
    }
}

impl AnnotationSource for ActivityNetSource {
    fn name(&self) -> &'static str {
        "ActivityNet Captions"
    }

    fn load_split(&self, split: Split) -> Result<Vec<Caption>> {
        let path = self.dir.join(Self::split_file(split));
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read ActivityNet annotations '{}'", path.display())
        })?;
        self.parse(&json)
            .with_context(|| format!("Invalid ActivityNet annotations in '{}'", path.display()))
    }

    fn default_fps(&self) -> f64 {
        ACTIVITYNET_FPS
    }

    fn default_sample_rate(&self) -> usize {
        ACTIVITYNET_SAMPLE_RATE
    }
}
