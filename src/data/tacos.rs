// ============================================================
// Layer 4 — TACoS Annotation Source
// ============================================================
// TACoS ships one JSON file per split:
//
//   <textual-data-path>/train.json
//   <textual-data-path>/val.json
//   <textual-data-path>/test.json
//
// each an object keyed by video file name:
//
//   "s13-d21.avi": {
//     "fps": 29.4, "num_frames": 5325,
//     "timestamps": [[12, 380], ...],     ← frame indices
//     "sentences":  ["He takes out a cutting board.", ...]
//   }
//
// Frame indices are converted to seconds with the video's own fps
// (falling back to the corpus default).

use std::{collections::BTreeMap, fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::preprocessor::Preprocessor;
use crate::domain::{
    caption::{Caption, Split},
    traits::AnnotationSource,
};

pub const TACOS_FPS: f64 = 29.4;
pub const TACOS_SAMPLE_RATE: usize = 5;

#[derive(Debug, Deserialize)]
struct TacosVideo {
    #[serde(default)]
    fps:        Option<f64>,
    #[serde(default)]
    num_frames: Option<f64>,
    timestamps: Vec<[f64; 2]>,
    sentences:  Vec<String>,
}

pub struct TacosSource {
    dir:          PathBuf,
    preprocessor: Preprocessor,
}

impl TacosSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), preprocessor: Preprocessor::new() }
    }

    fn split_file(split: Split) -> &'static str {
        match split {
            Split::Train => "train.json",
            Split::Val   => "val.json",
            Split::Test  => "test.json",
        }
    }

    fn parse(&self, json: &str) -> Result<Vec<Caption>> {
        let videos: BTreeMap<String, TacosVideo> = serde_json::from_str(json)?;
        let mut captions = Vec::new();

        for (file_name, video) in videos {
            let video_id = file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| file_name.clone());
            let fps = video.fps.filter(|f| *f > 0.0).unwrap_or(TACOS_FPS);

            if video.timestamps.len() != video.sentences.len() {
                tracing::warn!(
                    "{}: {} timestamps but {} sentences, extra entries ignored",
                    file_name,
                    video.timestamps.len(),
                    video.sentences.len()
                );
            }

            for ([start, end], sentence) in video.timestamps.iter().zip(&video.sentences) {
                let tokens = self.preprocessor.tokenize(sentence);
                if tokens.is_empty() {
                    tracing::debug!("{}: skipping empty sentence {:?}", file_name, sentence);
                    continue;
                }
                let last = video.num_frames.map(|n| n.max(0.0)).unwrap_or(f64::MAX);
                let start = start.clamp(0.0, last) / fps;
                let end   = end.clamp(0.0, last) / fps;
                captions.push(Caption::new(video_id.clone(), tokens, start, end));
            }
        }
        Ok(captions)
    }
}

impl AnnotationSource for TacosSource {
    fn name(&self) -> &'static str {
        "TACoS"
    }

    fn load_split(&self, split: Split) -> Result<Vec<Caption>> {
        let path = self.dir.join(Self::split_file(split));
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read TACoS annotations '{}'", path.display()))?;
        self.parse(&json)
            .with_context(|| format!("Invalid TACoS annotations in '{}'", path.display()))
    }

    fn default_fps(&self) -> f64 {
        TACOS_FPS
    }

    fn default_sample_rate(&self) -> usize {
        TACOS_SAMPLE_RATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "s13-d21.avi": {
            "fps": 10.0, "num_frames": 200,
            "timestamps": [[20, 50], [300, 100]],
            "sentences": ["He takes out a cutting board.", "He washes the cucumber"]
        },
        "s14-d22.avi": {
            "timestamps": [[0, 294]],
            "sentences": ["..."]
        }
    }"#;

    #[test]
    fn test_frames_become_seconds() {
        let captions = TacosSource::new("unused").parse(SAMPLE).unwrap();
        // the "..." sentence is dropped
        assert_eq!(captions.len(), 2);

        let first = &captions[0];
        assert_eq!(first.video_id, "s13-d21");
        assert_eq!(first.tokens[0], "he");
        assert_eq!((first.start_time, first.end_time), (2.0, 5.0));

        // 300 is clamped to num_frames and the pair is reordered
        let second = &captions[1];
        assert_eq!((second.start_time, second.end_time), (10.0, 20.0));
    }

    #[test]
    fn test_load_split_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("val.json"), SAMPLE).unwrap();
        let source = TacosSource::new(dir.path());
        assert_eq!(source.load_split(Split::Val).unwrap().len(), 2);
        assert!(source.load_split(Split::Train).is_err());
    }

    #[test]
    fn test_negative_frame_count_clamps_to_zero() {
        let json = r#"{
            "broken.avi": {
                "fps": 10.0, "num_frames": -5,
                "timestamps": [[20, 50]],
                "sentences": ["he slices bread"]
            }
        }"#;
        let captions = TacosSource::new("unused").parse(json).unwrap();
        assert_eq!(captions.len(), 1);
        assert_eq!((captions[0].start_time, captions[0].end_time), (0.0, 0.0));
    }
}
