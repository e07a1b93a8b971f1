// ============================================================
// Layer 4 — Grounding Corpus
// ============================================================
// Joins the captions of an AnnotationSource with the per-video
// visual features on disk, and exposes the corpus statistics the
// rest of the pipeline needs:
//
//   visual_feature_size  D of every feature matrix
//   fps                  frames per second of the source videos
//   sample_rate          frames covered by one feature step
//
// A feature step therefore lasts `sample_rate / fps` seconds,
// which is how gold timestamps (seconds) are mapped onto the
// proposal grid (steps) and back.
//
// Features are read once, up front, for every video referenced by
// a loaded split. Captions whose video has no feature file are
// dropped with a warning.

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};

use crate::data::npy::{read_npy, FeatureMatrix};
use crate::domain::{
    caption::{Caption, Split},
    traits::AnnotationSource,
};

/// Optional overrides of the corpus defaults.
#[derive(Debug, Clone, Default)]
pub struct CorpusOverrides {
    pub fps:         Option<f64>,
    pub sample_rate: Option<usize>,
}

pub struct GroundingCorpus {
    name:                &'static str,
    captions:            HashMap<Split, Arc<Vec<Caption>>>,
    features:            Arc<HashMap<String, Arc<FeatureMatrix>>>,
    visual_feature_size: usize,
    fps:                 f64,
    sample_rate:         usize,
}

impl GroundingCorpus {
    /// Load the requested splits and every feature file they reference.
    pub fn load(
        source:     &dyn AnnotationSource,
        visual_dir: impl AsRef<Path>,
        splits:     &[Split],
        overrides:  &CorpusOverrides,
    ) -> Result<Self> {
        let visual_dir = visual_dir.as_ref();

        let mut raw = HashMap::new();
        for &split in splits {
            let captions = source.load_split(split)?;
            tracing::info!("{} {}: {} captions", source.name(), split, captions.len());
            raw.insert(split, captions);
        }

        let video_ids: BTreeSet<&str> = raw
            .values()
            .flatten()
            .map(|c| c.video_id.as_str())
            .collect();

        let mut features = HashMap::new();
        for id in video_ids {
            let path = feature_path(visual_dir, id);
            if !path.exists() {
                tracing::warn!("No visual features for '{}' at '{}'", id, path.display());
                continue;
            }
            features.insert(id.to_string(), Arc::new(read_npy(&path)?));
        }
        tracing::info!("Loaded visual features for {} videos", features.len());

        let captions = raw
            .into_iter()
            .map(|(split, captions)| {
                let before = captions.len();
                let kept: Vec<Caption> = captions
                    .into_iter()
                    .filter(|c| features.contains_key(&c.video_id))
                    .collect();
                if kept.len() < before {
                    tracing::warn!(
                        "{}: dropped {} captions without visual features",
                        split,
                        before - kept.len()
                    );
                }
                (split, kept)
            })
            .collect();

        let fps         = overrides.fps.unwrap_or_else(|| source.default_fps());
        let sample_rate = overrides.sample_rate.unwrap_or_else(|| source.default_sample_rate());

        Self::from_parts(source.name(), captions, features, fps, sample_rate)
    }

    /// Assemble a corpus from in-memory parts, checking its invariants.
    pub fn from_parts(
        name:        &'static str,
        captions:    HashMap<Split, Vec<Caption>>,
        features:    HashMap<String, Arc<FeatureMatrix>>,
        fps:         f64,
        sample_rate: usize,
    ) -> Result<Self> {
        if !(fps > 0.0) {
            bail!("fps must be positive, got {fps}");
        }
        if sample_rate == 0 {
            bail!("sample rate must be positive");
        }

        let mut dims = features.values().map(|f| f.dim);
        let visual_feature_size = match dims.next() {
            Some(d) => d,
            None => bail!("no visual features were loaded"),
        };
        if let Some(other) = dims.find(|&d| d != visual_feature_size) {
            bail!("inconsistent visual feature sizes: {visual_feature_size} and {other}");
        }

        Ok(Self {
            name,
            captions: captions.into_iter().map(|(s, c)| (s, Arc::new(c))).collect(),
            features: Arc::new(features),
            visual_feature_size,
            fps,
            sample_rate,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Captions of a split; empty when the split was not loaded.
    pub fn captions(&self, split: Split) -> Arc<Vec<Caption>> {
        self.captions.get(&split).cloned().unwrap_or_default()
    }

    /// Captions of a split, or an error when it holds no sample.
    pub fn non_empty_captions(&self, split: Split) -> Result<Arc<Vec<Caption>>> {
        let captions = self.captions(split);
        if captions.is_empty() {
            bail!("{} split of {} has no usable captions", split, self.name);
        }
        Ok(captions)
    }

    pub fn features(&self, video_id: &str) -> Option<Arc<FeatureMatrix>> {
        self.features.get(video_id).cloned()
    }

    /// Shared handle on every loaded feature matrix
    pub fn feature_table(&self) -> Arc<HashMap<String, Arc<FeatureMatrix>>> {
        Arc::clone(&self.features)
    }

    pub fn visual_feature_size(&self) -> usize {
        self.visual_feature_size
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    /// Duration of one feature step in seconds
    pub fn step_seconds(&self) -> f64 {
        self.sample_rate as f64 / self.fps
    }

    /// `(video_len, gold_in_steps)` for every caption of a split
    pub fn gold_steps(&self, split: Split) -> Vec<(usize, (f64, f64))> {
        let step = self.step_seconds();
        self.captions(split)
            .iter()
            .filter_map(|c| {
                let video = self.features.get(&c.video_id)?;
                Some((video.steps, (c.start_time / step, c.end_time / step)))
            })
            .collect()
    }
}

pub fn feature_path(visual_dir: &Path, video_id: &str) -> PathBuf {
    visual_dir.join(format!("{video_id}.npy"))
}
