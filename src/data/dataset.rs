use std::{collections::HashMap, sync::Arc};

use burn::data::dataset::Dataset;

use crate::data::npy::FeatureMatrix;
use crate::domain::caption::Caption;

/// One query together with the features of its video.
#[derive(Debug, Clone)]
pub struct GroundingItem {
    pub caption:  Caption,
    pub features: Arc<FeatureMatrix>,
}

impl GroundingItem {
    pub fn video_len(&self) -> usize {
        self.features.steps
    }
}

/// Captions of one split, resolved against the shared feature table.
pub struct GroundingDataset {
    captions: Arc<Vec<Caption>>,
    features: Arc<HashMap<String, Arc<FeatureMatrix>>>,
}

impl GroundingDataset {
    /// Every caption is expected to have an entry in `features`;
    /// `GroundingCorpus` guarantees this for the splits it loads.
    pub fn new(
        captions: Arc<Vec<Caption>>,
        features: Arc<HashMap<String, Arc<FeatureMatrix>>>,
    ) -> Self {
        Self { captions, features }
    }
}

impl Dataset<GroundingItem> for GroundingDataset {
    fn get(&self, index: usize) -> Option<GroundingItem> {
        let caption  = self.captions.get(index)?;
        let features = self.features.get(&caption.video_id)?;
        Some(GroundingItem { caption: caption.clone(), features: Arc::clone(features) })
    }

    fn len(&self) -> usize {
        self.captions.len()
    }
}
