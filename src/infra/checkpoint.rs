// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the best model, its optimiser state and the
// architecture config.
//
// Files written for `--model-save-path model.bin`:
//   model.bin        model record (named MessagePack, full precision)
//   model.bin.optim  Adam moment estimates
//   model.bin.json   TgnConfig, so `eval` can rebuild the network
//
// The two records are always written together and only on a
// validation improvement. Burn's file recorders append their own
// extension, so records are serialised to bytes and written to the
// exact paths above.
//
// Loading fails if the architecture does not match the record.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    config::Config,
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::ml::model::{Tgn, TgnConfig};

type CheckpointRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

pub struct CheckpointManager {
    model_path: PathBuf,
}

impl CheckpointManager {
    pub fn new(model_save_path: impl Into<PathBuf>) -> Self {
        Self { model_path: model_save_path.into() }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn optim_path(&self) -> PathBuf {
        with_suffix(&self.model_path, ".optim")
    }

    pub fn config_path(&self) -> PathBuf {
        with_suffix(&self.model_path, ".json")
    }

    /// Write model and optimiser records side by side.
    pub fn save<B, O>(&self, model: &Tgn<B>, optim: &O) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<Tgn<B>, B>,
    {
        ensure_parent(&self.model_path)?;
        let recorder = CheckpointRecorder::new();

        let model_bytes = recorder
            .record(model.clone().into_record(), ())
            .context("Failed to serialise model record")?;
        fs::write(&self.model_path, model_bytes)
            .with_context(|| format!("Failed to write checkpoint '{}'", self.model_path.display()))?;

        let optim_path  = self.optim_path();
        let optim_bytes = recorder
            .record(optim.to_record(), ())
            .context("Failed to serialise optimizer record")?;
        fs::write(&optim_path, optim_bytes)
            .with_context(|| format!("Failed to write optimizer state '{}'", optim_path.display()))?;

        tracing::info!("saved model parameters to [{}]", self.model_path.display());
        Ok(())
    }

    /// Restore model weights into a network of the same architecture.
    pub fn load_model<B: Backend>(&self, model: Tgn<B>, device: &B::Device) -> Result<Tgn<B>> {
        let bytes = fs::read(&self.model_path).with_context(|| {
            format!(
                "Cannot read checkpoint '{}'. Have you trained the model first?",
                self.model_path.display()
            )
        })?;
        let record = CheckpointRecorder::new()
            .load(bytes, device)
            .with_context(|| format!("Checkpoint '{}' does not match the model", self.model_path.display()))?;

        tracing::debug!("Loaded model from '{}'", self.model_path.display());
        Ok(model.load_record(record))
    }

    /// Restore optimiser state saved next to the model.
    pub fn load_optimizer<B, O>(&self, optim: O, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        O: Optimizer<Tgn<B>, B>,
    {
        let path  = self.optim_path();
        let bytes = fs::read(&path)
            .with_context(|| format!("Cannot read optimizer state '{}'", path.display()))?;
        let record = CheckpointRecorder::new()
            .load(bytes, device)
            .with_context(|| format!("Optimizer state '{}' is unreadable", path.display()))?;

        tracing::debug!("Loaded optimizer state from '{}'", path.display());
        Ok(optim.load_record(record))
    }

    pub fn save_config(&self, cfg: &TgnConfig) -> Result<()> {
        let path = self.config_path();
        ensure_parent(&path)?;
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TgnConfig> {
        let path = self.config_path();
        TgnConfig::load(&path).with_context(|| {
            format!(
                "Cannot read model config from '{}'. Make sure you have run 'train' before 'eval'.",
                path.display()
            )
        })
    }
}

/// `model.bin` + `.optim` → `model.bin.optim`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create directory '{}'", dir.display())),
        _ => Ok(()),
    }
}
