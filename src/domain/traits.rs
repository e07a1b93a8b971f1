// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop and the use cases only ever talk to these
// traits, so corpora and monitoring back-ends can be swapped
// without touching the loop:
//   - TacosSource / ActivityNetSource implement AnnotationSource
//   - ScalarLog (CSV on disk) implements ScalarSink,
//     and tests use an in-memory Vec

use anyhow::Result;

use crate::domain::caption::{Caption, Split};

// ─── AnnotationSource ─────────────────────────────────────────────────────────
/// Any benchmark corpus that can produce captions per split.
pub trait AnnotationSource {
    /// Short corpus name used in log lines
    fn name(&self) -> &'static str;

    /// Load every caption of the given split.
    fn load_split(&self, split: Split) -> Result<Vec<Caption>>;

    /// Frame rate the annotations and features were extracted at
    fn default_fps(&self) -> f64;

    /// Number of video frames covered by one visual feature step
    fn default_sample_rate(&self) -> usize;
}

// ─── ScalarSink ───────────────────────────────────────────────────────────────
/// Receives scalar time series (training loss, validation score).
pub trait ScalarSink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()>;
}

impl ScalarSink for Vec<(String, f64, usize)> {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        self.push((tag.to_string(), value, step));
        Ok(())
    }
}
