// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `eval`, and all their
// configurable flags. Flag names follow the paper's notation where
// it has one (`--K`, `--delta`, `--threshold`).
//
// clap's derive macros generate the help text, the error messages
// for missing arguments and the string → number conversions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    eval_use_case::EvalConfig, train_use_case::TrainConfig, BackendKind, CorpusKind,
};
use crate::domain::caption::Split;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train TGN with validation-driven early stopping
    Train(TrainArgs),

    /// Score a saved checkpoint with R@N, IoU=θ
    Eval(EvalArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusArg {
    /// TACoS (cooking videos, frame-indexed annotations)
    Tacos,
    /// ActivityNet Captions (annotations in seconds)
    Acnet,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Wgpu,
    Ndarray,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitArg {
    Val,
    Test,
}

/// Options shared by `train` and `eval`.
#[derive(Args, Debug)]
pub struct DataArgs {
    /// Which benchmark the annotations belong to
    #[arg(value_enum)]
    pub corpus: CorpusArg,

    /// Directory containing the annotation JSON files
    #[arg(long)]
    pub textual_data_path: PathBuf,

    /// Directory containing one <video_id>.npy feature file per video
    #[arg(long)]
    pub visual_data_path: PathBuf,

    /// Pretrained word vectors in GloVe text format
    #[arg(long, default_value = "glove.6B.50d.txt")]
    pub word_vectors: PathBuf,

    /// Frames per second of the source videos (corpus default if omitted)
    #[arg(long)]
    pub fps: Option<f64>,

    /// Video frames covered by one feature step (corpus default if omitted)
    #[arg(long)]
    pub sample_rate: Option<usize>,

    /// Tensor backend
    #[arg(long, value_enum, default_value = "wgpu")]
    pub backend: BackendArg,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Number of candidate durations per time step (K in the paper)
    #[arg(long = "K", default_value_t = 16)]
    pub k: usize,

    /// Width of the shortest candidate in feature steps (δ in the paper)
    #[arg(long, default_value_t = 4)]
    pub delta: usize,

    /// IoU a candidate needs to count as positive (θ in the paper)
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long = "hidden-size-textual-lstm", default_value_t = 512)]
    pub hidden_size_textual: usize,

    #[arg(long = "hidden-size-visual-lstm", default_value_t = 512)]
    pub hidden_size_visual: usize,

    #[arg(long, default_value_t = 512)]
    pub hidden_size_ilstm: usize,

    /// Size of the word-attention projection
    #[arg(long, default_value_t = 256)]
    pub attention_size: usize,

    /// Log the training loss every this many iterations
    #[arg(long, default_value_t = 10)]
    pub log_every: usize,

    /// Maximum number of training iterations
    #[arg(long, default_value_t = 10000)]
    pub max_iter: usize,

    /// Initial learning rate
    #[arg(long, default_value_t = 0.001)]
    pub lr: f64,

    /// Validations without improvement before the learning rate decays
    #[arg(long, default_value_t = 2)]
    pub patience: usize,

    /// Decay trials before training stops early
    #[arg(long, default_value_t = 3)]
    pub max_num_trial: usize,

    /// Where the best model is saved (+ .optim and .json next to it)
    #[arg(long, default_value = "model.bin")]
    pub model_save_path: PathBuf,

    /// Validate every this many iterations
    #[arg(long, default_value_t = 50)]
    pub valid_niter: usize,

    /// N in the R@N, IoU=θ validation metric
    #[arg(long, default_value_t = 1)]
    pub top_n_eval: usize,

    /// Multiplicative learning rate decay per trial
    #[arg(long, default_value_t = 0.5)]
    pub lr_decay: f64,

    /// Directory for the scalar log (scalars.csv)
    #[arg(long, default_value = "runs")]
    pub log_dir: PathBuf,

    /// Seed for parameter initialisation and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Split to score
    #[arg(long, value_enum, default_value = "val")]
    pub split: SplitArg,

    /// Checkpoint written by `train`
    #[arg(long, default_value = "model.bin")]
    pub model_save_path: PathBuf,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    #[arg(long, default_value_t = 1)]
    pub top_n_eval: usize,
}

// ─── Layer 1 → Layer 2 conversions ────────────────────────────────────────────
// The application layer never sees clap types.

impl From<CorpusArg> for CorpusKind {
    fn from(a: CorpusArg) -> Self {
        match a {
            CorpusArg::Tacos => CorpusKind::Tacos,
            CorpusArg::Acnet => CorpusKind::ActivityNet,
        }
    }
}

impl From<BackendArg> for BackendKind {
    fn from(a: BackendArg) -> Self {
        match a {
            BackendArg::Wgpu    => BackendKind::Wgpu,
            BackendArg::Ndarray => BackendKind::NdArray,
        }
    }
}

impl From<SplitArg> for Split {
    fn from(a: SplitArg) -> Self {
        match a {
            SplitArg::Val  => Split::Val,
            SplitArg::Test => Split::Test,
        }
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            corpus:              a.data.corpus.into(),
            textual_data_path:   a.data.textual_data_path,
            visual_data_path:    a.data.visual_data_path,
            word_vectors:        a.data.word_vectors,
            model_save_path:     a.model_save_path,
            log_dir:             a.log_dir,
            backend:             a.data.backend.into(),
            seed:                a.seed,
            batch_size:          a.batch_size,
            hidden_size_textual: a.hidden_size_textual,
            hidden_size_visual:  a.hidden_size_visual,
            hidden_size_ilstm:   a.hidden_size_ilstm,
            attention_size:      a.attention_size,
            k:                   a.k,
            delta:               a.delta,
            threshold:           a.threshold,
            fps:                 a.data.fps,
            sample_rate:         a.data.sample_rate,
            log_every:           a.log_every,
            max_iter:            a.max_iter,
            valid_niter:         a.valid_niter,
            lr:                  a.lr,
            lr_decay:            a.lr_decay,
            patience:            a.patience,
            max_num_trial:       a.max_num_trial,
            top_n_eval:          a.top_n_eval,
        }
    }
}

impl From<EvalArgs> for EvalConfig {
    fn from(a: EvalArgs) -> Self {
        EvalConfig {
            corpus:            a.data.corpus.into(),
            textual_data_path: a.data.textual_data_path,
            visual_data_path:  a.data.visual_data_path,
            word_vectors:      a.data.word_vectors,
            model_save_path:   a.model_save_path,
            backend:           a.data.backend.into(),
            split:             a.split.into(),
            batch_size:        a.batch_size,
            threshold:         a.threshold,
            top_n_eval:        a.top_n_eval,
            fps:               a.data.fps,
            sample_rate:       a.data.sample_rate,
        }
    }
}
