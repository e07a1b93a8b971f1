// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains TGN on a corpus, saving the best model
//   2. `eval`  — scores a saved model on the val or test split

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

use crate::ml::trainer::TrainOutcome;

#[derive(Parser, Debug)]
#[command(
    name = "tgn",
    version,
    about = "Train a Temporal Grounding Network to localise sentences in videos."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args)  => run_eval(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Training on {:?} from '{}'", args.data.corpus, args.data.textual_data_path.display());
    let save_path = args.model_save_path.clone();

    // Early stop is a normal way to finish; both outcomes exit 0
    match TrainUseCase::new(args.into()).execute()? {
        TrainOutcome::Completed { iterations, best_score } => {
            println!("Training complete after {iterations} iterations.");
            print_best(best_score, &save_path);
        }
        TrainOutcome::EarlyStopped { iterations, best_score } => {
            println!("Early stop after {iterations} iterations.");
            print_best(best_score, &save_path);
        }
    }
    Ok(())
}

fn print_best(best_score: Option<f64>, save_path: &std::path::Path) {
    match best_score {
        Some(score) => println!("Best validation score {score:.4}, model saved to '{}'.", save_path.display()),
        None        => println!("No validation was run; no model was saved."),
    }
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let report = EvalUseCase::new(args.into()).execute()?;
    println!(
        "{} R@{}, IoU={}: {:.4} ({} queries)",
        report.split, report.top_n, report.threshold, report.score, report.samples
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{train_use_case::TrainConfig, BackendKind, CorpusKind};
    use crate::domain::caption::Split;

    #[test]
    fn test_train_defaults_match_train_config() {
        let cli = Cli::try_parse_from([
            "tgn", "train", "tacos",
            "--textual-data-path", "ann",
            "--visual-data-path", "feats",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();

        assert_eq!(cfg.corpus, CorpusKind::Tacos);
        assert_eq!(cfg.backend, BackendKind::Wgpu);
        assert_eq!((cfg.k, cfg.delta, cfg.threshold), (def.k, def.delta, def.threshold));
        assert_eq!((cfg.batch_size, cfg.max_iter, cfg.valid_niter), (64, 10_000, 50));
        assert_eq!((cfg.patience, cfg.max_num_trial, cfg.lr_decay), (2, 3, 0.5));
        assert_eq!(cfg.model_save_path, std::path::PathBuf::from("model.bin"));
        assert_eq!(cfg.fps, None);
    }

    #[test]
    fn test_paper_style_flags() {
        let cli = Cli::try_parse_from([
            "tgn", "train", "acnet",
            "--textual-data-path", "ann",
            "--visual-data-path", "feats",
            "--K", "8",
            "--hidden-size-textual-lstm", "128",
            "--backend", "ndarray",
            "--fps", "30",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();

        assert_eq!(cfg.corpus, CorpusKind::ActivityNet);
        assert_eq!(cfg.k, 8);
        assert_eq!(cfg.hidden_size_textual, 128);
        assert_eq!(cfg.backend, BackendKind::NdArray);
        assert_eq!(cfg.fps, Some(30.0));
    }

    #[test]
    fn test_eval_split() {
        let cli = Cli::try_parse_from([
            "tgn", "eval", "tacos",
            "--textual-data-path", "ann",
            "--visual-data-path", "feats",
            "--split", "test",
        ])
        .unwrap();
        let Commands::Eval(args) = cli.command else { panic!("expected eval") };
        let cfg: crate::application::eval_use_case::EvalConfig = args.into();
        assert_eq!(cfg.split, Split::Test);
    }

    #[test]
    fn test_missing_paths_are_rejected() {
        assert!(Cli::try_parse_from(["tgn", "train", "tacos"]).is_err());
    }
}
