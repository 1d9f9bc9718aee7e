use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use subvec::trainer::features_path;
use subvec::{Args, Trainer};

mod logging;

use logging::LogArgs;

#[derive(Parser)]
#[command(about = "Train word and sub-token vectors with skip-gram", long_about = None, version)]
struct Options {
    #[command(flatten)]
    args: Args,

    /// Use FILE to save the resulting word vectors
    #[arg(long = "output", value_name = "FILE")]
    output_file: PathBuf,

    /// Save the resulting vectors in binary mode
    #[arg(long)]
    binary: bool,

    /// Also save the whole model (vocabulary, features, both matrices) in
    /// bincode format to FILE
    #[arg(long = "save-model", value_name = "FILE")]
    model_file: Option<PathBuf>,

    /// The vocabulary will be saved to FILE
    #[arg(long = "save-vocab", value_name = "FILE")]
    save_vocab_file: Option<PathBuf>,

    #[command(flatten)]
    log: LogArgs,
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{elapsed_precise} [{bar:40}] {percent:>3}% {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.enable_steady_tick(Duration::from_millis(500));
    bar
}

fn run(options: Options) -> Result<()> {
    let mut trainer = Trainer::new(options.args).context("error building vocabulary")?;
    if let Some(f) = &options.save_vocab_file {
        trainer
            .dictionary()
            .save_vocab(f)
            .context("error writing vocab file")?;
    }
    if options.log.shows_info(3) {
        trainer.set_progress(progress_bar());
    }

    trainer.train().context("training failed")?;

    trainer
        .save_vectors(&options.output_file, options.binary)
        .context("error writing output file")?;
    if trainer.dictionary().nfeatures() > 0 {
        let path = features_path(&options.output_file);
        trainer
            .save_features(&path, options.binary)
            .with_context(|| format!("error writing feature vectors to {}", path.display()))?;
    }
    if let Some(f) = &options.model_file {
        trainer.save_model(f).context("error writing model file")?;
    }
    Ok(())
}

fn main() {
    let options = Options::parse();
    if let Err(err) = options.log.setup_logging(3) {
        eprintln!("{err}");
        process::exit(1);
    }

    if let Err(err) = run(options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
