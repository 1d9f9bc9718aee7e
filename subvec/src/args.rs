use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::real;

/// Which sub-token features, if any, are attached to each word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum ModelName {
    /// Plain skip-gram: words only.
    Plain,
    /// Character n-grams of `<word>`.
    Subword,
    /// Corpus tokens are `word<SEP>radical`; the radical is the feature.
    Subchar,
    /// Features come from an external word-to-feature map.
    Subradical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum LossName {
    /// Negative sampling.
    Ns,
    /// Hierarchical softmax (not implemented).
    Hs,
    /// Full softmax (not implemented).
    Softmax,
}

impl fmt::Display for LossName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LossName::Ns => "ns",
            LossName::Hs => "hs",
            LossName::Softmax => "softmax",
        })
    }
}

/// Training configuration shared by the dictionary, the model and the trainer.
#[derive(clap::Args, Clone, Debug, Serialize, Deserialize)]
pub struct Args {
    /// Use text data from FILE to train the model
    #[arg(long = "train", value_name = "FILE")]
    pub input: PathBuf,

    /// Sub-token features attached to each word
    #[arg(long, value_enum, default_value_t = ModelName::Subword)]
    pub model: ModelName,

    /// Training objective; only negative sampling is implemented
    #[arg(long, value_enum, default_value_t = LossName::Ns)]
    pub loss: LossName,

    /// Size of word vectors
    #[arg(long, default_value_t = 100)]
    pub dim: usize,

    /// Max skip length between words
    #[arg(long = "window", default_value_t = 5)]
    pub ws: usize,

    /// Number of passes over the training data
    #[arg(long, default_value_t = 5)]
    pub epoch: usize,

    /// Discard words that appear less than N times
    #[arg(long = "min-count", value_name = "N", default_value_t = 5)]
    pub min_count: u64,

    /// Number of negative examples per positive one
    #[arg(long, default_value_t = 5)]
    pub neg: usize,

    /// Min length of character n-grams
    #[arg(long, default_value_t = 3)]
    pub minn: usize,

    /// Max length of character n-grams
    #[arg(long, default_value_t = 6)]
    pub maxn: usize,

    /// Threshold for occurrence of words. Those that appear with higher
    /// frequency in the training data will be randomly down-sampled
    #[arg(long = "sample", default_value_t = 1e-4)]
    pub t: real,

    /// Starting learning rate
    #[arg(long, default_value_t = 0.05)]
    pub lr: real,

    /// Number of tokens a worker processes between learning rate updates
    #[arg(long = "lr-update-rate", default_value_t = 100)]
    pub lr_update_rate: u64,

    /// Use N threads
    #[arg(long = "threads", value_name = "N", default_value_t = 12)]
    pub thread: usize,

    /// Character separating a word from its radical in `subchar` corpora
    #[arg(long, default_value_t = '_')]
    pub separator: char,

    /// Feature used for words missing from the feature map
    #[arg(long, default_value = "unk")]
    pub placeholder: String,

    /// Word-to-feature map used by the `subradical` model
    #[arg(long = "feature-map", value_name = "FILE")]
    pub feature_map: Option<PathBuf>,

    /// Seed for weight initialisation and the negative table shuffle
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            input: PathBuf::new(),
            model: ModelName::Subword,
            loss: LossName::Ns,
            dim: 100,
            ws: 5,
            epoch: 5,
            min_count: 5,
            neg: 5,
            minn: 3,
            maxn: 6,
            t: 1e-4,
            lr: 0.05,
            lr_update_rate: 100,
            thread: 12,
            separator: '_',
            placeholder: "unk".to_string(),
            feature_map: None,
            seed: 1,
        }
    }
}

impl Args {
    /// Reject configurations the trainer cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidArgument(msg.to_string()));
        if self.dim == 0 {
            return invalid("--dim must be positive");
        }
        if self.ws == 0 {
            return invalid("--window must be positive");
        }
        if self.epoch == 0 {
            return invalid("--epoch must be positive");
        }
        if self.thread == 0 {
            return invalid("--threads must be positive");
        }
        if self.model == ModelName::Subword && (self.minn == 0 || self.minn > self.maxn) {
            return invalid("n-gram bounds must satisfy 0 < --minn <= --maxn");
        }
        if self.model == ModelName::Subradical && self.feature_map.is_none() {
            return invalid("the subradical model needs --feature-map");
        }
        if self.loss != LossName::Ns {
            return Err(Error::UnsupportedLoss(self.loss));
        }
        Ok(())
    }
}
