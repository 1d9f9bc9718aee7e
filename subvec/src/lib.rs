//! Skip-gram embeddings for words and their sub-token features (character
//! n-grams, radicals, or entries of an external feature map), trained with
//! negative sampling by several lock-free threads.

pub mod alphabet;
pub mod args;
pub mod dictionary;
pub mod error;
pub mod features;
pub mod matrix;
pub mod model;
pub mod reader;
pub mod trainer;
pub mod vectors;

pub use args::{Args, LossName, ModelName};
pub use dictionary::{Dictionary, Entry, Line};
pub use error::{Error, Result};
pub use model::{Approx, Model, NegativeTable};
pub use reader::Corpus;
pub use trainer::Trainer;
pub use vectors::Vectors;

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers

/// End-of-sentence token, produced once per line of input.
pub const EOS: &str = "</s>";
/// Begin-of-word marker.
pub const BOW: &str = "<";
/// End-of-word marker.
pub const EOW: &str = ">";
