//! Sub-token features: the units that get their own rows in the input matrix
//! alongside whole words.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::args::{Args, ModelName};
use crate::error::{Error, Result};
use crate::{BOW, EOS, EOW};

/// Produces the feature strings for one vocabulary unit.
pub trait FeatureExtractor: Send + Sync {
    /// Features for `unit`, in a fixed order. The result may be empty.
    fn extract(&self, unit: &str) -> Result<Vec<String>>;
}

/// Wrap `s` in the begin/end-of-word markers.
pub fn bracket(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + BOW.len() + EOW.len());
    out.push_str(BOW);
    out.push_str(s);
    out.push_str(EOW);
    out
}

/// Split a `word<SEP>radical` token on the last separator.
pub fn split_tagged(token: &str, separator: char) -> Option<(&str, &str)> {
    token.rsplit_once(separator)
}

/// All substrings of `word` that are `minn..=maxn` characters long.
///
/// Substrings always start and end on character boundaries. Single
/// characters at either end of `word` are skipped, so bracketed words don't
/// produce the bare `<` and `>` markers as features.
pub fn char_ngrams(word: &str, minn: usize, maxn: usize) -> Vec<&str> {
    let bounds: Vec<usize> = word
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(word.len()))
        .collect();
    let nchars = bounds.len() - 1;

    let mut ngrams = vec![];
    for start in 0..nchars {
        for n in minn.max(1)..=maxn {
            let end = start + n;
            if end > nchars {
                break;
            }
            if n == 1 && (start == 0 || end == nchars) {
                continue;
            }
            ngrams.push(&word[bounds[start]..bounds[end]]);
        }
    }
    ngrams
}

/// Plain skip-gram: words have no features.
pub struct NoFeatures;

impl FeatureExtractor for NoFeatures {
    fn extract(&self, _unit: &str) -> Result<Vec<String>> {
        Ok(vec![])
    }
}

/// Character n-grams of the bracketed word.
pub struct CharNgrams {
    pub minn: usize,
    pub maxn: usize,
}

impl FeatureExtractor for CharNgrams {
    fn extract(&self, unit: &str) -> Result<Vec<String>> {
        if unit == EOS {
            return Ok(vec![]);
        }
        let word = bracket(unit);
        Ok(char_ngrams(&word, self.minn, self.maxn)
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}

/// The bracketed radical of a `word<SEP>radical` unit. `</s>` is its own
/// radical.
pub struct RadicalTag {
    pub separator: char,
}

impl FeatureExtractor for RadicalTag {
    fn extract(&self, unit: &str) -> Result<Vec<String>> {
        if unit == EOS {
            return Ok(vec![bracket(EOS)]);
        }
        match split_tagged(unit, self.separator) {
            Some((_, radical)) => Ok(vec![bracket(radical)]),
            None => Err(Error::MissingSeparator {
                token: unit.to_string(),
                separator: self.separator,
            }),
        }
    }
}

/// The bracketed entry for the word in an external map.
pub struct FeatureMap {
    pub map: HashMap<String, String>,
    pub placeholder: String,
}

impl FeatureExtractor for FeatureMap {
    fn extract(&self, unit: &str) -> Result<Vec<String>> {
        let feature = self.map.get(unit).unwrap_or(&self.placeholder);
        Ok(vec![bracket(feature)])
    }
}

/// Read a `word feature...` file. The first space separates the key from the
/// value. Lines without a space are skipped; later lines override earlier ones.
pub fn load_feature_map(path: &Path) -> Result<HashMap<String, String>> {
    let f = BufReader::new(File::open(path)?);
    let mut map = HashMap::new();
    let mut skipped = 0;
    for (line_num, line) in f.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        match line.split_once(' ') {
            Some((word, feature)) => {
                map.insert(word.to_string(), feature.trim().to_string());
            }
            None => {
                log::warn!(
                    "{}:{}: no space between word and feature, skipping",
                    path.display(),
                    line_num + 1
                );
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        log::warn!("skipped {skipped} malformed lines in {}", path.display());
    }
    log::info!("loaded {} feature map entries", map.len());
    Ok(map)
}

/// Pick the extractor for the configured model.
pub fn extractor_for(args: &Args) -> Result<Box<dyn FeatureExtractor>> {
    Ok(match args.model {
        ModelName::Plain => Box::new(NoFeatures),
        ModelName::Subword => Box::new(CharNgrams {
            minn: args.minn,
            maxn: args.maxn,
        }),
        ModelName::Subchar => Box::new(RadicalTag {
            separator: args.separator,
        }),
        ModelName::Subradical => {
            let path = args.feature_map.as_deref().ok_or_else(|| {
                Error::InvalidArgument("the subradical model needs --feature-map".to_string())
            })?;
            Box::new(FeatureMap {
                map: load_feature_map(path)?,
                placeholder: args.placeholder.clone(),
            })
        }
    })
}
