use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufWriter, Seek, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::alphabet::Alphabet;
use crate::args::{Args, ModelName};
use crate::error::{Error, Result};
use crate::features::{bracket, extractor_for, split_tagged, FeatureExtractor};
use crate::reader::Corpus;
use crate::{real, EOS};

/// Upper bound on the number of distinct words (and features) held at once.
pub const MAX_VOCAB_SIZE: usize = 30_000_000;

/// Lines longer than this many tokens are cut short.
pub const MAX_LINE_SIZE: u64 = 1024;

/// A retained word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub word: String,
    pub count: u64,
    /// Ids of the word's features, already offset by the number of words.
    pub features: Vec<usize>,
}

/// Training examples drawn from one line of the corpus.
///
/// Example `i` predicts `targets[i]` from the input rows `sources[i]`, which
/// hold the word id first and then its feature ids.
#[derive(Clone, Debug, Default)]
pub struct Line {
    pub sources: Vec<Vec<usize>>,
    /// Kind of each source id. Always 0 for now.
    pub types: Vec<Vec<u32>>,
    pub targets: Vec<usize>,
}

impl Line {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.types.clear();
        self.targets.clear();
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn push(&mut self, source: Vec<usize>, target: usize) {
        self.types.push(vec![0; source.len()]);
        self.sources.push(source);
        self.targets.push(target);
    }
}

/// Words, targets and sub-token features of a corpus, plus the per-word
/// subsampling table.
///
/// Input ids form one space: words are `0..nwords()` and features are
/// `nwords()..nwords() + nfeatures()`. Targets have their own ids.
pub struct Dictionary {
    args: Args,
    extractor: Box<dyn FeatureExtractor>,
    words: Alphabet,
    targets: Alphabet,
    features: Alphabet,
    entries: Vec<Entry>,
    pdiscard: Vec<real>,
    ntokens: u64,
    min_reduce: u64,
    /// Tokens without a separator dropped by `get_line_radical`.
    untagged: AtomicU64,
}

impl Dictionary {
    /// Build the vocabulary from every token in `corpus`.
    pub fn build<R: BufRead>(args: &Args, corpus: &mut Corpus<R>) -> Result<Self> {
        let extractor = extractor_for(args)?;
        Self::build_with(args, extractor, corpus)
    }

    /// Like `build`, with a caller-supplied feature extractor.
    pub fn build_with<R: BufRead>(
        args: &Args,
        extractor: Box<dyn FeatureExtractor>,
        corpus: &mut Corpus<R>,
    ) -> Result<Self> {
        let mut dict = Dictionary {
            args: args.clone(),
            extractor,
            words: Alphabet::new(MAX_VOCAB_SIZE),
            targets: Alphabet::new(MAX_VOCAB_SIZE),
            features: Alphabet::unbounded(),
            entries: vec![],
            pdiscard: vec![],
            ntokens: 0,
            min_reduce: 1,
            untagged: AtomicU64::new(0),
        };

        let tagged_forms = dict.read_words(corpus)?;
        dict.words.prune(args.min_count);
        if dict.words.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        dict.init_targets();
        dict.init_features(&tagged_forms)?;
        dict.init_discard();

        log::info!("Number of words:    {}", dict.nwords());
        log::info!("Number of features: {}", dict.nfeatures());
        log::info!("Number of targets:  {}", dict.ntargets());
        log::info!("Words in train file: {}", dict.ntokens);
        Ok(dict)
    }

    /// Count every token. In `subchar` mode tokens are split into word and
    /// radical first; the returned map holds the last tagged token seen for
    /// each word.
    fn read_words<R: BufRead>(&mut self, corpus: &mut Corpus<R>) -> Result<HashMap<String, String>> {
        let mut tagged_forms = HashMap::new();
        let mut token = String::new();
        self.ntokens = 0;
        while corpus.read_word(&mut token)? {
            self.ntokens += 1;
            if self.args.model == ModelName::Subchar {
                let (word, _) = self.split_token(&token).ok_or_else(|| Error::MissingSeparator {
                    token: token.clone(),
                    separator: self.args.separator,
                })?;
                let word = word.to_string();
                self.add_word(&word);
                tagged_forms.insert(word, token.clone());
            } else {
                self.add_word(&token);
            }
            if self.ntokens % 1_000_000 == 0 {
                log::debug!("Read {}M words", self.ntokens / 1_000_000);
            }
        }
        Ok(tagged_forms)
    }

    fn add_word(&mut self, word: &str) {
        self.words.add(word);
        if self.words.is_full() {
            // Drop the rarest words so counting can go on.
            self.words.prune(self.min_reduce + 1);
            self.min_reduce += 1;
            log::debug!(
                "vocabulary full, dropped words seen {} times or fewer ({} left)",
                self.min_reduce - 1,
                self.words.len()
            );
        }
    }

    /// Split a `word<SEP>radical` token. `</s>` is its own radical, whatever
    /// the separator.
    fn split_token<'t>(&self, token: &'t str) -> Option<(&'t str, &'t str)> {
        if token == EOS {
            Some((EOS, EOS))
        } else {
            split_tagged(token, self.args.separator)
        }
    }

    fn init_targets(&mut self) {
        self.targets = Alphabet::new(MAX_VOCAB_SIZE);
        for (word, count) in self.words.iter() {
            self.targets.add_count(word, count);
        }
    }

    fn init_features(&mut self, tagged_forms: &HashMap<String, String>) -> Result<()> {
        let nwords = self.words.len();
        let mut entries = Vec::with_capacity(nwords);
        for (word, count) in self.words.iter() {
            let unit = tagged_forms.get(word).map_or(word, String::as_str);
            let mut features = vec![];
            for feature in self.extractor.extract(unit)? {
                // The feature table has no size limit, so this only fails on
                // a broken invariant.
                let id = self.features.add_count(&feature, count).ok_or_else(|| {
                    Error::InvalidArgument(format!("feature table full at {feature:?}"))
                })?;
                features.push(nwords + id);
            }
            entries.push(Entry {
                word: word.to_string(),
                count,
                features,
            });
        }
        self.entries = entries;
        Ok(())
    }

    fn init_discard(&mut self) {
        let t = self.args.t;
        let ntokens = self.ntokens as real;
        self.pdiscard = self
            .entries
            .iter()
            .map(|e| {
                let f = e.count as real / ntokens;
                (t / f).sqrt() + t / f
            })
            .collect();
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn nwords(&self) -> usize {
        self.words.len()
    }

    pub fn ntargets(&self) -> usize {
        self.targets.len()
    }

    pub fn nfeatures(&self) -> usize {
        self.features.len()
    }

    /// Number of tokens in the corpus, including `</s>` markers.
    pub fn ntokens(&self) -> u64 {
        self.ntokens
    }

    /// Whether words carry sub-token features in this model.
    pub fn has_features(&self) -> bool {
        self.args.model != ModelName::Plain
    }

    pub fn word_id(&self, word: &str) -> Option<usize> {
        self.words.id(word)
    }

    pub fn target_id(&self, word: &str) -> Option<usize> {
        self.targets.id(word)
    }

    /// Id of a feature in the combined input space.
    pub fn feature_id(&self, feature: &str) -> Option<usize> {
        self.features.id(feature).map(|id| self.nwords() + id)
    }

    pub fn word(&self, id: usize) -> &str {
        self.words.string(id)
    }

    pub fn target(&self, id: usize) -> &str {
        self.targets.string(id)
    }

    /// The feature string for an id in the combined input space.
    pub fn feature(&self, id: usize) -> &str {
        self.features.string(id - self.nwords())
    }

    pub fn entry(&self, id: usize) -> &Entry {
        &self.entries[id]
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn features_of(&self, id: usize) -> &[usize] {
        &self.entries[id].features
    }

    /// Counts of every target, in id order.
    pub fn counts(&self) -> Vec<u64> {
        self.targets.counts().to_vec()
    }

    pub fn pdiscard(&self, id: usize) -> real {
        self.pdiscard[id]
    }

    /// Whether a word drawn with uniform sample `rand` should be skipped.
    pub fn discard(&self, id: usize, rand: real) -> bool {
        rand > self.pdiscard[id]
    }

    /// How many tokens `get_line_radical` has dropped for lacking a separator.
    pub fn untagged_tokens(&self) -> u64 {
        self.untagged.load(Ordering::Relaxed)
    }

    /// Input ids that make up the vector of `word`: its own id and feature
    /// ids for a known word, or whichever of its features are known for an
    /// unknown one.
    pub fn input_ids(&self, word: &str) -> Vec<usize> {
        if let Some(id) = self.word_id(word) {
            let mut ids = vec![id];
            ids.extend_from_slice(&self.entries[id].features);
            return ids;
        }
        match self.extractor.extract(word) {
            Ok(features) => features.iter().filter_map(|f| self.feature_id(f)).collect(),
            Err(_) => vec![],
        }
    }

    fn keep<G: Rng>(&self, word: &str, rng: &mut G) -> Option<(usize, usize)> {
        let wid = self.word_id(word)?;
        let tid = self.target_id(word)?;
        if self.discard(wid, rng.gen::<real>()) {
            None
        } else {
            Some((wid, tid))
        }
    }

    /// Read one line of examples from `corpus` into `line`.
    ///
    /// Returns the number of tokens read, counting skipped tokens and the
    /// final `</s>`. A corpus at end of file is rewound first.
    pub fn get_line<R, G>(&self, corpus: &mut Corpus<R>, line: &mut Line, rng: &mut G) -> Result<u64>
    where
        R: BufRead + Seek,
        G: Rng,
    {
        corpus.reset()?;
        line.clear();
        let mut ntokens = 0;
        let mut token = String::new();
        while corpus.read_word(&mut token)? {
            ntokens += 1;
            if token == EOS {
                break;
            }
            if let Some((wid, tid)) = self.keep(&token, rng) {
                let mut source = vec![wid];
                if self.has_features() {
                    source.extend_from_slice(&self.entries[wid].features);
                }
                line.push(source, tid);
            }
            if ntokens > MAX_LINE_SIZE {
                break;
            }
        }
        Ok(ntokens)
    }

    /// Like `get_line`, for corpora of `word<SEP>radical` tokens.
    ///
    /// Tokens without a separator are skipped and counted in
    /// `untagged_tokens`.
    pub fn get_line_radical<R, G>(
        &self,
        corpus: &mut Corpus<R>,
        line: &mut Line,
        rng: &mut G,
    ) -> Result<u64>
    where
        R: BufRead + Seek,
        G: Rng,
    {
        corpus.reset()?;
        line.clear();
        let mut ntokens = 0;
        let mut token = String::new();
        while corpus.read_word(&mut token)? {
            ntokens += 1;
            match self.split_token(&token) {
                Some((EOS, _)) => break,
                Some((word, radical)) => {
                    if let Some((wid, tid)) = self.keep(word, rng) {
                        let mut source = vec![wid];
                        if let Some(fid) = self.feature_id(&bracket(radical)) {
                            source.push(fid);
                        }
                        line.push(source, tid);
                    }
                }
                None => {
                    if self.untagged.fetch_add(1, Ordering::Relaxed) == 0 {
                        log::warn!(
                            "skipping token {token:?} with no {:?} separator",
                            self.args.separator
                        );
                    }
                }
            }
            if ntokens > MAX_LINE_SIZE {
                break;
            }
        }
        Ok(ntokens)
    }

    /// Write `word count` lines in id order.
    pub fn save_vocab(&self, path: &Path) -> Result<()> {
        let mut fo = BufWriter::new(File::create(path)?);
        for e in &self.entries {
            writeln!(fo, "{} {}", e.word, e.count)?;
        }
        fo.flush()?;
        Ok(())
    }
}
