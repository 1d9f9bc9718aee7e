use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::args::{Args, ModelName};
use crate::dictionary::{Dictionary, Line};
use crate::error::{Error, Result};
use crate::matrix::{Matrix, Real};
use crate::model::{Approx, Model, NegativeTable};
use crate::reader::Corpus;
use crate::real;

/// Everything needed to rebuild word and feature vectors, in bincode form.
#[derive(Serialize, Deserialize)]
pub struct SavedModel {
    pub args: Args,
    /// `(word, count)` in id order.
    pub vocab: Vec<(String, u64)>,
    /// Feature strings in id order, after the words.
    pub features: Vec<String>,
    /// Row-major input matrix, `(vocab.len() + features.len()) × args.dim`.
    pub input: Vec<real>,
    /// Row-major output matrix, `vocab.len() × args.dim`.
    pub output: Vec<real>,
}

/// Trains one pair of embedding matrices with several threads.
pub struct Trainer {
    args: Args,
    dict: Dictionary,
    /// Word and feature vectors.
    input: Matrix,
    /// Target (context) vectors.
    output: Matrix,
    approx: Approx,
    negatives: NegativeTable,
    token_count: AtomicU64,
    /// Latest average loss reported by thread 0.
    loss: Real,
    stop: AtomicBool,
    file_size: u64,
    start: Instant,
    progress: ProgressBar,
}

impl Trainer {
    /// Build the vocabulary from `args.input` and set up fresh matrices.
    pub fn new(args: Args) -> Result<Self> {
        args.validate()?;
        let mut corpus = Corpus::new(BufReader::new(File::open(&args.input)?));
        let dict = Dictionary::build(&args, &mut corpus)?;
        Self::with_dictionary(args, dict)
    }

    pub fn with_dictionary(args: Args, dict: Dictionary) -> Result<Self> {
        Self::with_negative_table_size(args, dict, crate::model::NEGATIVE_TABLE_SIZE)
    }

    /// Like `with_dictionary`, with a smaller negative table.
    pub fn with_negative_table_size(args: Args, dict: Dictionary, size: usize) -> Result<Self> {
        args.validate()?;
        let file_size = File::open(&args.input)?.seek(SeekFrom::End(0))?;

        let mut rng = StdRng::seed_from_u64(args.seed);
        let input = Matrix::new(dict.nwords() + dict.nfeatures(), args.dim)?;
        input.uniform(1.0 / args.dim as real, &mut rng);
        let output = Matrix::new(dict.ntargets(), args.dim)?;
        let negatives = NegativeTable::with_size(&dict.counts(), size, &mut rng);

        Ok(Trainer {
            args,
            dict,
            input,
            output,
            approx: Approx::new(),
            negatives,
            token_count: AtomicU64::new(0),
            loss: Real::default(),
            stop: AtomicBool::new(false),
            file_size,
            start: Instant::now(),
            progress: ProgressBar::hidden(),
        })
    }

    /// Show training progress on `bar`.
    pub fn set_progress(&mut self, bar: ProgressBar) {
        self.progress = bar;
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn input(&self) -> &Matrix {
        &self.input
    }

    pub fn output(&self) -> &Matrix {
        &self.output
    }

    pub fn token_count(&self) -> u64 {
        self.token_count.load(Ordering::Relaxed)
    }

    pub fn loss(&self) -> real {
        self.loss.get()
    }

    /// Ask all workers to finish after their current line.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    fn budget(&self) -> u64 {
        self.args.epoch as u64 * self.dict.ntokens()
    }

    /// Run `args.thread` workers until `args.epoch` passes over the corpus
    /// have been made or `stop` is called.
    pub fn train(&self) -> Result<()> {
        log::info!("Starting training using file {}", self.args.input.display());
        self.progress.set_length(self.budget());

        let result = thread::scope(|s| {
            let workers = (0..self.args.thread)
                .map(|id| s.spawn(move || self.train_thread(id)))
                .collect::<Vec<_>>();

            let mut result = Ok(());
            for (id, worker) in workers.into_iter().enumerate() {
                let outcome = worker
                    .join()
                    .unwrap_or_else(|_| Err(Error::WorkerPanicked(id)));
                if let Err(err) = outcome {
                    log::error!("Error in worker thread {id}: {err}");
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
            result
        });

        self.progress.finish();
        let untagged = self.dict.untagged_tokens();
        if untagged > 0 {
            log::warn!(
                "skipped {untagged} tokens with no {:?} separator",
                self.args.separator
            );
        }
        log::info!(
            "Finished training: {} tokens, loss {:.4}, {:.1}s",
            self.token_count(),
            self.loss(),
            self.start.elapsed().as_secs_f64()
        );
        result
    }

    fn train_thread(&self, id: usize) -> Result<()> {
        let result = self.train_thread_inner(id);
        if result.is_err() {
            self.stop();
        }
        result
    }

    fn train_thread_inner(&self, id: usize) -> Result<()> {
        let mut corpus = Corpus::new(BufReader::new(File::open(&self.args.input)?));
        corpus.seek_to(id as u64 * self.file_size / self.args.thread as u64)?;
        log::debug!("worker {id} starting");

        let mut model = Model::new(
            &self.input,
            &self.output,
            &self.args,
            &self.approx,
            &self.negatives,
            id as u64,
        );
        let budget = self.budget();
        let mut line = Line::new();
        let mut local_token_count = 0;

        while self.token_count() < budget && !self.stop.load(Ordering::Relaxed) {
            let progress = self.token_count() as real / budget as real;
            let lr = self.args.lr * (1.0 - progress);
            local_token_count += match self.args.model {
                ModelName::Subchar => self.dict.get_line_radical(&mut corpus, &mut line, &mut model.rng)?,
                _ => self.dict.get_line(&mut corpus, &mut line, &mut model.rng)?,
            };
            self.skipgram(&mut model, lr, &line)?;

            if local_token_count > self.args.lr_update_rate {
                self.token_count.fetch_add(local_token_count, Ordering::Relaxed);
                local_token_count = 0;
                if id == 0 {
                    self.report_progress(&model, lr);
                }
            }
        }
        self.token_count.fetch_add(local_token_count, Ordering::Relaxed);
        if id == 0 {
            self.loss.set(model.loss());
        }
        log::debug!("worker {id} done, {} examples", model.nexamples() - 1);
        Ok(())
    }

    fn report_progress(&self, model: &Model<'_>, lr: real) {
        let token_count = self.token_count();
        self.loss.set(model.loss());
        let words_per_sec =
            token_count as f64 / (self.start.elapsed().as_secs_f64() + 1e-9) / self.args.thread as f64;
        self.progress.set_position(token_count.min(self.budget()));
        self.progress.set_message(format!(
            "lr: {lr:.6}  loss: {:.6}  words/sec/thread: {words_per_sec:.0}",
            model.loss()
        ));
    }

    /// Predict every word of the line within a random window from each
    /// position's input ids.
    fn skipgram(&self, model: &mut Model<'_>, lr: real, line: &Line) -> Result<()> {
        let n = line.len();
        for w in 0..n {
            let boundary = model.rng.gen_range(1..=self.args.ws);
            let source = &line.sources[w];
            let start = w.saturating_sub(boundary);
            let stop = (w + boundary + 1).min(n);
            for c in start..stop {
                if c == w {
                    continue;
                }
                if self.dict.has_features() {
                    model.update_para(source, line.targets[c], lr)?;
                } else {
                    model.update(source, line.targets[c], lr)?;
                }
            }
        }
        Ok(())
    }

    /// The vector for a word: the mean of its own row and its feature rows.
    /// Unknown words are built from whichever of their features are known.
    pub fn word_vector(&self, word: &str) -> Option<Vec<real>> {
        let ids = self.dict.input_ids(word);
        if ids.is_empty() {
            return None;
        }
        let mut v = vec![0.0; self.args.dim];
        self.input.average_rows(&ids, &mut v);
        Some(v)
    }

    /// Write one vector per word, in text or word2vec binary format.
    pub fn save_vectors(&self, path: &Path, binary: bool) -> Result<()> {
        let dim = self.args.dim;
        let mut fo = BufWriter::new(File::create(path)?);
        writeln!(fo, "{} {}", self.dict.nwords(), dim)?;
        let mut v = vec![0.0; dim];
        for (id, entry) in self.dict.entries().iter().enumerate() {
            let mut ids = vec![id];
            ids.extend_from_slice(&entry.features);
            self.input.average_rows(&ids, &mut v);
            write_vector(&mut fo, &entry.word, &v, binary)?;
        }
        fo.flush()?;
        Ok(())
    }

    /// Write one vector per feature, same format as `save_vectors`.
    pub fn save_features(&self, path: &Path, binary: bool) -> Result<()> {
        let dim = self.args.dim;
        let nwords = self.dict.nwords();
        let mut fo = BufWriter::new(File::create(path)?);
        writeln!(fo, "{} {}", self.dict.nfeatures(), dim)?;
        let mut v = vec![0.0; dim];
        for id in nwords..nwords + self.dict.nfeatures() {
            self.input.average_rows(&[id], &mut v);
            write_vector(&mut fo, self.dict.feature(id), &v, binary)?;
        }
        fo.flush()?;
        Ok(())
    }

    pub fn saved_model(&self) -> SavedModel {
        let nwords = self.dict.nwords();
        SavedModel {
            args: self.args.clone(),
            vocab: self
                .dict
                .entries()
                .iter()
                .map(|e| (e.word.clone(), e.count))
                .collect(),
            features: (nwords..nwords + self.dict.nfeatures())
                .map(|id| self.dict.feature(id).to_string())
                .collect(),
            input: self.input.to_vec(),
            output: self.output.to_vec(),
        }
    }

    /// Save vocabulary, features and both matrices with bincode.
    pub fn save_model(&self, path: &Path) -> Result<()> {
        let fo = BufWriter::new(File::create(path)?);
        bincode::serialize_into(fo, &self.saved_model())?;
        Ok(())
    }
}

fn write_vector<W: Write>(fo: &mut W, word: &str, v: &[real], binary: bool) -> Result<()> {
    write!(fo, "{word} ")?;
    if binary {
        fo.write_all(bytemuck::cast_slice::<real, u8>(v))?;
    } else {
        for (i, x) in v.iter().enumerate() {
            if i > 0 {
                write!(fo, " ")?;
            }
            write!(fo, "{x}")?;
        }
    }
    writeln!(fo)?;
    Ok(())
}

/// `output.vec` → `output.features.vec`
pub fn features_path(output: &Path) -> PathBuf {
    let mut name = output.file_stem().unwrap_or_default().to_os_string();
    name.push(".features");
    if let Some(ext) = output.extension() {
        name.push(".");
        name.push(ext);
    }
    output.with_file_name(name)
}

/// Load a model written by `Trainer::save_model`.
pub fn load_model(path: &Path) -> Result<SavedModel> {
    let f = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(f)?)
}
