use std::slice;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::args::{Args, LossName};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::real;

pub const SIGMOID_TABLE_SIZE: usize = 512;
pub const MAX_SIGMOID: real = 8.0;
pub const LOG_TABLE_SIZE: usize = 512;
pub const NEGATIVE_TABLE_SIZE: usize = 10_000_000;

/// Lookup tables approximating the logistic function and `ln`.
///
/// Built once, then shared read-only by every model.
pub struct Approx {
    sigmoid: Vec<real>,
    log: Vec<real>,
}

impl Default for Approx {
    fn default() -> Self {
        Self::new()
    }
}

impl Approx {
    pub fn new() -> Self {
        let sigmoid = (0..=SIGMOID_TABLE_SIZE)
            .map(|i| {
                let x = (i as real * 2.0 * MAX_SIGMOID) / SIGMOID_TABLE_SIZE as real - MAX_SIGMOID;
                1.0 / (1.0 + (-x).exp())
            })
            .collect();
        let log = (0..=LOG_TABLE_SIZE)
            .map(|i| ((i as real + 1e-5) / LOG_TABLE_SIZE as real).ln())
            .collect();
        Approx { sigmoid, log }
    }

    /// Approximate the logistic function, 1 / (1 + e^-x).
    pub fn sigmoid(&self, x: real) -> real {
        if x < -MAX_SIGMOID {
            0.0
        } else if x > MAX_SIGMOID {
            1.0
        } else {
            let i = ((x + MAX_SIGMOID) * SIGMOID_TABLE_SIZE as real / MAX_SIGMOID / 2.0) as usize;
            self.sigmoid[i]
        }
    }

    /// Approximate `ln(x)` for `x` in `[0, 1]`. Anything above 1 gives 0.
    pub fn log(&self, x: real) -> real {
        if x > 1.0 {
            return 0.0;
        }
        let i = (x * LOG_TABLE_SIZE as real) as usize;
        self.log[i]
    }
}

/// Target ids repeated in proportion to the square root of their counts,
/// in random order. Negative samples are read from it sequentially.
pub struct NegativeTable {
    negatives: Vec<u32>,
    distinct: usize,
}

impl NegativeTable {
    pub fn new<G: Rng>(counts: &[u64], rng: &mut G) -> Self {
        Self::with_size(counts, NEGATIVE_TABLE_SIZE, rng)
    }

    pub fn with_size<G: Rng>(counts: &[u64], size: usize, rng: &mut G) -> Self {
        let z: f64 = counts.iter().map(|&c| (c as f64).sqrt()).sum();
        let mut negatives = Vec::with_capacity(size);
        let mut distinct = 0;
        for (i, &c) in counts.iter().enumerate() {
            let slots = ((c as f64).sqrt() / z * size as f64).round() as usize;
            if slots > 0 {
                distinct += 1;
            }
            negatives.extend(std::iter::repeat(i as u32).take(slots));
        }
        negatives.shuffle(rng);
        NegativeTable {
            negatives,
            distinct,
        }
    }

    pub fn len(&self) -> usize {
        self.negatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.negatives.is_empty()
    }

    /// How many slots were given to `target`.
    pub fn slots(&self, target: usize) -> usize {
        self.negatives
            .iter()
            .filter(|&&n| n as usize == target)
            .count()
    }

    /// Whether a draw can ever differ from `target`.
    fn has_other_than(&self, target: usize) -> bool {
        self.distinct > 1 || (self.distinct == 1 && self.negatives[0] as usize != target)
    }
}

/// Skip-gram with negative sampling, as run by one training thread.
///
/// The matrices are shared with every other model; `hidden`, `grad`, the
/// loss counters, the negative-table cursor and the random generator belong
/// to this model alone.
pub struct Model<'a> {
    input: &'a Matrix,
    output: &'a Matrix,
    args: &'a Args,
    approx: &'a Approx,
    negatives: &'a NegativeTable,
    hidden: Vec<real>,
    grad: Vec<real>,
    negpos: usize,
    loss: real,
    nexamples: u64,
    pub rng: StdRng,
}

impl<'a> Model<'a> {
    pub fn new(
        input: &'a Matrix,
        output: &'a Matrix,
        args: &'a Args,
        approx: &'a Approx,
        negatives: &'a NegativeTable,
        seed: u64,
    ) -> Self {
        let dim = input.cols();
        Model {
            input,
            output,
            args,
            approx,
            negatives,
            hidden: vec![0.0; dim],
            grad: vec![0.0; dim],
            negpos: 0,
            loss: 0.0,
            nexamples: 1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn hidden(&self) -> &[real] {
        &self.hidden
    }

    pub fn grad(&self) -> &[real] {
        &self.grad
    }

    /// Average the input rows of `ids` into the hidden vector.
    pub fn compute_hidden(&mut self, ids: &[usize]) -> &[real] {
        self.input.average_rows(ids, &mut self.hidden);
        &self.hidden
    }

    /// One logistic regression step on output row `target`.
    ///
    /// Accumulates the input-side gradient into `grad` and updates the output
    /// row immediately. Returns the loss of this prediction.
    pub fn binary_logistic(&mut self, target: usize, label: bool, lr: real) -> real {
        let score = self.approx.sigmoid(self.output.dot_row(&self.hidden, target));
        let alpha = lr * (if label { 1.0 } else { 0.0 } - score);
        self.output.add_row_to(&mut self.grad, target, alpha);
        self.output.add_row(&self.hidden, target, alpha);
        if label {
            -self.approx.log(score)
        } else {
            -self.approx.log(1.0 - score)
        }
    }

    fn get_negative(&mut self, target: usize) -> Option<usize> {
        if !self.negatives.has_other_than(target) {
            return None;
        }
        loop {
            let negative = self.negatives.negatives[self.negpos] as usize;
            self.negpos = (self.negpos + 1) % self.negatives.len();
            if negative != target {
                return Some(negative);
            }
        }
    }

    /// One positive example against `target`, then `neg` sampled negatives.
    pub fn negative_sampling(&mut self, target: usize, lr: real) -> real {
        self.grad.fill(0.0);
        let mut loss = self.binary_logistic(target, true, lr);
        for _ in 0..self.args.neg {
            match self.get_negative(target) {
                Some(negative) => loss += self.binary_logistic(negative, false, lr),
                None => break,
            }
        }
        loss
    }

    /// Train on predicting `target` from the average of the `ids` rows.
    ///
    /// Every row in `ids` receives the full gradient.
    pub fn update(&mut self, ids: &[usize], target: usize, lr: real) -> Result<()> {
        debug_assert!(target < self.output.rows());
        if ids.is_empty() {
            return Ok(());
        }
        self.compute_hidden(ids);
        match self.args.loss {
            LossName::Ns => self.loss += self.negative_sampling(target, lr),
            other => return Err(Error::UnsupportedLoss(other)),
        }
        self.nexamples += 1;

        for &i in ids {
            self.input.add_row(&self.grad, i, 1.0);
        }
        Ok(())
    }

    /// Train the word (`ids[0]`) and its features (`ids[1..]`) separately.
    /// Counts as one example.
    pub fn update_para(&mut self, ids: &[usize], target: usize, lr: real) -> Result<()> {
        let Some((word, features)) = ids.split_first() else {
            return Ok(());
        };
        self.update(slice::from_ref(word), target, lr)?;
        if !features.is_empty() {
            self.update(features, target, lr)?;
            self.nexamples -= 1;
        }
        Ok(())
    }

    /// Average loss per example so far.
    pub fn loss(&self) -> real {
        self.loss / self.nexamples as real
    }

    pub fn nexamples(&self) -> u64 {
        self.nexamples
    }
}
