//! Embedding matrices shared by all training threads.
//!
//! Workers read and update rows without locking. Each element is an atomic
//! cell accessed with relaxed ordering, so a value is never torn, but two
//! threads adding to the same element at once can lose one of the updates.
//! Stochastic gradient descent doesn't mind.

use std::sync::atomic::{AtomicU32, Ordering};

use aligned_box::AlignedBox;
use rand::Rng;

use crate::error::{Error, Result};
use crate::real;

#[derive(Default)]
#[repr(transparent)]
pub struct Real {
    bits: AtomicU32,
}

impl Real {
    pub fn get(&self) -> real {
        real::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: real) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Not atomic as a whole: a concurrent `add` may be lost.
    pub fn add(&self, x: real) {
        let a = self.get();
        self.set(a + x);
    }
}

/// A dense `rows × cols` matrix of `Real` cells.
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: AlignedBox<[Real]>,
}

impl Matrix {
    /// A zero-filled matrix.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        let data = AlignedBox::slice_from_default(128, rows * cols)
            .map_err(|_| Error::OutOfMemory { rows, cols })?;
        Ok(Matrix { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[Real] {
        &self.data[i * self.cols..][..self.cols]
    }

    pub fn get(&self, i: usize, j: usize) -> real {
        self.row(i)[j].get()
    }

    pub fn zero(&self) {
        for x in self.data.iter() {
            x.set(0.0);
        }
    }

    /// Fill with values drawn uniformly from `[-a, a)`.
    pub fn uniform<G: Rng>(&self, a: real, rng: &mut G) {
        for x in self.data.iter() {
            x.set(rng.gen_range(-a..a));
        }
    }

    /// `row(i) · v`
    pub fn dot_row(&self, v: &[real], i: usize) -> real {
        debug_assert_eq!(v.len(), self.cols);
        self.row(i)
            .iter()
            .zip(v.iter())
            .map(|(r, &x)| r.get() * x)
            .sum()
    }

    /// `row(i) += a * v`
    pub fn add_row(&self, v: &[real], i: usize, a: real) {
        debug_assert_eq!(v.len(), self.cols);
        for (r, &x) in self.row(i).iter().zip(v.iter()) {
            r.add(a * x);
        }
    }

    /// `v += a * row(i)`
    pub fn add_row_to(&self, v: &mut [real], i: usize, a: real) {
        for (x, r) in v.iter_mut().zip(self.row(i).iter()) {
            *x += a * r.get();
        }
    }

    /// Store the mean of the given rows in `out`. An empty `ids` gives zeros.
    pub fn average_rows(&self, ids: &[usize], out: &mut [real]) {
        out.fill(0.0);
        if ids.is_empty() {
            return;
        }
        for &i in ids {
            self.add_row_to(out, i, 1.0);
        }
        let n = ids.len() as real;
        for x in out.iter_mut() {
            *x /= n;
        }
    }

    /// Copy out all values, row-major.
    pub fn to_vec(&self) -> Vec<real> {
        self.data.iter().map(Real::get).collect()
    }
}
