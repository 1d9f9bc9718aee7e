//! Reading exported vectors back for nearest-neighbour queries.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ordered_float::OrderedFloat;

use crate::real;

/// Vectors written by `Trainer::save_vectors` or `Trainer::save_features`,
/// scaled to unit length so a dot product is a cosine.
pub struct Vectors {
    dim: usize,
    words: Vec<String>,
    ids: HashMap<String, usize>,
    /// Row-major, `words.len() × dim`.
    data: Vec<real>,
}

fn scale_to_unit(v: &mut [real]) {
    let len = v.iter().map(|x| x * x).sum::<real>().sqrt();
    if len > 0.0 {
        v.iter_mut().for_each(|x| *x /= len);
    }
}

fn parse_header(line: &str) -> Result<(usize, usize)> {
    let mut fields = line.split_whitespace().map(str::parse::<usize>);
    match (fields.next(), fields.next()) {
        (Some(Ok(count)), Some(Ok(dim))) => Ok((count, dim)),
        _ => bail!("expected `<count> <dim>` header, found {:?}", line.trim_end()),
    }
}

impl Vectors {
    pub fn load(path: &Path, binary: bool) -> Result<Self> {
        let mut f = BufReader::new(File::open(path).context("error opening vectors file")?);
        let mut line = String::new();
        f.read_line(&mut line).context("error reading vectors file")?;
        let (count, dim) = parse_header(&line)?;

        let mut words = Vec::with_capacity(count);
        let mut data = vec![0.0; count * dim];
        for row in data.chunks_exact_mut(dim.max(1)).take(count) {
            let mut word = vec![];
            if f.read_until(b' ', &mut word).context("error reading vectors file")? == 0 {
                break;
            }
            word.retain(|&b| b != b' ' && b != b'\n');
            let word = String::from_utf8(word).context("word is not valid UTF-8")?;

            if binary {
                f.read_exact(bytemuck::cast_slice_mut::<real, u8>(row))
                    .with_context(|| format!("truncated vector for {word:?}"))?;
                f.read_exact(&mut [0u8])
                    .with_context(|| format!("missing newline after {word:?}"))?;
            } else {
                line.clear();
                f.read_line(&mut line).context("error reading vectors file")?;
                let n = line.split_whitespace().count();
                if n != dim {
                    bail!("{word:?} has {n} values, expected {dim}");
                }
                for (x, field) in row.iter_mut().zip(line.split_whitespace()) {
                    *x = field
                        .parse()
                        .with_context(|| format!("bad value {field:?} for {word:?}"))?;
                }
            }
            scale_to_unit(row);
            words.push(word);
        }
        data.truncate(words.len() * dim);

        let ids = words
            .iter()
            .enumerate()
            .map(|(id, w)| (w.clone(), id))
            .collect();
        Ok(Vectors {
            dim,
            words,
            ids,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn id(&self, word: &str) -> Option<usize> {
        self.ids.get(word).copied()
    }

    pub fn word(&self, id: usize) -> &str {
        &self.words[id]
    }

    pub fn vector(&self, id: usize) -> &[real] {
        &self.data[id * self.dim..][..self.dim]
    }

    /// The `n` words closest to `query` by cosine similarity, best first,
    /// leaving out the words in `exclude`.
    pub fn nearest(&self, query: &[real], n: usize, exclude: &[usize]) -> Vec<(&str, real)> {
        let mut q = query.to_vec();
        scale_to_unit(&mut q);
        let mut scored: Vec<(&str, real)> = (0..self.len())
            .filter(|id| !exclude.contains(id))
            .map(|id| {
                let sim = self.vector(id).iter().zip(&q).map(|(a, b)| a * b).sum::<real>();
                (self.word(id), sim)
            })
            .collect();
        scored.sort_by_key(|&(_, sim)| std::cmp::Reverse(OrderedFloat(sim)));
        scored.truncate(n);
        scored
    }
}
