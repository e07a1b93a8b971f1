// ============================================================
// Layer 4 — Pretrained Word Vectors
// ============================================================
// Reads a GloVe-style text file:
//
//   the 0.418 0.24968 -0.41242 ...
//   ,   0.013441 0.23682 -0.16899 ...
//
// One word per line followed by `dim` floats, separated by
// whitespace. The table is loaded once at start-up and is never
// trained.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{bail, Context, Result};

use crate::data::vocab::{Vocab, PAD_TOKEN, UNK_TOKEN};

#[derive(Debug, Clone)]
pub struct WordVectors {
    words:  Vec<String>,
    index:  HashMap<String, usize>,
    values: Vec<f32>,
    dim:    usize,
}

impl WordVectors {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open word vectors '{}'", path.display()))?;
        let vectors = Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Malformed word vectors in '{}'", path.display()))?;

        tracing::info!(
            "Loaded {} word vectors of size {} from '{}'",
            vectors.len(),
            vectors.dim(),
            path.display()
        );
        Ok(vectors)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut words  = Vec::new();
        let mut index  = HashMap::new();
        let mut values = Vec::new();
        let mut dim    = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };

            let row = parts
                .map(str::parse::<f32>)
                .collect::<Result<Vec<f32>, _>>()
                .with_context(|| format!("line {}: invalid float", line_no + 1))?;

            if row.is_empty() {
                bail!("line {}: word '{}' has no vector", line_no + 1, word);
            }
            if dim == 0 {
                dim = row.len();
            } else if row.len() != dim {
                bail!(
                    "line {}: expected {} values, found {}",
                    line_no + 1,
                    dim,
                    row.len()
                );
            }

            // The special tokens are reserved for the vocabulary
            if word == PAD_TOKEN || word == UNK_TOKEN {
                continue;
            }

            index.entry(word.to_string()).or_insert(words.len());
            words.push(word.to_string());
            values.extend_from_slice(&row);
        }

        if words.is_empty() {
            bail!("no word vectors found");
        }

        Ok(Self { words, index, values, dim })
    }

    /// Number of rows in the file (duplicates included)
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn vector(&self, word: &str) -> Option<&[f32]> {
        self.index
            .get(word)
            .map(|&row| &self.values[row * self.dim..(row + 1) * self.dim])
    }

    /// Element-wise mean over all rows, used as the <unk> vector.
    pub fn mean_vector(&self) -> Vec<f32> {
        let mut mean = vec![0.0f32; self.dim];
        for row in self.values.chunks_exact(self.dim) {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        let n = self.len() as f32;
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    }

    /// Row-major `[vocab.len(), dim]` table aligned with vocabulary ids:
    /// <pad> is all zeros, <unk> is the mean vector, words without a
    /// vector get the <unk> row.
    pub fn embedding_matrix(&self, vocab: &Vocab) -> Vec<f32> {
        let unk   = self.mean_vector();
        let mut table = Vec::with_capacity(vocab.len() * self.dim);

        for id in 0..vocab.len() {
            match vocab.word(id) {
                Some(PAD_TOKEN) => table.extend(std::iter::repeat(0.0).take(self.dim)),
                Some(word) => table.extend_from_slice(self.vector(word).unwrap_or(&unk)),
                None => table.extend_from_slice(&unk),
            }
        }
        table
    }
}
