// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Maps word tokens to integer ids and back.
//
// Id layout:
//   0 → <pad>   (padding, zero embedding)
//   1 → <unk>   (out-of-vocabulary words)
//   2.. → words in the order they appear in the word-vector file
//
// The id of a word is also its row in the frozen embedding table,
// see `WordVectors::embedding_matrix`.

use std::collections::HashMap;

use burn::prelude::*;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";

#[derive(Debug, Clone)]
pub struct Vocab {
    word2id: HashMap<String, usize>,
    id2word: Vec<String>,
}

impl Vocab {
    /// Build a vocabulary from an ordered word list.
    /// Duplicate words keep the id of their first occurrence.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self { word2id: HashMap::new(), id2word: Vec::new() };
        vocab.add(PAD_TOKEN);
        vocab.add(UNK_TOKEN);
        for w in words {
            vocab.add(w);
        }
        vocab
    }

    fn add(&mut self, word: impl Into<String>) -> usize {
        let word = word.into();
        if let Some(&id) = self.word2id.get(&word) {
            return id;
        }
        let id = self.id2word.len();
        self.word2id.insert(word.clone(), id);
        self.id2word.push(word);
        id
    }

    pub fn len(&self) -> usize {
        self.id2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2word.is_empty()
    }

    pub fn pad_id(&self) -> usize {
        self.word2id[PAD_TOKEN]
    }

    pub fn unk_id(&self) -> usize {
        self.word2id[UNK_TOKEN]
    }

    /// Id of `word`, or the <unk> id
    pub fn id(&self, word: &str) -> usize {
        self.word2id.get(word).copied().unwrap_or_else(|| self.unk_id())
    }

    pub fn word(&self, id: usize) -> Option<&str> {
        self.id2word.get(id).map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.word2id.contains_key(word)
    }

    pub fn words2indices(&self, sents: &[Vec<String>]) -> Vec<Vec<usize>> {
        sents
            .iter()
            .map(|s| s.iter().map(|w| self.id(w)).collect())
            .collect()
    }

    /// Convert a batch of sentences into a padded `[batch, max_len]` id tensor.
    pub fn to_input_tensor<B: Backend>(
        &self,
        sents:  &[Vec<String>],
        device: &B::Device,
    ) -> Tensor<B, 2, Int> {
        let ids     = self.words2indices(sents);
        let max_len = ids.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let pad     = self.pad_id() as i32;

        let flat: Vec<i32> = ids
            .iter()
            .flat_map(|s| {
                s.iter()
                    .map(|&id| id as i32)
                    .chain(std::iter::repeat(pad))
                    .take(max_len)
            })
            .collect();

        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), device)
            .reshape([sents.len(), max_len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn sent(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_special_tokens_come_first() {
        let v = Vocab::from_words(["the", "cat"]);
        assert_eq!(v.pad_id(), 0);
        assert_eq!(v.unk_id(), 1);
        assert_eq!(v.id("the"), 2);
        assert_eq!(v.word(3), Some("cat"));
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn test_duplicates_keep_first_id() {
        let v = Vocab::from_words(["a", "b", "a"]);
        assert_eq!(v.len(), 4);
        assert_eq!(v.id("a"), 2);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let v = Vocab::from_words(["a"]);
        assert_eq!(v.words2indices(&[sent(&["a", "zebra"])]), vec![vec![2, 1]]);
    }

    #[test]
    fn test_input_tensor_is_padded() {
        let v      = Vocab::from_words(["a", "b", "c"]);
        let device = Default::default();
        let t      = v.to_input_tensor::<NdArray>(&[sent(&["a", "b", "c"]), sent(&["c"])], &device);
        assert_eq!(t.dims(), [2, 3]);
        let values = t.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(values, vec![2, 3, 4, 4, 0, 0]);
    }
}
