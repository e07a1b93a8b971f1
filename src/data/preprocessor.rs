// ============================================================
// Layer 4 — Caption Preprocessor
// ============================================================
// Normalises raw annotation sentences into the word tokens that
// are looked up in the GloVe vocabulary.
//
// GloVe 6B is lowercased and splits punctuation off words, so we
// do the same here; otherwise "Cucumber." would miss the "cucumber"
// row and fall back to <unk>.
//
// Steps (applied in order):
//   1. Map Unicode whitespace / control characters to a space
//   2. Lowercase
//   3. Treat every non-alphanumeric character except an inner
//      apostrophe as a separator
//   4. Split on whitespace, drop empty pieces

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Replace whitespace variants and control characters with plain spaces.
    pub fn clean(&self, text: &str) -> String {
        text.chars()
            .map(|c| match c {
                '\t' | '\r' | '\n' => ' ',
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect()
    }

    /// Turn a sentence into lowercase word tokens.
    pub fn tokenize(&self, sentence: &str) -> Vec<String> {
        let lowered = self.clean(sentence).to_lowercase();

        let spaced: String = lowered
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
            .collect();

        spaced
            .split_whitespace()
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
