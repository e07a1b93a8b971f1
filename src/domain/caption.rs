// ============================================================
// Layer 3 — Caption Domain Type
// ============================================================
// A caption is one grounding example: a tokenised sentence that
// describes what happens in a video between `start_time` and
// `end_time` (both in seconds from the start of the video).
//
// Example:
//   video_id:   "s13-d21"
//   tokens:     ["the", "person", "cuts", "the", "cucumber"]
//   start_time: 12.5
//   end_time:   31.0

use std::fmt;

use serde::{Deserialize, Serialize};

/// One annotated query, already tokenised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Identifier of the video, also the stem of its feature file
    pub video_id: String,

    /// Normalised, lowercased words of the query sentence
    pub tokens: Vec<String>,

    /// Gold start of the described moment, in seconds
    pub start_time: f64,

    /// Gold end of the described moment, in seconds
    pub end_time: f64,
}

impl Caption {
    /// Build a caption, ordering the two timestamps if they arrive swapped.
    pub fn new(
        video_id:   impl Into<String>,
        tokens:     Vec<String>,
        start_time: f64,
        end_time:   f64,
    ) -> Self {
        let (start_time, end_time) = if start_time <= end_time {
            (start_time, end_time)
        } else {
            (end_time, start_time)
        };
        Self { video_id: video_id.into(), tokens, start_time, end_time }
    }

    /// Number of words in the query
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// The named partitions of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Split::Train => "train",
            Split::Val   => "val",
            Split::Test  => "test",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapped_timestamps_are_ordered() {
        let c = Caption::new("v1", vec!["a".into()], 9.0, 3.0);
        assert_eq!(c.start_time, 3.0);
        assert_eq!(c.end_time, 9.0);
    }

    #[test]
    fn test_split_display() {
        assert_eq!(Split::Train.to_string(), "train");
        assert_eq!(Split::Val.to_string(), "val");
        assert_eq!(Split::Test.to_string(), "test");
    }
}
