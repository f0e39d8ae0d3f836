//! Greedy longest-frame alignment of two token sequences

/// A run of equal tokens found in both sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceMatch {
    pub pattern_start: usize,
    pub search_start: usize,
    pub length: usize,
}

/// Overlap score of two token sequences
///
/// The shorter sequence is the pattern (the query on equal length). Frames shrink from the
/// pattern length down to the minimum match length; a frame whose tokens are unmatched on
/// both sides and equal ignoring case adds `length ^ exponent` and consumes its tokens.
#[derive(Debug, Clone)]
pub struct SequenceAnalysis {
    score: f64,
    matches: Vec<SequenceMatch>,
}

impl SequenceAnalysis {
    pub fn analyze(
        query: &[String],
        other: &[String],
        minimum_match_length: usize,
        exponent: f64,
    ) -> Self {
        let (pattern, search) = if other.len() < query.len() {
            (other, query)
        } else {
            (query, other)
        };
        let pattern: Vec<String> = pattern.iter().map(|t| t.to_lowercase()).collect();
        let search: Vec<String> = search.iter().map(|t| t.to_lowercase()).collect();

        let mut matched_pattern = vec![false; pattern.len()];
        let mut matched_search = vec![false; search.len()];
        let mut score = 0.0;
        let mut matches = Vec::new();

        let minimum = minimum_match_length.max(1);
        let mut frame = pattern.len();
        while frame >= minimum {
            for pattern_start in 0..=(pattern.len() - frame) {
                for search_start in 0..=(search.len() - frame) {
                    let free_and_equal = (0..frame).all(|i| {
                        !matched_pattern[pattern_start + i]
                            && !matched_search[search_start + i]
                            && pattern[pattern_start + i] == search[search_start + i]
                    });
                    if !free_and_equal {
                        continue;
                    }

                    score += (frame as f64).powf(exponent);
                    matched_pattern[pattern_start..pattern_start + frame].fill(true);
                    matched_search[search_start..search_start + frame].fill(true);
                    matches.push(SequenceMatch {
                        pattern_start,
                        search_start,
                        length: frame,
                    });
                }
            }
            frame -= 1;
        }

        Self { score, matches }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn matches(&self) -> &[SequenceMatch] {
        &self.matches
    }
}
