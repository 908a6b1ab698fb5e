//! Approximate string matching for noisy HTR transcriptions.
//!
//! A [`Fuzzy`] literal matches any stretch of text within a bounded number of
//! character insertions, deletions or substitutions. Literals can be chained
//! with regular expressions into a [`Sequence`], which tries every possible
//! end position of one step as the start of the next.

use regex::Regex;
use strsim::levenshtein;
use unicode_normalization::UnicodeNormalization;

const INF: usize = usize::MAX / 2;

/// Canonical composition so that "ë" typed as `e` + combining diaeresis counts
/// as a single character when edits are counted.
pub fn normalize(text: &str) -> String {
    text.nfc().collect()
}

/// Where a fuzzy match is allowed to begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Start {
    Anywhere,
    /// At the start of the text or right after a non-alphanumeric character.
    WordStart,
    /// Exactly at the given byte offset.
    At(usize),
}

#[derive(Debug, Clone)]
pub struct Fuzzy {
    needle: Vec<char>,
    max_edits: usize,
    case_sensitive: bool,
    whole_word: bool,
}

impl Fuzzy {
    pub fn new(needle: &str, max_edits: usize) -> Self {
        Self {
            needle: needle.chars().collect(),
            max_edits,
            case_sensitive: false,
            whole_word: false,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Requires the match to end at a word boundary.
    pub fn whole_word(mut self) -> Self {
        self.whole_word = true;
        self
    }

    pub fn is_match(&self, text: &str) -> bool {
        !self.ends(text, Start::Anywhere).is_empty()
    }

    pub fn is_word_match(&self, text: &str) -> bool {
        !self.ends(text, Start::WordStart).is_empty()
    }

    pub fn is_prefix_of(&self, text: &str) -> bool {
        !self.ends(text, Start::At(0)).is_empty()
    }

    /// Byte offsets at which a match within the edit budget ends, ascending.
    pub fn ends(&self, text: &str, start: Start) -> Vec<usize> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let needle: Vec<char> = self.needle.iter().map(|&c| self.fold_char(c)).collect();
        let n = chars.len();
        let m = needle.len();
        let offset = |j: usize| if j < n { chars[j].0 } else { text.len() };
        let is_word = |j: usize| chars[j].1.is_alphanumeric();

        let start_allowed = |j: usize| match start {
            Start::Anywhere => true,
            Start::WordStart => j == 0 || !is_word(j - 1),
            Start::At(at) => offset(j) == at,
        };
        let end_allowed = |j: usize| !self.whole_word || j == n || !is_word(j);

        let mut prev = vec![INF; m + 1];
        let mut cur = vec![INF; m + 1];
        let mut ends = Vec::new();

        for j in 0..=n {
            cur[0] = if start_allowed(j) {
                0
            } else if j == 0 {
                INF
            } else {
                (prev[0] + 1).min(INF)
            };

            for i in 1..=m {
                let deletion = cur[i - 1] + 1;
                let (substitution, insertion) = if j == 0 {
                    (INF, INF)
                } else {
                    let text_char = self.fold_char(chars[j - 1].1);
                    let cost = usize::from(needle[i - 1] != text_char);
                    (prev[i - 1] + cost, prev[i] + 1)
                };
                cur[i] = deletion.min(substitution).min(insertion).min(INF);
            }

            if cur[m] <= self.max_edits && end_allowed(j) {
                ends.push(offset(j));
            }
            std::mem::swap(&mut prev, &mut cur);
        }

        ends
    }

    fn fold_char(&self, c: char) -> char {
        if self.case_sensitive {
            c
        } else {
            fold(c)
        }
    }
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// True when `word` equals any of `candidates` within `max_edits`,
/// ignoring case.
pub fn word_matches_any(word: &str, candidates: &[&str], max_edits: usize) -> bool {
    let word = word.to_lowercase();
    candidates
        .iter()
        .any(|candidate| levenshtein(&word, candidate) <= max_edits)
}

/// One step of a [`Sequence`].
#[derive(Debug, Clone)]
pub enum Step {
    Fuzzy(Fuzzy),
    /// When not the first step, the expression must be anchored with `^`.
    Regex(Regex),
}

/// Fuzzy literals and regular expressions matched one after another.
#[derive(Debug, Clone)]
pub struct Sequence {
    anchored: bool,
    steps: Vec<Step>,
}

impl Sequence {
    /// A sequence whose first step must match at the start of the text.
    pub fn anchored(steps: Vec<Step>) -> Self {
        Self {
            anchored: true,
            steps,
        }
    }

    /// A sequence whose first step may match anywhere.
    pub fn search(steps: Vec<Step>) -> Self {
        Self {
            anchored: false,
            steps,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        let Some((first, rest)) = self.steps.split_first() else {
            return true;
        };
        let ends = match first {
            Step::Fuzzy(fuzzy) => {
                let start = if self.anchored {
                    Start::At(0)
                } else {
                    Start::Anywhere
                };
                fuzzy.ends(text, start)
            }
            Step::Regex(re) => re
                .find_iter(text)
                .filter(|m| !self.anchored || m.start() == 0)
                .map(|m| m.end())
                .collect(),
        };
        ends.into_iter().any(|end| matches_from(rest, text, end))
    }
}

fn matches_from(steps: &[Step], text: &str, at: usize) -> bool {
    let Some((step, rest)) = steps.split_first() else {
        return true;
    };
    match step {
        Step::Fuzzy(fuzzy) => fuzzy
            .ends(text, Start::At(at))
            .into_iter()
            .any(|end| matches_from(rest, text, end)),
        Step::Regex(re) => re
            .find(&text[at..])
            .filter(|m| m.start() == 0)
            .is_some_and(|m| matches_from(rest, text, at + m.end())),
    }
}
