//! Splitting element content into tokens

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::DomainError;

static WORD_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r" |\r\n|\n").unwrap());
static WORD_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.,?:;!()]").unwrap());
static UNDERSCORE_OR_NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\W|_)+").unwrap());

/// Tokenization granularity of the token similarity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tokenization {
    /// Words separated by spaces and line breaks, without punctuation
    #[default]
    Word,
    /// One token per grapheme cluster
    Char,
    /// Identifier parts split at underscores, non-word characters and camel-case humps
    UnderCamel,
    /// Alphanumeric runs, numbers keep their `.`, `:` and `,` separators
    Smart,
}

impl Tokenization {
    pub fn tokenize(&self, input: &str) -> Vec<String> {
        match self {
            Tokenization::Word => tokenize_word(input),
            Tokenization::Char => input.graphemes(true).map(str::to_string).collect(),
            Tokenization::UnderCamel => tokenize_under_camel(input),
            Tokenization::Smart => tokenize_smart(input),
        }
    }
}

impl fmt::Display for Tokenization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tokenization::Word => write!(f, "WORD"),
            Tokenization::Char => write!(f, "CHAR"),
            Tokenization::UnderCamel => write!(f, "UNDER_CAMEL"),
            Tokenization::Smart => write!(f, "SMART"),
        }
    }
}

impl FromStr for Tokenization {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WORD" => Ok(Tokenization::Word),
            "CHAR" => Ok(Tokenization::Char),
            "UNDER_CAMEL" => Ok(Tokenization::UnderCamel),
            "SMART" => Ok(Tokenization::Smart),
            _ => Err(DomainError::configuration(format!(
                "Unknown tokenization: {}. Valid tokenizations: WORD, CHAR, UNDER_CAMEL, SMART",
                s
            ))),
        }
    }
}

fn tokenize_word(input: &str) -> Vec<String> {
    WORD_SEPARATOR
        .split(input)
        .map(|token| WORD_PUNCTUATION.replace_all(token, "").into_owned())
        .filter(|token| !token.is_empty())
        .collect()
}

fn tokenize_under_camel(input: &str) -> Vec<String> {
    UNDERSCORE_OR_NON_WORD
        .split(input)
        .flat_map(split_camel_case)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Splits where an uppercase letter follows a lowercase one
fn split_camel_case(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut after_lower = false;

    for (i, c) in word.char_indices() {
        if c.is_uppercase() {
            if after_lower {
                parts.push(word[start..i].to_string());
                start = i;
            }
            after_lower = false;
        } else if c.is_lowercase() {
            after_lower = true;
        }
    }
    parts.push(word[start..].to_string());

    parts
}

fn tokenize_smart(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut numeric = false;

    for (i, c) in input.char_indices() {
        if c.is_alphanumeric() {
            numeric |= c.is_numeric();
            start.get_or_insert(i);
            continue;
        }

        if let Some(s) = start {
            if numeric && matches!(c, '.' | ':' | ',') {
                continue;
            }
            tokens.push(input[s..i].to_string());
            start = None;
            numeric = false;
        }
    }
    if let Some(s) = start {
        tokens.push(input[s..].to_string());
    }

    tokens
}
