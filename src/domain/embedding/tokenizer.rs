//! Token counting for embedding models

#[cfg(test)]
use mockall::automock;

/// Counts the tokens a model's tokenizer produces for a text
///
/// Implementations must be monotonic: a prefix of a text never has more tokens than the
/// text itself. Overflow recovery binary-searches prefix lengths and relies on it.
#[cfg_attr(test, automock)]
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}
