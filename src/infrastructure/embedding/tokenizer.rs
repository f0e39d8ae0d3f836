use std::fmt;

use tiktoken_rs::CoreBPE;

use crate::domain::embedding::TokenCounter;

/// Token counter backed by the BPE encoding of an OpenAI model
pub struct TiktokenCounter {
    model: String,
    bpe: CoreBPE,
}

impl fmt::Debug for TiktokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenCounter")
            .field("model", &self.model)
            .finish()
    }
}

impl TiktokenCounter {
    /// Counter for `model`, `None` if no encoding is known for it
    pub fn for_model(model: &str) -> Option<Self> {
        tiktoken_rs::get_bpe_from_model(model).ok().map(|bpe| Self {
            model: model.to_string(),
            bpe,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}
