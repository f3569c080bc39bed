/// BERT tokenizer wrapper around HuggingFace `tokenizers` crate.
///
/// Truncation is disabled: an infraction longer than the model context is
/// reported as an embedding failure instead of being scored on a clipped
/// prefix.
use std::path::Path;

use tokenizers::Tokenizer;

use super::EmbedderError;

/// XLM-RoBERTa context length.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Wrapper around the HuggingFace tokenizer for BERT-style models.
pub struct BertTokenizer {
    inner: Tokenizer,
    max_length: usize,
}

/// Output of a tokenization operation.
#[derive(Debug, Clone)]
pub struct TokenizerOutput {
    /// Token IDs (input_ids for the model).
    pub input_ids: Vec<i64>,
    /// Attention mask (1 for real tokens, 0 for padding).
    pub attention_mask: Vec<i64>,
}

impl TokenizerOutput {
    #[must_use]
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

impl BertTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file in the model directory.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self, EmbedderError> {
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !tokenizer_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "tokenizer.json not found in {}",
                model_dir.display()
            )));
        }

        let mut inner = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("failed to load tokenizer: {e}")))?;

        let _ = inner.with_truncation(None);
        inner.with_padding(None);

        Ok(Self {
            inner,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Tokenize a single text, returning input IDs and attention mask.
    ///
    /// Fails with [`EmbedderError::InputTooLong`] when the encoded text does
    /// not fit the model context.
    pub fn tokenize(&self, text: &str) -> Result<TokenizerOutput, EmbedderError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| EmbedderError::TokenizerError(format!("failed to encode text: {e}")))?;

        let tokens = encoding.get_ids().len();
        if tokens > self.max_length {
            return Err(EmbedderError::InputTooLong {
                tokens,
                max: self.max_length,
            });
        }

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        Ok(TokenizerOutput {
            input_ids,
            attention_mask,
        })
    }

    /// Get the vocabulary size.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    /// Get the configured maximum sequence length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}
