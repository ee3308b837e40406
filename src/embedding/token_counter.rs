use super::TokenCounter;
use crate::config::TokenizerConfig;
use crate::error::{ConfigError, EmbeddingError};
use std::path::Path;
use tokenizers::Tokenizer;

/// Token counter over a HuggingFace `tokenizer.json`
///
/// The optional prompt prefix is counted too, so budgets reflect what the
/// model actually receives. Truncation and padding from the vocabulary file
/// are switched off: counts are always the full length of the input.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
    prompt_prefix: String,
    add_special_tokens: bool,
}

impl HfTokenCounter {
    /// Load the vocabulary file. A missing file is a configuration error.
    pub fn from_file(
        path: &Path,
        prompt_prefix: impl Into<String>,
        add_special_tokens: bool,
    ) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::VocabularyNotFound(path.display().to_string()));
        }

        let mut tokenizer = Tokenizer::from_file(path).map_err(|e| {
            ConfigError::LoadFailed(format!(
                "Failed to load tokenizer {}: {}",
                path.display(),
                e
            ))
        })?;
        tokenizer.with_padding(None);
        tokenizer.with_truncation(None).map_err(|e| {
            ConfigError::LoadFailed(format!(
                "Failed to disable truncation for {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!("Loaded tokenizer vocabulary from {}", path.display());

        Ok(Self {
            tokenizer,
            prompt_prefix: prompt_prefix.into(),
            add_special_tokens,
        })
    }

    pub fn from_config(config: &TokenizerConfig) -> Result<Self, ConfigError> {
        Self::from_file(
            &config.vocab_path,
            config.prompt_prefix.clone(),
            config.add_special_tokens,
        )
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize, EmbeddingError> {
        let input = if self.prompt_prefix.is_empty() {
            text.to_string()
        } else {
            format!("{}{}", self.prompt_prefix, text)
        };

        let encoding = self
            .tokenizer
            .encode(input, self.add_special_tokens)
            .map_err(|e| EmbeddingError::TokenizationFailed(e.to_string()))?;

        Ok(encoding.len())
    }
}
