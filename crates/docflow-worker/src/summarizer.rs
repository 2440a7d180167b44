use crate::error::TransformError;
use crate::handler::Transformer;
use async_trait::async_trait;
use docflow_client::TextGenerator;
use docflow_core::DocumentContent;
use std::sync::Arc;
use tracing::debug;

const PROMPT_PREFIX: &str =
    "Please provide a concise, one-paragraph summary of the following document content:\n\n";

/// Summarizes extracted text with a generative-text backend.
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Summarizer { generator }
    }

    pub fn prompt(text: &str) -> String {
        format!("{PROMPT_PREFIX}{text}")
    }
}

#[async_trait]
impl Transformer for Summarizer {
    async fn transform(&self, content: &DocumentContent) -> Result<String, TransformError> {
        let DocumentContent::Text(text) = content else {
            return Err(TransformError::UnsupportedContent {
                expected: "text",
                actual: content.variant_name(),
            });
        };

        debug!(chars = text.len(), "Requesting summary");
        self.generator
            .generate(&Self::prompt(text))
            .await
            .map_err(|e| TransformError::Engine(e.to_string()))
    }
}
