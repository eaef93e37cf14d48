//! Turns free-text donor messages into structured [`Intent`]s.
//!
//! The operator only sees the [`Classifier`] trait; whether an LLM or the
//! keyword matcher produced the intent is invisible downstream.

mod keyword;
mod llm;

pub use keyword::KeywordClassifier;
pub use llm::LlmClassifier;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use hopelink_protocol::Intent;

use crate::config::{ClassifierConfig, ClassifierProvider};

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &str) -> Result<Intent>;
}

/// Build the classifier the configuration asks for.
pub fn from_config(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>> {
    Ok(match config.provider {
        ClassifierProvider::Keyword => Arc::new(KeywordClassifier::new()),
        ClassifierProvider::Anthropic | ClassifierProvider::OpenAi => {
            Arc::new(LlmClassifier::new(config)?)
        }
    })
}
