//! Language model abstraction.
//!
//! The core talks to a model only through [`LanguageModel::complete`].
//! Concrete backends (OpenAI chat completions) live in the `socratic-rag`
//! app crate and may retry transport failures internally; the core never
//! retries.

use anyhow::Result;
use async_trait::async_trait;

/// A single prompt: optional system instruction plus the user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

impl From<String> for Prompt {
    fn from(user: String) -> Self {
        Prompt::user(user)
    }
}

impl From<&str> for Prompt {
    fn from(user: &str) -> Self {
        Prompt::user(user)
    }
}

/// Trait for text-completion backends.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use socratic_rag_core::llm::{LanguageModel, Prompt};
///
/// struct Echo;
///
/// #[async_trait]
/// impl LanguageModel for Echo {
///     fn model_name(&self) -> &str { "echo" }
///
///     async fn complete(&self, prompt: &Prompt) -> Result<String> {
///         Ok(prompt.user.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for std::sync::Arc<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        (**self).complete(prompt).await
    }
}
