//! Structured generation: the model-backed collaborator that turns a prompt
//! template plus variables into text (usually JSON-shaped).

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::utilities::errors::BoxError;

/// Template variables, ordered by name.
pub type PromptVariables = BTreeMap<String, String>;

/// Renders a prompt template and returns the model's completion.
#[async_trait]
pub trait StructuredGenerationService: Send + Sync {
    async fn generate(
        &self,
        prompt_template: &str,
        variables: &PromptVariables,
    ) -> Result<String, BoxError>;
}
