//! Classifier implementations backed by chat models

mod chat;
mod factory;
mod mock;
mod pipeline;
mod reasoning;
mod simple;

pub use chat::{CachedChatModel, ChatBackendFactory};
pub use factory::{
    create_classifier, create_classifier_with_endpoint, create_pipeline_classifier,
    ClassifierConfig, ClassifierKind, DEFAULT_SEED, DEFAULT_TEMPERATURE,
};
pub use mock::MockClassifier;
pub use pipeline::PipelineClassifier;
pub use reasoning::{resolve_reasoning_prompt, ReasoningClassifier, REASONING_PROMPTS};
pub use simple::{SimpleClassifier, DEFAULT_SIMPLE_TEMPLATE};

use crate::domain::knowledge::Element;

/// Fills the `{source_*}` and `{target_*}` placeholders of a prompt template
pub(crate) fn render_template(template: &str, source: &Element, target: &Element) -> String {
    template
        .replace("{source_type}", source.element_type())
        .replace("{source_content}", source.content())
        .replace("{target_type}", target.element_type())
        .replace("{target_content}", target.content())
}
