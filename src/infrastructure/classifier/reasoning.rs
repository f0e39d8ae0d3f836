use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::chat::CachedChatModel;
use super::render_template;
use crate::domain::classifier::{ClassificationResult, ClassificationTask, Classifier};
use crate::domain::knowledge::Element;
use crate::domain::llm::render_conversation;
use crate::domain::{DomainError, Message};

/// Built-in prompts, selectable by index
pub const REASONING_PROMPTS: [&str; 3] = [
    "Below are two artifacts from the same software system. Is there a traceability link between (1) and (2)? Give your reasoning and then answer with 'yes' or 'no' enclosed in <trace> </trace>.\n (1) {source_type}: '''{source_content}''' \n (2) {target_type}: '''{target_content}''' ",
    "Below are two artifacts from the same software system. Is there a conceivable traceability link between (1) and (2)? Give your reasoning and then answer with 'yes' or 'no' enclosed in <trace> </trace>.\n (1) {source_type}: '''{source_content}''' \n (2) {target_type}: '''{target_content}''' ",
    "Below are two artifacts from the same software system.\n Is there a traceability link between (1) and (2)? Give your reasoning and then answer with 'yes' or 'no' enclosed in <trace> </trace>. Only answer yes if you are absolutely certain.\n (1) {source_type}: '''{source_content}''' \n (2) {target_type}: '''{target_content}''' ",
];

const SYSTEM_MESSAGE: &str =
    "Your job is to determine if there is a traceability link between two artifacts of a system.";

static TRACE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<trace>(.*?)</trace>").unwrap());

/// Resolves a prompt setting: an index into [`REASONING_PROMPTS`] or literal prompt text
pub fn resolve_reasoning_prompt(prompt: Option<&str>) -> Result<String, DomainError> {
    let Some(prompt) = prompt else {
        return Ok(REASONING_PROMPTS[0].to_string());
    };

    match prompt.trim().parse::<usize>() {
        Ok(index) => REASONING_PROMPTS
            .get(index)
            .map(|p| p.to_string())
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "Unknown reasoning prompt index: {}. Valid indices: 0..{}",
                    index,
                    REASONING_PROMPTS.len() - 1
                ))
            }),
        Err(_) => Ok(prompt.to_string()),
    }
}

/// Asks the model to reason and answer inside a `<trace>` tag
#[derive(Debug)]
pub struct ReasoningClassifier {
    name: String,
    threads: usize,
    prompt: String,
    use_original_artifacts: bool,
    use_system_message: bool,
    model: CachedChatModel,
}

impl ReasoningClassifier {
    pub fn new(name: impl Into<String>, threads: usize, model: CachedChatModel) -> Self {
        Self {
            name: name.into(),
            threads: threads.max(1),
            prompt: REASONING_PROMPTS[0].to_string(),
            use_original_artifacts: false,
            use_system_message: true,
            model,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Classify against the artifact a target was derived from instead of the target itself
    pub fn with_original_artifacts(mut self, enabled: bool) -> Self {
        self.use_original_artifacts = enabled;
        self
    }

    pub fn with_system_message(mut self, enabled: bool) -> Self {
        self.use_system_message = enabled;
        self
    }

    fn messages(&self, source: &Element, target: &Element) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if self.use_system_message {
            messages.push(Message::system(SYSTEM_MESSAGE));
        }
        messages.push(Message::user(render_template(&self.prompt, source, target)));
        messages
    }
}

fn is_related(response: &str) -> bool {
    match TRACE_TAG.find(response) {
        Some(tag) => tag.as_str().to_lowercase().contains("yes"),
        None => {
            debug!(response, "No trace tag found in response");
            false
        }
    }
}

fn root_of(element: &Arc<Element>) -> Arc<Element> {
    let mut current = Arc::clone(element);
    while let Some(parent) = current.parent().cloned() {
        current = parent;
    }
    current
}

#[async_trait]
impl Classifier for ReasoningClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn threads(&self) -> usize {
        self.threads
    }

    fn copy_of(&self) -> Result<Box<dyn Classifier>, DomainError> {
        Ok(Box::new(Self {
            name: self.name.clone(),
            threads: self.threads,
            prompt: self.prompt.clone(),
            use_original_artifacts: self.use_original_artifacts,
            use_system_message: self.use_system_message,
            model: self.model.copy_of()?,
        }))
    }

    async fn classify_pair(
        &self,
        task: &ClassificationTask,
    ) -> Result<Option<ClassificationResult>, DomainError> {
        let target = if self.use_original_artifacts {
            root_of(&task.target)
        } else {
            Arc::clone(&task.target)
        };

        let messages = self.messages(&task.source, &target);
        let cache_content = render_conversation(&messages);

        info!(
            model = %self.model.model_name(),
            source = %task.source.identifier(),
            target = %target.identifier(),
            "Classifying"
        );
        let response = self.model.chat(messages, &cache_content).await?;

        if !is_related(&response) {
            return Ok(None);
        }
        ClassificationResult::new(Arc::clone(&task.source), target, 1.0).map(Some)
    }
}
