use async_trait::async_trait;
use tracing::info;

use super::chat::CachedChatModel;
use super::render_template;
use crate::domain::classifier::{ClassificationResult, ClassificationTask, Classifier};
use crate::domain::{DomainError, Message};

/// Prompt asking for a plain yes/no answer
pub const DEFAULT_SIMPLE_TEMPLATE: &str = "Question: Here are two parts of software development artifacts.
{source_type}: '''{source_content}'''
{target_type}: '''{target_content}'''
Are they related?
Answer with 'yes' or 'no'.
";

const THINK_START: &str = "<think>";
const THINK_END: &str = "</think>";

/// Asks the model directly whether a pair is related
#[derive(Debug)]
pub struct SimpleClassifier {
    name: String,
    threads: usize,
    template: String,
    model: CachedChatModel,
}

impl SimpleClassifier {
    pub fn new(name: impl Into<String>, threads: usize, model: CachedChatModel) -> Self {
        Self {
            name: name.into(),
            threads: threads.max(1),
            template: DEFAULT_SIMPLE_TEMPLATE.to_string(),
            model,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Drops a leading reasoning block as emitted by thinking models
fn strip_thinking(response: &str) -> &str {
    if response.starts_with(THINK_START) {
        if let Some(end) = response.find(THINK_END) {
            return response[end + THINK_END.len()..].trim();
        }
    }
    response
}

fn is_related(response: &str) -> bool {
    strip_thinking(response).to_lowercase().contains("yes")
}

#[async_trait]
impl Classifier for SimpleClassifier {
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
            template: self.template.clone(),
            model: self.model.copy_of()?,
        }))
    }

    async fn classify_pair(
        &self,
        task: &ClassificationTask,
    ) -> Result<Option<ClassificationResult>, DomainError> {
        let prompt = render_template(&self.template, &task.source, &task.target);

        info!(
            model = %self.model.model_name(),
            source = %task.source.identifier(),
            target = %task.target.identifier(),
            "Classifying"
        );
        let response = self.model.chat(vec![Message::user(prompt.clone())], &prompt).await?;

        Ok(is_related(&response).then(|| ClassificationResult::related(task)))
    }
}
