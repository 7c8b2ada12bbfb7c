//! Prompt template with `{context}` and `{question}` slots.
//!
//! Rendering is a single left-to-right pass, so a retrieved chunk or a
//! question that itself contains `{question}` or `{context}` is copied
//! verbatim rather than substituted again.

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "Use the context below to answer the question.
If you don't know the answer, just say that you don't know.

Context: {context}
Question: {question}

Answer:
";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("prompt template is missing the {0} slot")]
    MissingSlot(&'static str),
}

/// A validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Validate that `template` contains both slots.
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        if !template.contains(CONTEXT_SLOT) {
            return Err(PromptError::MissingSlot(CONTEXT_SLOT));
        }
        if !template.contains(QUESTION_SLOT) {
            return Err(PromptError::MissingSlot(QUESTION_SLOT));
        }
        Ok(Self { template })
    }

    /// Substitute every slot occurrence with `context` / `question`.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out =
            String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}
