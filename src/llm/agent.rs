//! Structured view of a model answer.
//!
//! A completion is either plain text or a JSON object produced by an agent
//! that records the statements it ran along the way.

use serde::{Deserialize, Serialize};

/// One recorded step of an agent run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntermediateStep {
    /// Statement issued in this step.
    #[serde(default, alias = "sql")]
    pub sql_cmd: Option<String>,
    /// Result the agent observed, possibly stringified rows.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl IntermediateStep {
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            sql_cmd: Some(sql.into()),
            result: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<serde_json::Value>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// The result as text. String results are returned as-is.
    pub fn result_text(&self) -> Option<String> {
        match self.result.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Everything the model produced for one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The main completion text.
    pub completion: String,
    #[serde(default)]
    pub intermediate_steps: Vec<IntermediateStep>,
    /// The model's natural-language answer, if separate from the completion.
    #[serde(default)]
    pub final_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredCompletion {
    #[serde(default, alias = "sql_cmd", alias = "query")]
    sql: Option<String>,
    #[serde(default, alias = "final_answer")]
    answer: Option<String>,
    #[serde(default)]
    intermediate_steps: Vec<IntermediateStep>,
}

impl AgentOutput {
    /// Wraps a plain completion.
    pub fn text(completion: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
            ..Self::default()
        }
    }

    pub fn with_step(mut self, step: IntermediateStep) -> Self {
        self.intermediate_steps.push(step);
        self
    }

    pub fn with_final_answer(mut self, answer: impl Into<String>) -> Self {
        self.final_answer = Some(answer.into());
        self
    }

    /// Interprets raw model output.
    ///
    /// A JSON object with `sql`, `answer` or `intermediate_steps` is taken
    /// apart; anything else is kept verbatim as the completion.
    pub fn from_completion(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            if let Ok(structured) = serde_json::from_str::<StructuredCompletion>(trimmed) {
                let has_content = structured.sql.is_some()
                    || structured.answer.is_some()
                    || !structured.intermediate_steps.is_empty();
                if has_content {
                    return Self {
                        completion: structured.sql.unwrap_or_default(),
                        intermediate_steps: structured.intermediate_steps,
                        final_answer: structured.answer,
                    };
                }
            }
        }
        Self::text(raw)
    }
}
