//! Prompt construction for LLM requests.
//!
//! Builds the system prompt with the schema description the model is
//! allowed to see.

use crate::llm::types::Message;
use crate::llm::LlmProvider;

/// Full prompt for hosted models.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a SQL expert for a real estate data warehouse. Translate user questions into a single read-only SQL query.

DATABASE SCHEMA:
{schema}

RULES:
- Use ONLY the table and column names listed above
- Return exactly one SELECT, SHOW or DESCRIBE statement
- For count questions use COUNT(*) without LIMIT
- For every other query add LIMIT 10
- For rankings use RANK() OVER (ORDER BY ...)
- For database or schema questions use CURRENT_DATABASE() and CURRENT_SCHEMA(),
  never hardcoded names
- Never modify data

EXAMPLES:
Question: what database are we using
Answer: SELECT CURRENT_DATABASE() AS database_name

Question: show me all tables
Answer: SELECT TABLE_NAME, TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = CURRENT_SCHEMA() ORDER BY TABLE_NAME

OUTPUT FORMAT:
Return the SQL query wrapped in a ```sql code block, with no explanation."#;

/// Shorter prompt for small local models.
const LOCAL_PROMPT_TEMPLATE: &str = r#"You are a SQL expert. Generate one clean, executable SQL query.

DATABASE SCHEMA:
{schema}

Rules:
1. Return pure SQL only, in a ```sql code block
2. Use only the names listed above
3. Use LIMIT 10 for SELECT queries, except COUNT(*)
4. Use proper JOIN syntax
5. Use CURRENT_DATABASE() and CURRENT_SCHEMA() for metadata questions"#;

/// Builds the system prompt for `provider` with the schema injected.
pub fn build_system_prompt(provider: LlmProvider, schema_description: &str) -> String {
    let template = match provider {
        LlmProvider::Ollama => LOCAL_PROMPT_TEMPLATE,
        _ => SYSTEM_PROMPT_TEMPLATE,
    };
    template.replace("{schema}", schema_description.trim_end())
}

/// Builds the message list for a single question.
pub fn build_messages(
    provider: LlmProvider,
    schema_description: &str,
    question: &str,
) -> Vec<Message> {
    vec![
        Message::system(build_system_prompt(provider, schema_description)),
        Message::user(question),
    ]
}
