//! Mock LLM client for testing and offline demos.
//!
//! Answers a handful of real-estate questions deterministically. When the
//! system prompt carries the obfuscated vocabulary, answers use it too.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses based on input patterns.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
}

/// Identifiers used by the canned answers.
struct Vocabulary {
    properties: &'static str,
    property_id: &'static str,
    price: &'static str,
    locations: &'static str,
    city: &'static str,
    state: &'static str,
    agents: &'static str,
    agency: &'static str,
}

const REAL: Vocabulary = Vocabulary {
    properties: "properties",
    property_id: "property_id",
    price: "price",
    locations: "locations",
    city: "city",
    state: "state",
    agents: "agents",
    agency: "agency",
};

const OBFUSCATED: Vocabulary = Vocabulary {
    properties: "real_estate_items",
    property_id: "item_id",
    price: "monetary_value",
    locations: "geographic_areas",
    city: "city_name",
    state: "state_name",
    agents: "sales_representatives",
    agency: "company_name",
};

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the question contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses.push((pattern.into(), response.into()));
        self
    }

    fn mock_response(&self, input: &str, vocabulary: &Vocabulary) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        let v = vocabulary;

        if input_lower.contains("how many") && input_lower.contains("propert") {
            return format!("```sql\nSELECT COUNT(*) FROM {};\n```", v.properties);
        }

        if input_lower.contains("expensive") || input_lower.contains("price") {
            return format!(
                "Here are the most expensive listings:\n\n```sql\nSELECT {id}, {price}\nFROM {table}\nORDER BY {price} DESC\nLIMIT 10\n```",
                id = v.property_id,
                price = v.price,
                table = v.properties
            );
        }

        if input_lower.contains("cit") || input_lower.contains("location") {
            return format!(
                "```sql\nSELECT {}, {} FROM {} LIMIT 10\n```",
                v.city, v.state, v.locations
            );
        }

        if input_lower.contains("agent") {
            return format!(
                "```sql\nSELECT first_name, last_name, {} FROM {} LIMIT 10\n```",
                v.agency, v.agents
            );
        }

        "I'm sorry, I can only help with questions about the real estate listings.".to_string()
    }

    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn vocabulary_for(messages: &[Message]) -> &'static Vocabulary {
        let obfuscated = messages
            .iter()
            .any(|m| m.role == Role::System && m.content.contains(OBFUSCATED.properties));
        if obfuscated {
            &OBFUSCATED
        } else {
            &REAL
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let input = Self::extract_user_input(messages);
        Ok(self.mock_response(&input, Self::vocabulary_for(messages)))
    }
}
