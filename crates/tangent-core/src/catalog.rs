//! Display model names offered on the canvas and the provider serving each.
//!
//! The table is configuration data: `Config` carries one, and the default
//! mirrors the stock palette.

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub provider: Provider,
}

impl ModelEntry {
    pub fn new(name: &str, provider: Provider) -> Self {
        Self {
            name: name.to_string(),
            provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(vec![
            ModelEntry::new("GPT-4", Provider::OpenAI),
            ModelEntry::new("Claude", Provider::Anthropic),
            ModelEntry::new("Gemini", Provider::Google),
            ModelEntry::new("Llama", Provider::Ollama),
        ])
    }
}

impl ModelCatalog {
    pub fn new(entries: Vec<ModelEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Provider serving `model_name`; the first entry wins on duplicates
    pub fn provider_for(&self, model_name: &str) -> Option<Provider> {
        self.entries
            .iter()
            .find(|e| e.name == model_name)
            .map(|e| e.provider)
    }

    pub fn models_for(&self, provider: Provider) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.provider == provider)
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<&ModelEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette() {
        let catalog = ModelCatalog::default();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["GPT-4", "Claude", "Gemini", "Llama"]);
        assert_eq!(catalog.provider_for("Claude"), Some(Provider::Anthropic));
        assert_eq!(catalog.provider_for("Mistral"), None);
    }

    #[test]
    fn test_first_entry_wins() {
        let catalog = ModelCatalog::new(vec![
            ModelEntry::new("Shared", Provider::Google),
            ModelEntry::new("Shared", Provider::OpenAI),
        ]);
        assert_eq!(catalog.provider_for("Shared"), Some(Provider::Google));
        assert_eq!(catalog.models_for(Provider::OpenAI), vec!["Shared"]);
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let catalog = ModelCatalog::new(vec![ModelEntry::new("GPT-4", Provider::OpenAI)]);
        let json = serde_json::to_string(&catalog).unwrap();
        assert_eq!(json, r#"[{"name":"GPT-4","provider":"OpenAI"}]"#);
    }
}
