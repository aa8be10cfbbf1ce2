//! Agent resolution types and the input envelope handed to an agent step.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a resolved agent came from. Custom definitions shadow host builtins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentSource {
    /// Loaded from a user-authored definition.
    Custom,
    /// Resolved by the host runtime itself.
    Host,
}

/// A user-authored agent definition, as produced by the (out-of-core)
/// markdown+frontmatter loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Model override; `None` means the host default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// System instructions prepended to the step prompt.
    #[serde(default)]
    pub prompt: String,
}

impl AgentDefinition {
    pub fn new(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            model: None,
            prompt: prompt.to_string(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }
}

/// Outcome of a registry lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedAgent {
    pub name: String,
    pub source: AgentSource,
    /// Present when `source` is `Custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<AgentDefinition>,
}

/// Input envelope for one agent step execution.
///
/// `input` is the primary task payload (the workflow input, or the result of
/// the step named by the step's `input` field). `context` carries every prior
/// step result keyed by step id.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInput {
    pub input: Value,
    pub context: Map<String, Value>,
}

impl AgentInput {
    pub fn new(input: Value, context: Map<String, Value>) -> Self {
        Self { input, context }
    }

    /// Flatten into the `{input, context, <stepId>: result, …}` object shape.
    /// Step ids that would collide with the fixed keys stay reachable under
    /// `context`.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("input".to_string(), self.input.clone());
        out.insert("context".to_string(), Value::Object(self.context.clone()));
        for (step_id, result) in &self.context {
            if step_id != "input" && step_id != "context" {
                out.insert(step_id.clone(), result.clone());
            }
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolved_agent_serde_shape() {
        let resolved = ResolvedAgent {
            name: "plan".to_string(),
            source: AgentSource::Custom,
            definition: Some(AgentDefinition::new("plan", "You plan things.")),
        };
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["source"], "custom");
        assert_eq!(json["definition"]["name"], "plan");
    }

    #[test]
    fn test_agent_input_flattens_step_results() {
        let mut context = Map::new();
        context.insert("plan".to_string(), json!({"files": ["a.rs"]}));
        let input = AgentInput::new(json!({"task": "build"}), context);

        let value = input.to_value();
        assert_eq!(value["input"]["task"], "build");
        assert_eq!(value["context"]["plan"]["files"][0], "a.rs");
        assert_eq!(value["plan"]["files"][0], "a.rs");
    }

    #[test]
    fn test_agent_input_reserved_keys_not_clobbered() {
        let mut context = Map::new();
        context.insert("input".to_string(), json!("shadow"));
        let input = AgentInput::new(json!("primary"), context);

        let value = input.to_value();
        assert_eq!(value["input"], "primary");
        assert_eq!(value["context"]["input"], "shadow");
    }
}
