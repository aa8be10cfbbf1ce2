//! Agent registry — priority-ordered name resolution, read-only at run time.

use std::collections::HashMap;
use tracing::info;

use flowclaw_core::{AgentDefinition, AgentSource, ResolvedAgent};

/// Resolves agent names to either a custom definition or a host-builtin
/// handle. Custom definitions shadow builtins with the same name.
///
/// A registry snapshot is captured when a workflow run starts; nothing here
/// mutates during a run, so runs share a registry freely.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    custom: HashMap<String, AgentDefinition>,
    host_builtins: Vec<String>,
}

impl AgentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a batch of custom definitions.
    pub fn with_agents(definitions: Vec<AgentDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.install(definition);
        }
        registry
    }

    /// Declare the names the host resolves itself.
    pub fn with_host_builtins<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add_host_builtin(name.into());
        }
        self
    }

    /// Install a custom agent definition.
    pub fn install(&mut self, definition: AgentDefinition) {
        info!("📦 Registered agent: {}", definition.name);
        self.custom.insert(definition.name.clone(), definition);
    }

    /// Register a host-builtin agent name.
    pub fn add_host_builtin(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.host_builtins.contains(&name) {
            self.host_builtins.push(name);
        }
    }

    /// Resolve a name. Custom wins over host-builtin.
    pub fn resolve(&self, name: &str) -> Option<ResolvedAgent> {
        if let Some(definition) = self.custom.get(name) {
            return Some(ResolvedAgent {
                name: name.to_string(),
                source: AgentSource::Custom,
                definition: Some(definition.clone()),
            });
        }
        if self.host_builtins.iter().any(|builtin| builtin == name) {
            return Some(ResolvedAgent {
                name: name.to_string(),
                source: AgentSource::Host,
                definition: None,
            });
        }
        None
    }

    /// Priority-merged set of every resolvable name, sorted for stable
    /// error messages.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.custom.keys().cloned().collect();
        for builtin in &self.host_builtins {
            if !self.custom.contains_key(builtin) {
                names.push(builtin.clone());
            }
        }
        names.sort_unstable();
        names
    }

    /// Count of resolvable names.
    pub fn count(&self) -> usize {
        self.list_names().len()
    }
}
