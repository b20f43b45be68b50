// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Processor registry
//!
//! Resolution never fails: a name with no registered processor goes to the
//! fallback factory, which by default produces a processor whose execution
//! reports the tool as unknown.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::builtin;
use super::{
    CustomToolDefinition, CustomToolHandler, ExecutionContext, Processor, ProcessorKind,
    ToolCall, ToolOutcome,
};
use crate::agents::AgentSpawner;
use crate::error::{Result, ToolstreamError};

/// Builds a processor for a name nothing is registered under
pub type ProcessorFactory = Arc<dyn Fn(&str) -> Arc<dyn Processor> + Send + Sync>;

/// Registry of tool processors
#[derive(Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
    fallback: ProcessorFactory,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.names())
            .finish_non_exhaustive()
    }
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
            fallback: Arc::new(|name: &str| -> Arc<dyn Processor> {
                Arc::new(UnknownToolProcessor::new(name))
            }),
        }
    }

    /// Create a registry with the built-in state tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::AddSubgoalProcessor));
        registry.register(Arc::new(builtin::UpdateSubgoalProcessor));
        registry.register(Arc::new(builtin::SetOutputProcessor));
        registry.register(Arc::new(builtin::EndTurnProcessor));
        registry
    }

    /// Built-ins plus a fallback serving the session's declared tools.
    ///
    /// Declared names resolve to a [`CustomToolProcessor`] backed by
    /// `handler`; anything else resolves to an [`UnknownToolProcessor`].
    pub fn with_custom_tools(
        definitions: Vec<CustomToolDefinition>,
        handler: Arc<dyn CustomToolHandler>,
    ) -> Self {
        let definitions: Arc<HashMap<String, CustomToolDefinition>> = Arc::new(
            definitions
                .into_iter()
                .map(|def| (def.name.clone(), def))
                .collect(),
        );

        Self::with_builtins().with_fallback(Arc::new(move |name: &str| -> Arc<dyn Processor> {
            match definitions.get(name) {
                Some(definition) => Arc::new(CustomToolProcessor::new(
                    definition.clone(),
                    handler.clone(),
                )),
                None => Arc::new(UnknownToolProcessor::new(name)),
            }
        }))
    }

    /// Register the spawn_agents tool.
    ///
    /// Kept apart from `with_builtins()` because it needs a spawner.
    pub fn register_spawn_agents(&mut self, spawner: Arc<dyn AgentSpawner>) {
        self.register(Arc::new(builtin::SpawnAgentsProcessor::new(spawner)));
    }

    /// Replace the fallback factory
    pub fn with_fallback(mut self, fallback: ProcessorFactory) -> Self {
        self.fallback = fallback;
        self
    }

    /// Register a processor under its kind's name
    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        let name = processor.kind().name().to_string();
        self.processors.insert(name, processor);
    }

    /// Remove a processor
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Processor>> {
        self.processors.remove(name)
    }

    /// Processor for a tool name
    pub fn resolve(&self, name: &str) -> Arc<dyn Processor> {
        match self.processors.get(name) {
            Some(processor) => processor.clone(),
            None => (self.fallback)(name),
        }
    }

    /// Whether a processor is registered (the fallback does not count)
    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processors.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Processor for a declared custom tool
pub struct CustomToolProcessor {
    definition: CustomToolDefinition,
    handler: Arc<dyn CustomToolHandler>,
}

impl CustomToolProcessor {
    pub fn new(definition: CustomToolDefinition, handler: Arc<dyn CustomToolHandler>) -> Self {
        Self {
            definition,
            handler,
        }
    }
}

#[async_trait]
impl Processor for CustomToolProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Custom {
            name: self.definition.name.clone(),
            schema: self.definition.input_schema.clone(),
        }
    }

    async fn on_end(
        &self,
        call: &ToolCall,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        self.handler.handle(&self.definition, call, ctx).await
    }
}

/// Processor for a name nothing handles; execution always fails
#[derive(Debug, Clone)]
pub struct UnknownToolProcessor {
    name: String,
}

impl UnknownToolProcessor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Processor for UnknownToolProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Unknown(self.name.clone())
    }

    async fn on_end(
        &self,
        call: &ToolCall,
        _ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        Err(ToolstreamError::ToolExecution(format!(
            "Tool {} not found",
            call.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::abort::AbortSignal;
    use crate::chat::state::TurnState;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl CustomToolHandler for EchoHandler {
        async fn handle(
            &self,
            definition: &CustomToolDefinition,
            call: &ToolCall,
            _ctx: &mut ExecutionContext<'_>,
        ) -> Result<ToolOutcome> {
            Ok(ToolOutcome::new(json!({
                "tool": definition.name,
                "input": call.input,
            }))
            .with_credits(1))
        }
    }

    async fn execute(registry: &ProcessorRegistry, call: &ToolCall) -> Result<ToolOutcome> {
        let mut state = TurnState::new("base");
        let mut ctx = ExecutionContext {
            state: &mut state,
            abort: AbortSignal::new(),
        };
        registry.resolve(&call.name).on_end(call, &mut ctx).await
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ProcessorRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["add_subgoal", "end_turn", "set_output", "update_subgoal"]
        );
        assert!(registry.contains("end_turn"));
        assert!(!registry.contains("spawn_agents"));
        assert_eq!(
            registry.resolve("end_turn").kind(),
            ProcessorKind::BuiltIn("end_turn".to_string())
        );
    }

    #[test]
    fn test_resolve_never_fails() {
        let registry = ProcessorRegistry::new();
        assert_eq!(
            registry.resolve("mystery").kind(),
            ProcessorKind::Unknown("mystery".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_processor_errors_on_execution() {
        let registry = ProcessorRegistry::new();
        let err = execute(&registry, &ToolCall::new("mystery", json!({})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Tool mystery not found"));
    }

    #[tokio::test]
    async fn test_custom_tools_fallback() {
        let registry = ProcessorRegistry::with_custom_tools(
            vec![CustomToolDefinition::new("deploy", "Deploy the app")],
            Arc::new(EchoHandler),
        );

        assert!(matches!(
            registry.resolve("deploy").kind(),
            ProcessorKind::Custom { ref name, .. } if name == "deploy"
        ));
        assert!(matches!(
            registry.resolve("other").kind(),
            ProcessorKind::Unknown(_)
        ));
        assert!(registry.contains("add_subgoal"));

        let outcome = execute(&registry, &ToolCall::new("deploy", json!({"env": "prod"})))
            .await
            .unwrap();
        assert_eq!(outcome.output["tool"], "deploy");
        assert_eq!(outcome.output["input"]["env"], "prod");
        assert_eq!(outcome.credits, 1);
    }

    #[test]
    fn test_register_and_unregister() {
        let mut registry = ProcessorRegistry::new();
        registry.register(Arc::new(builtin::EndTurnProcessor));
        assert!(registry.contains("end_turn"));
        assert!(registry.unregister("end_turn").is_some());
        assert!(!registry.contains("end_turn"));
    }
}
