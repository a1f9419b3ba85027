use std::sync::Arc;

use dashmap::DashMap;

use crate::builtins;
use crate::error::{RegistryError, Result};
use crate::handler::{Handler, PayloadOnly};

/// A process-wide, concurrent map from lowercased task name to handler.
///
/// Registers the built-in taxonomy at construction. Accepts further registrations at any
/// time — the "overlay" pattern in the design notes becomes an explicit call to
/// [`HandlerRegistry::register`] with handlers supplied by the binary at startup, rather
/// than a late-bound dynamic import.
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// A registry with the built-in taxonomy (`plan`, `codegen`, `execute`, `analyze`,
    /// `report`, `pipeline`) plus the `unknown` sentinel always registered.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry
            .register("plan", Arc::new(PayloadOnly(builtins::plan)))
            .expect("built-in name is non-empty");
        registry
            .register("codegen", Arc::new(PayloadOnly(builtins::codegen)))
            .expect("built-in name is non-empty");
        registry
            .register("execute", Arc::new(PayloadOnly(builtins::execute)))
            .expect("built-in name is non-empty");
        registry
            .register("analyze", Arc::new(PayloadOnly(builtins::analyze)))
            .expect("built-in name is non-empty");
        registry
            .register("report", Arc::new(PayloadOnly(builtins::report)))
            .expect("built-in name is non-empty");
        registry
            .register("pipeline", Arc::new(builtins::pipeline_handler()))
            .expect("built-in name is non-empty");
        registry
            .register("unknown", Arc::new(builtins::unknown_handler()))
            .expect("built-in name is non-empty");
        registry
    }

    /// Registers (or replaces) a handler under `name`. Rejects an empty name.
    pub fn register(&self, name: &str, handler: Arc<dyn Handler>) -> Result<()> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Resolves a task name to its handler, falling back to the `unknown` sentinel when
    /// unregistered (or when the registry was built via [`HandlerRegistry::empty`] and
    /// never given one — callers should prefer [`HandlerRegistry::with_builtins`]).
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&name.trim().to_lowercase()).map(|entry| entry.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.trim().to_lowercase())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_builtins_registers_full_taxonomy() {
        let registry = HandlerRegistry::with_builtins();
        for name in ["plan", "codegen", "execute", "analyze", "report", "pipeline", "unknown"] {
            assert!(registry.contains(name), "missing built-in: {name}");
        }
    }

    #[test]
    fn register_rejects_empty_name() {
        let registry = HandlerRegistry::empty();
        let result = registry.register("  ", Arc::new(builtins::unknown_handler()));
        assert!(matches!(result, Err(RegistryError::EmptyName)));
    }

    #[test]
    fn register_lowercases_name() {
        let registry = HandlerRegistry::empty();
        registry
            .register("CustomTask", Arc::new(builtins::unknown_handler()))
            .unwrap();
        assert!(registry.contains("customtask"));
        assert!(registry.contains("CUSTOMTASK"));
    }
}
