//! Name-keyed tool registry.

use super::{Tool, ToolError, ToolSpec};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Immutable-after-startup mapping from tool name to implementation.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name declared in its spec.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let spec = tool.spec().clone();
        if self.tools.contains_key(&spec.name) {
            return Err(Error::DuplicateTool(spec.name));
        }
        self.tools.insert(spec.name.clone(), tool);
        self.specs.push(spec);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Result<Self> {
        self.register(Arc::new(tool))?;
        Ok(self)
    }

    /// Find the implementation for `name`.
    pub fn lookup(&self, name: &str) -> std::result::Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered specs, in registration order.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check a separately declared catalog against the registry.
    ///
    /// Every declared tool must be registered with an identical spec and every
    /// registered tool must be declared, so drift surfaces at startup instead
    /// of as `UnknownTool` or rejected arguments mid-conversation.
    pub fn verify_catalog(&self, catalog: &[ToolSpec]) -> Result<()> {
        let mut declared = HashSet::new();
        for spec in catalog {
            if !declared.insert(spec.name.as_str()) {
                return Err(Error::CatalogMismatch(format!(
                    "`{}` is declared twice",
                    spec.name
                )));
            }
            let Some(tool) = self.tools.get(&spec.name) else {
                return Err(Error::CatalogMismatch(format!(
                    "`{}` is declared but not registered",
                    spec.name
                )));
            };
            if tool.spec() != spec {
                return Err(Error::CatalogMismatch(format!(
                    "declared schema of `{}` differs from the registered tool",
                    spec.name
                )));
            }
        }

        let mut undeclared: Vec<&str> = self
            .specs
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !declared.contains(name))
            .collect();
        if !undeclared.is_empty() {
            undeclared.sort_unstable();
            return Err(Error::CatalogMismatch(format!(
                "registered but not declared: {}",
                undeclared.join(", ")
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.specs.iter().map(|s| &s.name).collect::<Vec<_>>())
            .finish()
    }
}
