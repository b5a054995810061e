// SPDX-License-Identifier: MIT

//! Workflows shipped with the crate

pub mod coaching;
pub mod research;

use crate::workflow::registry::WorkflowRegistry;
use std::error::Error;

/// Registry holding every built-in workflow
pub fn default_registry() -> Result<WorkflowRegistry, Box<dyn Error + Send + Sync>> {
    let mut registry = WorkflowRegistry::new();
    registry.register(research::WORKFLOW_ID, research::definition()?, research::tools())?;
    registry.register(coaching::WORKFLOW_ID, coaching::definition()?, coaching::tools())?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_lists_builtins() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.get_available_workflows(), vec!["coaching", "research"]);
        assert!(registry.is_valid_workflow("research"));
        assert!(!registry.is_valid_workflow("unknown"));
    }
}
