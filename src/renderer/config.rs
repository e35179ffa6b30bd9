//! Configuration for template execution

use serde::Deserialize;

/// Limits applied while a compiled template runs
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Maximum number of nodes executed per render, 0 for no limit
    pub max_steps: usize,

    /// Maximum nesting of `{% liquefy %}` renders
    pub max_depth: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_steps: 0,
            max_depth: 16,
        }
    }
}

impl ExecutionOptions {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step limit
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// Set the nesting limit
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
