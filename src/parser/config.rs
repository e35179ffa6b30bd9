//! Configuration for template parsing

use serde::Deserialize;

/// Options that affect how template source is compiled
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Whether `{% liquefy %}` is accepted; when off it is a syntax error
    pub liquefy_tag: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { liquefy_tag: true }
    }
}

impl ParserOptions {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the `liquefy` tag
    pub fn with_liquefy_tag(mut self, enabled: bool) -> Self {
        self.liquefy_tag = enabled;
        self
    }
}
