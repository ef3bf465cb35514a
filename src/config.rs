use crate::core::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Root store configuration
///
/// Built with the builder methods or loaded from JSON:
///
/// ```
/// use unitstore::StoreConfig;
///
/// let config = StoreConfig::new("inventory").max_transaction_depth(8);
/// assert_eq!(config.name, "inventory");
///
/// let loaded = StoreConfig::from_json(r#"{ "name": "orders" }"#).unwrap();
/// assert_eq!(loaded.max_transaction_depth, Some(64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store name, used in log lines
    pub name: String,

    /// Deepest allowed transaction nesting. `None` means unbounded.
    pub max_transaction_depth: Option<usize>,

    /// Emit a trace line for every operation the root store applies
    pub log_operations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "unitstore".to_string(),
            max_transaction_depth: Some(64),
            log_operations: false,
        }
    }
}

impl StoreConfig {
    /// Default configuration under a different name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set maximum transaction nesting depth
    pub fn max_transaction_depth(mut self, depth: usize) -> Self {
        self.max_transaction_depth = Some(depth);
        self
    }

    /// Remove the nesting limit
    pub fn unbounded_nesting(mut self) -> Self {
        self.max_transaction_depth = None;
        self
    }

    /// Enable or disable per-operation trace lines
    pub fn log_operations(mut self, enabled: bool) -> Self {
        self.log_operations = enabled;
        self
    }

    /// Parse from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StoreError::ConfigError(format!("Invalid store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::ConfigError(format!("Cannot serialize store config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StoreError::ConfigError("Store name cannot be empty".to_string()));
        }

        if self.max_transaction_depth == Some(0) {
            return Err(StoreError::ConfigError(
                "max_transaction_depth must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Fails when a scope at `depth` would exceed the nesting limit
    pub(crate) fn check_depth(&self, depth: usize) -> Result<()> {
        match self.max_transaction_depth {
            Some(max) if depth > max => Err(StoreError::NestingLimit(max)),
            _ => Ok(()),
        }
    }
}
