use std::collections::HashMap;
use std::path::PathBuf;

use crate::overlay::Environment;

/// Fixed environment for probing terminal capability in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
    binaries: HashMap<String, PathBuf>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_binary(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.binaries.insert(name.to_string(), path.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn resolve(&self, binary: &str) -> Option<PathBuf> {
        self.binaries.get(binary).cloned()
    }
}
