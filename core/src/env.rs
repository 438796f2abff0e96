//! Environment bindings for the launched entrypoint.
//!
//! Values are resolved once, when the environment is provisioned. An unset
//! source resolves to the empty string so every declared name is present
//! when the entrypoint starts.

use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Source from which a binding's value is taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvSource {
    /// Provided directly.
    Literal(String),
    /// Read from a variable of the provisioning process.
    FromVar(String),
    /// No value supplied.
    Unset,
}

impl EnvSource {
    /// Resolves the value, falling back to the empty string.
    pub fn resolve(&self) -> String {
        match self {
            EnvSource::Literal(value) => value.clone(),
            EnvSource::FromVar(var_name) => env::var(var_name).unwrap_or_default(),
            EnvSource::Unset => String::new(),
        }
    }
}

/// Ordered set of resolved environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a list of bindings into an environment.
    pub fn from_bindings(bindings: &[(String, EnvSource)]) -> Result<Self> {
        let mut environment = Self::new();
        for (name, source) in bindings {
            environment.bind_source(name, source)?;
        }
        Ok(environment)
    }

    /// Binds `name` to `value`. An absent value is bound as the empty string.
    pub fn bind(&mut self, name: &str, value: Option<String>) -> Result<()> {
        validate_name(name)?;
        let value = value.unwrap_or_default();
        if value.contains('\0') {
            return Err(Error::Config(format!(
                "value for '{}' contains a NUL byte",
                name
            )));
        }

        tracing::debug!(name = %name, value = %value, "bound environment variable");
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    /// Binds `name` to the resolved value of `source`.
    pub fn bind_source(&mut self, name: &str, source: &EnvSource) -> Result<()> {
        self.bind(name, Some(source.resolve()))
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Returns the bound names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.vars.keys().map(String::as_str).collect()
    }

    /// Iterates over bound pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of bound variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Applies run-time overrides from the current process environment.
    ///
    /// A bound name set by the launching process keeps that value.
    pub fn with_runtime_overrides(&self) -> Self {
        self.overlay_with(|name| env::var(name).ok())
    }

    /// Applies run-time overrides from `lookup`.
    pub fn overlay_with<F>(&self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = self
            .vars
            .iter()
            .map(|(name, baked)| {
                let value = lookup(name).unwrap_or_else(|| baked.clone());
                (name.clone(), value)
            })
            .collect();
        Self { vars }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("environment variable name cannot be empty".to_string()));
    }
    if name.contains('=') || name.contains('\0') {
        return Err(Error::Config(format!(
            "invalid environment variable name '{}'",
            name
        )));
    }
    Ok(())
}
