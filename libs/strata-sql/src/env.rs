// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Where configuration values come from.

use std::collections::HashMap;
use std::sync::Arc;

/// A source of `STRATA_*` settings. The typed readers return `Ok(None)` (or the default) for
/// absent keys and an error for values that do not parse.
pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// `true`/`false`, `1`/`0`, `yes`/`no` or `on`/`off`, in any case
    fn flag(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        let Some(value) = self.get(key) else {
            return Ok(default_value);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(EnvError::InvalidFlag {
                key: key.to_string(),
                value,
            }),
        }
    }

    fn number(&self, key: &str) -> Result<Option<u64>, EnvError> {
        self.get(key)
            .map(|value| {
                value.trim().parse().map_err(|_| EnvError::InvalidNumber {
                    key: key.to_string(),
                    value,
                })
            })
            .transpose()
    }

    /// Comma-separated entries, trimmed, without empty ones
    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("{key} must be a boolean (true/false, 1/0, yes/no, on/off), got `{value}`")]
    InvalidFlag { key: String, value: String },

    #[error("{key} must be a non-negative integer, got `{value}`")]
    InvalidNumber { key: String, value: String },

    #[error("Invalid value `{env_value}` for {env_key}: {message}")]
    InvalidEnum {
        env_key: &'static str,
        env_value: String,
        message: String,
    },
}

/// The process environment
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Explicit values, optionally layered over another environment.
#[derive(Clone, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
    fallback: Option<Arc<dyn Environment>>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys not set here are looked up in `fallback`
    pub fn over(fallback: Arc<dyn Environment>) -> Self {
        Self {
            values: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        match self.values.get(key) {
            Some(value) => Some(value.clone()),
            None => self.fallback.as_ref()?.get(key),
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnvironment {
    fn from(values: [(&str, &str); N]) -> Self {
        let mut env = Self::new();
        for (key, value) in values {
            env.set(key, value);
        }
        env
    }
}
