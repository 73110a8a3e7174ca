//! Model registry: static mapping from model name to backend endpoint and
//! request family.
//!
//! Loaded once at startup from the `MODEL_CONFIG` JSON blob and never
//! mutated afterwards. Unknown request families and non-websocket
//! endpoints are rejected here, so nothing downstream has to handle them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable holding the registry JSON.
pub const MODEL_CONFIG_ENV: &str = "MODEL_CONFIG";

/// Wire-format family of a model backend.
///
/// Each family has exactly one request codec; the mapping is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFamily {
    /// Gradio-hosted diffusion backends (prompt + sampler settings).
    #[default]
    Gradio,
}

impl RequestFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestFamily::Gradio => "gradio",
        }
    }
}

/// A registered model backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    /// Registry key, as referenced by task parameters.
    pub name: String,
    /// Websocket URL of the backend (`ws://` or `wss://`).
    pub endpoint: String,
    pub family: RequestFamily,
}

/// One registry entry as written in configuration.
#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(alias = "api")]
    endpoint: String,
    #[serde(default)]
    family: RequestFamily,
}

/// Immutable name -> model lookup.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Model>,
}

impl ModelRegistry {
    /// Parse a registry blob of the shape
    /// `{"<name>": {"endpoint": "ws://...", "family": "gradio"}}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        if json.trim().is_empty() {
            return Err(ConfigError::Missing(MODEL_CONFIG_ENV));
        }

        let entries: BTreeMap<String, ModelEntry> =
            serde_json::from_str(json).map_err(|e| ConfigError::Registry(e.to_string()))?;

        let models = entries
            .into_iter()
            .map(|(name, entry)| {
                validate_endpoint(&name, &entry.endpoint)?;
                let model = Model {
                    name: name.clone(),
                    endpoint: entry.endpoint,
                    family: entry.family,
                };
                Ok((name, model))
            })
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Ok(Self { models })
    }

    /// Read `MODEL_CONFIG` from the environment and parse it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var(MODEL_CONFIG_ENV).unwrap_or_default();
        Self::from_json(&raw)
    }

    /// Build a registry from already-constructed models.
    pub fn from_models(models: impl IntoIterator<Item = Model>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.name.clone(), m)).collect(),
        }
    }

    /// Look up a model by name.
    pub fn resolve(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn validate_endpoint(name: &str, endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::Registry(format!(
            "model {name}: endpoint {endpoint:?} is not a ws:// or wss:// URL"
        )))
    }
}
