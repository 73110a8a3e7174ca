use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },
}

/// Errors raised while reading static configuration.
///
/// A registry error is fatal at startup; a batch-limit error is fatal to
/// the dispatch cycle that read it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    #[error("{0} is empty")]
    Missing(&'static str),

    /// A setting is present but does not hold an acceptable value.
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// The model registry blob could not be loaded.
    #[error("model registry is invalid: {0}")]
    Registry(String),
}
