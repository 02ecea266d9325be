//! Error types for regstack.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("duplicate resource: {0}")]
    Duplicate(String),

    #[error("resource {resource} has no attribute '{attribute}'")]
    UnknownAttribute { resource: String, attribute: String },

    #[error("{step}: {source}")]
    Declaration {
        step: String,
        #[source]
        source: Box<Error>,
    },

    #[error("engine error: {0}")]
    Engine(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap this error with the declaration step that produced it.
    pub fn during(self, step: impl Into<String>) -> Self {
        Error::Declaration {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping declaration wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Declaration { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_prefix() {
        let err = Error::Duplicate("google_storage_bucket.sbom".to_string())
            .during("declare SBOM bucket");
        assert_eq!(
            err.to_string(),
            "declare SBOM bucket: duplicate resource: google_storage_bucket.sbom"
        );
        assert!(matches!(err.root(), Error::Duplicate(_)));
    }
}
