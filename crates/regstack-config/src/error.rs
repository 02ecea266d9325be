//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stack file is not valid KDL: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("missing required setting {0}; set it in the stack file or the environment")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("unknown stack file node '{0}'")]
    UnknownNode(String),

    #[error("stack file node '{0}' is defined more than once")]
    Duplicate(String),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
