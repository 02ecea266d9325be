//! Stack configuration for regstack.
//!
//! This crate handles:
//! - Built-in defaults and required settings
//! - The optional KDL stack file (regstack.kdl)
//! - Environment variable overrides
//! - `${env.NAME}` interpolation inside the stack file

pub mod env;
pub mod error;
pub mod file;
pub mod interpolate;
pub mod stack;

pub use error::{ConfigError, ConfigResult};
pub use stack::{ConfigLayer, StackConfig};
