//! Core resource model and engine traits for regstack.
//!
//! This crate contains:
//! - Deferred output values resolved by an engine
//! - Typed resource declarations for the Google Cloud resources we manage
//! - The `Engine` trait and an in-memory engine
//! - Plan summary types shared by engine backends

pub mod engine;
pub mod error;
pub mod memory;
pub mod output;
pub mod plan;
pub mod resource;

pub use engine::{Engine, Export, ProjectInfo};
pub use error::{Error, Result};
pub use memory::MemoryEngine;
pub use output::{Output, Reference};
pub use resource::{Resource, ResourceArgs, ResourceHandle, ResourceOptions, ResourceType};
