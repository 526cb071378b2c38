//! Kiln - model server image builder
//!
//! Generates a deterministic Dockerfile from `kiln.toml` and builds it
//! with docker buildx, Google Cloud Build or Depot.

pub mod builder;
pub mod cli;
pub mod config;
pub mod dockerfile;
pub mod error;
pub mod image;
pub mod ui;

pub use error::{KilnError, KilnResult};
