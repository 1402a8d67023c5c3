//! # AyurDrishti Common Library
//!
//! Shared code for the AyurDrishti services:
//! - Error type used across crates
//! - Configuration resolution (CLI, environment, TOML, defaults)
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
