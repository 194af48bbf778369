//! # DFD Common Library
//!
//! Shared code for the DFD video authenticity client crates:
//! - Error types
//! - Configuration loading (CLI → ENV → TOML → compiled defaults)
//! - Submission event types and the `EventBus`
//! - Human-readable size formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_size;

pub use error::{Error, Result};
