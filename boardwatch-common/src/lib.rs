//! # Boardwatch Common Library
//!
//! Shared code for the boardwatch services including:
//! - Common error type
//! - Configuration loading
//! - Progress event types and broadcast bus
//! - Inference cache fingerprinting

pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;

pub use error::{Error, Result};
