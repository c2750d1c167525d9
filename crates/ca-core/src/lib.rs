//! # ca-core
//!
//! Core types, traits, and utilities for content attachments.
//!
//! This crate provides the foundational building blocks used across the other crates:
//! - Common error types and result aliases
//! - Core traits (Identifiable, UserContext, Clock)
//! - Configuration loading
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod telemetry;
pub mod traits;

pub use error::*;
pub use traits::*;
