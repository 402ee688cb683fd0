//! Command-line interface for apbridge.
//!
//! This crate provides the `apbridge` binary: running the bridge against a
//! chat sink and answering one-off queries about the current snapshot.

#![deny(missing_docs, unsafe_code)]

/// CLI command definitions and parsing.
pub mod commands;

/// CLI application entry point and configuration.
pub mod app;

/// Error types for CLI operations.
pub mod error;
