//! Shared request list CLI.
//!
//! A newest-first list of short text requests stored as one file in a
//! GitHub gist, plus a per-client local queue for requests that are not
//! (or could not be) published.
//!
//! # Architecture
//!
//! - [`model`] - Records and the line codec
//! - [`validate`] - Request text rules
//! - [`remote`] - Remote store trait, gist and in-memory stores, fingerprints
//! - [`queue`] - Local queue persisted as JSON
//! - [`view`] - Merged remote + local view and index mapping
//! - [`ops`] - Add, delete and promote with guarded writes
//! - [`config`] - Configuration management
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod ops;
pub mod queue;
pub mod remote;
pub mod validate;
pub mod view;

pub use error::{Error, Result};
