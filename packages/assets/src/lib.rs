#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Point-asset dataset loading, deduplication, and snapshot caching.
//!
//! Loads the tabular asset layers (emitting power plants, clean plants,
//! fossil-fuel operations) and the JSON reference layers (country profiles,
//! fuel weights, data centers). Multi-year raw rows are reduced to one row
//! per asset for the latest reporting year using declared per-field
//! reducers, and per-asset/per-country emission trends are fitted during
//! the same pass.
//!
//! Each tabular layer persists a `MessagePack` snapshot keyed by the source
//! file's modification time; a reload whose source is unchanged
//! deserializes the snapshot instead of re-parsing the CSV. Rows missing
//! coordinates or emissions are skipped and counted, never defaulted.

pub mod cache;
pub mod classify;
pub mod loader;
pub mod reference;

use std::path::PathBuf;

use thiserror::Error;

/// Errors from asset and reference-layer loading.
#[derive(Debug, Error)]
pub enum AssetError {
    /// A required source file is missing or unreadable.
    #[error("Missing required source: {path}")]
    MissingSource {
        /// Path that could not be read.
        path: PathBuf,
    },

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed at the reader level.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
