//! Error types for configuration, data loading and the command line.
//!
//! Configuration errors are raised before any data is read, data errors before
//! the search starts. The search itself never fails: an exhausted search with
//! no complete plan is reported as a result, not as an error.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid planner parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A speed, range or other real-valued parameter is zero, negative or not finite.
    #[error("{field} must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    /// The service time is negative or not finite.
    #[error("service_time must be a non-negative finite number, got {0}")]
    InvalidServiceTime(f64),

    /// A count parameter (capacity, number of drones) is zero.
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    /// `max_sites` is outside the supported range.
    #[error("max_sites must be between {min} and {max}, got {value}")]
    MaxSitesOutOfRange { value: usize, min: usize, max: usize },

    /// The search time limit is negative, not finite or too large.
    #[error("time limit must be a non-negative number of seconds, got {0}")]
    InvalidTimeLimit(f64),

    /// The configuration file could not be read.
    #[error("cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or holds unknown/non-numeric fields.
    #[error("invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Problems with the distance table.
#[derive(Debug, Error)]
pub enum DataError {
    /// The table file could not be opened.
    #[error("cannot open distance table {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table is not well-formed CSV.
    #[error("malformed distance table: {0}")]
    Csv(#[from] csv::Error),

    /// After filtering, fewer than two labels (depot plus one site) remain.
    #[error("need at least 2 usable sites (depot + 1), found {found}")]
    TooFewSites { found: usize },

    /// More sites than the delivered-set bitmask can hold.
    #[error("at most {max} sites are supported, got {found}")]
    TooManySites { found: usize, max: usize },

    /// The matrix handed to the instance is not square.
    #[error("distance matrix must be square: {rows} rows but row {row} has {len} columns")]
    NotSquare { rows: usize, row: usize, len: usize },

    /// Label count and matrix size disagree.
    #[error("{labels} labels for a {size}x{size} matrix")]
    LabelMismatch { labels: usize, size: usize },

    /// A cell between two retained sites is empty or non-numeric.
    #[error("missing distance between {from} and {to}")]
    MissingDistance { from: String, to: String },

    /// A distance is negative or not finite.
    #[error("invalid distance {value} between {from} and {to}")]
    InvalidDistance { from: String, to: String, value: f64 },

    /// The side length for a generated instance is not positive.
    #[error("instance extent must be a positive finite number, got {0}")]
    InvalidExtent(f64),
}

/// Any error the planner binary can surface.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to serialise report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}
