//! Error types emitted by the quickhn CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use quickhn_data::{BuildSourceError, SourceDefinitionError};
use thiserror::Error;

/// Errors emitted by the quickhn CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A bounding box argument could not be parsed.
    #[error("invalid bbox {value:?}: {reason}")]
    InvalidBbox { value: String, reason: String },
    /// A numeric option is out of range.
    #[error("invalid --{field}: {reason}")]
    InvalidOption {
        field: &'static str,
        reason: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Reading the sources file failed.
    #[error("failed to read sources file {path:?}: {source}")]
    ReadSources {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The sources file is malformed or describes an invalid source.
    #[error("invalid sources file {path:?}: {source}")]
    InvalidSources {
        path: Utf8PathBuf,
        #[source]
        source: SourceDefinitionError,
    },
    /// Constructing the HTTP transport failed.
    #[error(transparent)]
    BuildTransport(#[from] BuildSourceError),
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Serialising a query report failed.
    #[error("failed to serialise query output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the query output failed.
    #[error("failed to write query output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
