//! Error taxonomy for provisioning and supervising the database services.

use std::path::PathBuf;
use thiserror::Error;

use crate::component::Component;

/// Errors that can occur while installing, configuring or supervising services.
///
/// Every variant is fatal for the command that raised it. Conditions that are
/// recovered locally (a process that is already gone, an install directory that
/// was never created) are not represented here; callers log them and move on.
#[derive(Debug, Error)]
pub enum PgdbError {
    /// Neither `PGDB_HOME` nor a user home directory could be resolved.
    #[error("Cannot determine home directory; set PGDB_HOME")]
    NoHomeDirectory,

    /// Settings file or its directory could not be read or written.
    #[error("Settings I/O failed for {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file exists but does not describe a valid configuration.
    #[error("Settings file {path} is invalid: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Network retrieval of a distribution archive failed.
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    /// Archive is corrupt, of an unsupported format, or could not be unpacked.
    #[error("Failed to extract {archive}: {message}")]
    Extraction { archive: PathBuf, message: String },

    /// No top-level directory matching the component prefix appeared after extraction.
    #[error("No extracted directory starting with '{prefix}' found in {directory}")]
    Rename { prefix: String, directory: PathBuf },

    /// Template file could not be read.
    #[error("Template not found at {path}: {source}")]
    TemplateNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template references a placeholder with no value.
    #[error("Template {template} references '{key}' but no value was supplied")]
    MissingPlaceholderValue { template: String, key: String },

    /// Template text is malformed.
    #[error("Malformed template {template}: {message}")]
    TemplateRender { template: String, message: String },

    /// Rendered output could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Service executable is missing from the installation directory.
    #[error("{component} executable not found at {path}; run `pgdb install` first")]
    ExecutableNotFound { component: Component, path: PathBuf },

    /// Service process could not be launched.
    #[error("Failed to launch {component}: {source}")]
    ProcessLaunch {
        component: Component,
        #[source]
        source: std::io::Error,
    },

    /// Quiet install refused to wipe a directory that holds something other than a prior install.
    #[error(
        "{0} exists and does not look like a previous installation; \
         remove it or rerun without --quiet to confirm"
    )]
    UnrelatedDirectory(PathBuf),

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for provisioning operations.
pub type PgdbResult<T> = Result<T, PgdbError>;
