//! Error types for route and split reconstruction.
//!
//! Only configuration and source-level failures surface as errors. Malformed lines,
//! rows and cells inside a readable source are skipped at the finest granularity and
//! never reach this type (see the skip enums in [`crate::registry`],
//! [`crate::groups`] and [`crate::results`]).
//!
//! ## Error Categories
//!
//! - **No Data**: a required source (coordinates, results document) is missing
//! - **File Errors**: a source exists but cannot be read
//! - **Config Errors**: the YAML configuration is unreadable or inconsistent
//! - **Image Errors**: the base map's pixel size cannot be determined
//! - **Parse Errors**: a whole document could not be interpreted
//!
//! ```rust
//! use splitview::SplitviewError;
//!
//! let error = SplitviewError::no_data("coordinates source not found");
//! if error.is_fatal() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for splitview operations.
pub type Result<T, E = SplitviewError> = std::result::Result<T, E>;

/// Main error type for splitview operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SplitviewError {
    #[error("No data: {reason}")]
    NoData { reason: String, path: Option<PathBuf> },

    #[error("Source file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Map image error for {path}: {details}")]
    Image { path: PathBuf, details: String },

    #[error("Unknown text encoding '{label}'")]
    Encoding { label: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },
}

impl SplitviewError {
    /// Returns whether this error means nothing can be rendered for the event.
    pub fn is_fatal(&self) -> bool {
        match self {
            SplitviewError::NoData { .. } => true,
            SplitviewError::File { .. } => true,
            SplitviewError::Config { .. } => true,
            SplitviewError::Image { .. } => true,
            SplitviewError::Encoding { .. } => true,
            SplitviewError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SplitviewError::NoData { .. } => vec![
                "Check the source paths in the configuration file",
                "Paths are resolved relative to the configuration file",
                "Publish the results document before starting the viewer",
            ],
            SplitviewError::File { .. } => vec![
                "Check file permissions",
                "Verify the file is not being rewritten by the timing software",
            ],
            SplitviewError::Config { .. } => vec![
                "Validate the YAML syntax",
                "Sheet and image sizes must be positive",
                "The finish token must not be empty",
            ],
            SplitviewError::Image { .. } => vec![
                "Verify the map image is a PNG or JPEG file",
                "Set map.width_px and map.height_px explicitly instead",
            ],
            SplitviewError::Encoding { .. } => vec![
                "Use a WHATWG encoding label such as 'windows-1251' or 'utf-8'",
            ],
            SplitviewError::Parse { .. } => vec![
                "Check the document was exported as HTML",
                "Inspect debug logs for skipped rows and cells",
            ],
        }
    }

    /// Helper constructor for missing-source errors.
    pub fn no_data(reason: impl Into<String>) -> Self {
        SplitviewError::NoData { reason: reason.into(), path: None }
    }

    /// Helper constructor for missing-source errors with the offending path.
    pub fn missing_source(what: &str, path: PathBuf) -> Self {
        SplitviewError::NoData {
            reason: format!("{} not found at {}", what, path.display()),
            path: Some(path),
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        SplitviewError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        SplitviewError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        SplitviewError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Read a source file, mapping a missing file to [`SplitviewError::NoData`].
    pub(crate) fn read_source(what: &str, path: &std::path::Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SplitviewError::missing_source(what, path.to_path_buf())
            } else {
                SplitviewError::file_error(path.to_path_buf(), e)
            }
        })
    }
}

impl From<std::io::Error> for SplitviewError {
    fn from(err: std::io::Error) -> Self {
        SplitviewError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
