//! Error types for reading and writing config and env files.

use std::path::PathBuf;

use flagtree_core::{FlagError, TreeError};
use thiserror::Error;

/// Errors that can occur while loading or saving sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading or writing the file failed.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The TOML document could not be parsed.
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// The config tree could not be written as TOML.
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// The env file is malformed.
    #[error("env file error: {0}")]
    Env(#[from] dotenvy::Error),

    /// `load_cfg` was given an empty path.
    #[error("path is empty while loading config")]
    EmptyPath,

    /// The config path has no extension to pick a format from.
    #[error(
        "config file {} has no extension, add a supported extension [YAML,YML,JSON,TOML]",
        .0.display()
    )]
    MissingExtension(PathBuf),

    /// The config path's extension names no supported format.
    #[error("unsupported extension {0}")]
    UnsupportedExtension(String),

    /// Saving was requested but no config file was ever loaded.
    #[error("no config file loaded, nowhere to save")]
    NoConfigPath,

    /// The decoded document does not fit a config tree.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Applying the loaded values to the command's flags failed.
    #[error(transparent)]
    Flag(#[from] FlagError),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for results with [`SourceError`].
pub type Result<T> = std::result::Result<T, SourceError>;
