//! Config file formats.
//!
//! The format is chosen from the file extension, case-insensitively:
//! `.json`, `.yml` / `.yaml`, or `.toml`. Every format decodes into the same
//! [`ConfigTree`], so flags bind to dot-paths the same way regardless of the
//! file they came from.

use std::path::Path;

use flagtree_core::ConfigTree;

use crate::error::{Result, SourceError};

/// A supported config file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Picks the format from `path`'s extension.
    ///
    /// ```
    /// use std::path::Path;
    /// use flagtree_sources::Format;
    ///
    /// assert_eq!(Format::from_path(Path::new("app.YML")).unwrap(), Format::Yaml);
    /// assert!(Format::from_path(Path::new("app")).is_err());
    /// assert!(Format::from_path(Path::new("app.ini")).is_err());
    /// ```
    pub fn from_path(path: &Path) -> Result<Self> {
        let Some(ext) = path.extension() else {
            return Err(SourceError::MissingExtension(path.to_path_buf()));
        };
        let ext = ext.to_string_lossy().to_ascii_uppercase();
        match ext.as_str() {
            "JSON" => Ok(Self::Json),
            "YML" | "YAML" => Ok(Self::Yaml),
            "TOML" => Ok(Self::Toml),
            _ => Err(SourceError::UnsupportedExtension(format!(".{ext}"))),
        }
    }

    /// Decodes file content into a config tree. The top level must be a
    /// mapping; an empty document gives an empty tree.
    pub fn decode(self, content: &str) -> Result<ConfigTree> {
        if content.trim().is_empty() {
            return Ok(ConfigTree::new());
        }
        let value: serde_json::Value = match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Yaml => serde_yaml::from_str(content)?,
            Self::Toml => toml::from_str(content)?,
        };
        Ok(ConfigTree::from_value(value)?)
    }

    /// Encodes a config tree in this format.
    pub fn encode(self, tree: &ConfigTree) -> Result<String> {
        let value = tree.to_value();
        let text = match self {
            Self::Json => {
                let mut text = serde_json::to_string_pretty(&value)?;
                text.push('\n');
                text
            }
            Self::Yaml => serde_yaml::to_string(&value)?,
            Self::Toml => toml::to_string_pretty(&value)?,
        };
        Ok(text)
    }
}
