//! Nested configuration tree addressed by dot-paths.
//!
//! The tree is decoded from a config file by a loader and shared by every
//! command in a tree. Flags bound with [`cfg`](crate::cfg) read from it by
//! dot-path (`database.password`) and write their defaults back into it when
//! the path is absent.

use serde_json::{Map, Value};
use thiserror::Error;

/// Dot-path lookup and update failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The path is empty or has an empty segment (`a..b`).
    #[error("invalid config path {0:?}")]
    InvalidPath(String),
    /// An intermediate key holds a scalar or list instead of a table.
    #[error("config key {key:?} in path {path:?} is not a table")]
    NotATable { path: String, key: String },
    /// The decoded document is not a key/value mapping at the top level.
    #[error("config document must be a mapping at the top level")]
    NotAMapping,
}

/// String-keyed configuration tree.
///
/// # Examples
///
/// ```
/// use flagtree_core::ConfigTree;
/// use serde_json::json;
///
/// let mut tree = ConfigTree::from_value(json!({"db": {"port": 5432}})).unwrap();
/// assert_eq!(tree.get_text("db.port").as_deref(), Some("5432"));
///
/// tree.set_text("db.user", "admin").unwrap();
/// assert_eq!(tree.get_text("db.user").as_deref(), Some("admin"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    root: Map<String, Value>,
}

impl ConfigTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing mapping.
    pub fn from_map(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// Wraps a decoded document, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, TreeError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            Value::Null => Ok(Self::default()),
            _ => Err(TreeError::NotAMapping),
        }
    }

    /// Top-level entries.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Converts the tree back into a document.
    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Looks up the raw node at `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = split_path(path).ok()?.into_iter();
        let first = segments.next()?;
        let mut node = self.root.get(first)?;
        for segment in segments {
            node = node.as_object()?.get(segment)?;
        }
        Some(node)
    }

    /// Looks up `path` and renders it as flag text.
    ///
    /// Strings come back verbatim, numbers and booleans in their canonical
    /// form, tables and lists as compact JSON. `null` counts as absent.
    pub fn get_text(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            composite => Some(composite.to_string()),
        }
    }

    /// Stores `text` at `path`, creating intermediate tables as needed.
    pub fn set_text(&mut self, path: &str, text: &str) -> Result<(), TreeError> {
        let segments = split_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(TreeError::InvalidPath(path.to_string()));
        };

        let mut table = &mut self.root;
        for segment in parents {
            let node = table
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            table = node.as_object_mut().ok_or_else(|| TreeError::NotATable {
                path: path.to_string(),
                key: segment.to_string(),
            })?;
        }
        table.insert(last.to_string(), Value::String(text.to_string()));
        Ok(())
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, TreeError> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}
