//! Per-run state shared by every command in a tree.
//!
//! The root command creates one [`Context`]; each subcommand holds a clone of
//! the same `Rc`, so a config loaded anywhere in the tree is visible
//! everywhere. Variables loaded from env files live in an overlay here
//! instead of being written into the process environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::error::{FlagError, Result};
use crate::feature::CfgBinding;
use crate::tree::ConfigTree;

/// Shared configuration tree, config path, and env overlay.
#[derive(Debug, Default)]
pub struct Context {
    config: ConfigTree,
    config_path: Option<PathBuf>,
    env: BTreeMap<String, String>,
    /// Every cfg binding declared in the tree, in declaration order.
    cfg_bindings: Vec<Rc<CfgBinding>>,
}

impl Context {
    /// The loaded configuration, including written-back defaults.
    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigTree {
        &mut self.config
    }

    /// Path of the loaded config file, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub(crate) fn install_config(&mut self, tree: ConfigTree, path: Option<PathBuf>) {
        debug!(path = ?path, entries = tree.as_map().len(), "Installing config tree");
        self.config = tree;
        self.config_path = path;
    }

    pub(crate) fn register_cfg(&mut self, binding: Rc<CfgBinding>) {
        self.cfg_bindings.push(binding);
    }

    pub(crate) fn cfg_bindings(&self) -> Vec<Rc<CfgBinding>> {
        self.cfg_bindings.clone()
    }

    /// Looks up a variable in the overlay, then in the process environment.
    pub fn env_var(&self, name: &str) -> Option<String> {
        if let Some(value) = self.env.get(name) {
            return Some(value.clone());
        }
        std::env::var(name).ok()
    }

    /// Variables loaded into the overlay.
    pub fn env_overlay(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Merges variables into the overlay.
    ///
    /// Every valid pair is applied. Keys that could never name an
    /// environment variable (empty, or containing `=` or NUL) are skipped and
    /// reported together in one error.
    pub fn merge_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut rejected = Vec::new();
        for (key, value) in vars {
            let key = key.into();
            if key.is_empty() || key.contains(['=', '\0']) {
                rejected.push(format!("invalid env key {key:?}"));
                continue;
            }
            self.env.insert(key, value.into());
        }
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(FlagError::Config(format!(
                "partially loaded envs because: {}",
                rejected.join(", ")
            )))
        }
    }
}
