//! Binding features attached when a flag is defined.
//!
//! Features are applied once, right after the flag is registered, in
//! ascending priority order regardless of the order they were passed in:
//!
//! | Feature | Priority |
//! |---|---|
//! | [`env`] | 7 |
//! | [`cfg`] | 8 |
//! | [`choices`] | 10 |
//! | [`alias`] | 11 |
//!
//! Env runs before Cfg, so when both an environment variable and a config
//! value are present **the config value wins**. Arguments given to
//! [`Command::parse`] are applied later still and override both.
//!
//! The permitted values of [`choices`] are installed before env and cfg are
//! read. A source value outside the set is reported and the flag keeps
//! whatever it held before.
//!
//! ```
//! use flagtree_core::{alias, choices, Command, ErrorHandling};
//!
//! let mut cmd = Command::new("app", ErrorHandling::ContinueOnError);
//! let format = cmd
//!     .string("format", "json", "output format", [alias(["f"]), choices(["json", "yaml"])])
//!     .unwrap();
//! cmd.parse(["-f", "yaml"]).unwrap();
//! assert_eq!(format.get(), "yaml");
//! assert!(cmd.parse(["-f", "toml"]).is_err());
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::command::Command;
use crate::context::Context;
use crate::error::{FlagError, Result};
use crate::flag::ActualSet;
use crate::value::Value;

pub const ENV_PRIORITY: u8 = 7;
pub const CFG_PRIORITY: u8 = 8;
pub const ENUM_PRIORITY: u8 = 10;
pub const ALIAS_PRIORITY: u8 = 11;

/// A binding directive consumed by a flag definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feature {
    /// Environment variables to read the value from.
    Env(Vec<String>),
    /// Config dot-paths to read the value from.
    Cfg(Vec<String>),
    /// Permitted values.
    Enum(Vec<String>),
    /// Extra names for the flag.
    Alias(Vec<String>),
}

impl Feature {
    pub fn priority(&self) -> u8 {
        match self {
            Self::Env(_) => ENV_PRIORITY,
            Self::Cfg(_) => CFG_PRIORITY,
            Self::Enum(_) => ENUM_PRIORITY,
            Self::Alias(_) => ALIAS_PRIORITY,
        }
    }
}

fn collect<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Binds environment variables to the flag being defined.
pub fn env<I, S>(names: I) -> Feature
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Feature::Env(collect(names))
}

/// Binds config dot-paths to the flag being defined.
pub fn cfg<I, S>(paths: I) -> Feature
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Feature::Cfg(collect(paths))
}

/// Restricts the flag being defined to the given values.
pub fn choices<I, S>(values: I) -> Feature
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Feature::Enum(collect(values))
}

/// Registers extra names for the flag being defined, e.g. `b` for `branch`.
pub fn alias<I, S>(names: I) -> Feature
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Feature::Alias(collect(names))
}

/// A cfg binding recorded in the run context, so a config loaded from any
/// command in the tree can re-apply it.
pub(crate) struct CfgBinding {
    command: String,
    flag: String,
    paths: Vec<String>,
    value: Rc<dyn Value>,
    choices: BTreeSet<String>,
    actual: ActualSet,
}

impl CfgBinding {
    pub(crate) fn flag(&self) -> &str {
        &self.flag
    }

    /// Enum check, then type parse. Marks the flag only when both pass.
    fn set(&self, text: &str) -> Result<()> {
        if !self.choices.is_empty() && !self.choices.contains(text) {
            return Err(FlagError::EnumViolation {
                flag: self.flag.clone(),
                allowed: self.choices.iter().cloned().collect(),
            });
        }
        self.value.set(text)?;
        self.actual.borrow_mut().insert(self.flag.clone());
        Ok(())
    }

    /// Reads every path from the shared tree. A missing path gets the
    /// flag's current value written back.
    pub(crate) fn apply(&self, context: &RefCell<Context>, failures: &mut Vec<FlagError>) {
        for path in &self.paths {
            let found = context.borrow().config().get_text(path);
            match found.filter(|v| !v.is_empty()) {
                Some(value) => match self.set(&value) {
                    Ok(()) => debug!(command = %self.command, flag = %self.flag, path = %path, "Bound flag from config"),
                    Err(err) => failures.push(FlagError::Bound {
                        origin: format!("config {path}"),
                        value,
                        source: Box::new(err),
                    }),
                },
                None => {
                    let current = self.value.render();
                    let written = context.borrow_mut().config_mut().set_text(path, &current);
                    match written {
                        Ok(()) => debug!(flag = %self.flag, path = %path, value = %current, "Wrote flag default into config"),
                        Err(err) => debug!(flag = %self.flag, path = %path, error = %err, "Skipped config write-back"),
                    }
                }
            }
        }
    }
}

impl fmt::Debug for CfgBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CfgBinding")
            .field("command", &self.command)
            .field("flag", &self.flag)
            .field("paths", &self.paths)
            .finish()
    }
}

impl Command {
    /// Applies features in priority order.
    ///
    /// Permitted values are installed before any source is read, so an env
    /// or cfg value outside the set is reported and never stored. Source
    /// failures are collected and the remaining features still apply;
    /// definition errors stop at once.
    pub(crate) fn apply_features(&mut self, flag: &str, features: Vec<Feature>) -> Result<()> {
        let mut features = features;
        features.sort_by_key(Feature::priority);
        for feature in &features {
            if let Feature::Enum(values) = feature {
                self.bind_enum(flag, values)?;
            }
        }

        let mut failures = Vec::new();
        for feature in features {
            match feature {
                Feature::Env(names) => self.bind_env(flag, &names, &mut failures),
                Feature::Cfg(paths) => self.bind_cfg(flag, &paths, &mut failures),
                Feature::Enum(_) => {}
                Feature::Alias(names) => self.bind_alias(flag, &names)?,
            }
        }
        binding_result(flag, failures)
    }

    fn bind_env(&mut self, flag: &str, names: &[String], failures: &mut Vec<FlagError>) {
        for name in names {
            if let Some(f) = self.flags.canonical_mut(flag) {
                f.envs.insert(name.clone());
            }
            let value = self.context.borrow().env_var(name);
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            match self.flags.set(flag, &value) {
                Ok(()) => debug!(flag = %flag, env = %name, "Bound flag from environment"),
                Err(err) => failures.push(FlagError::Bound {
                    origin: format!("env {name}"),
                    value,
                    source: Box::new(err),
                }),
            }
        }
    }

    fn bind_cfg(&mut self, flag: &str, paths: &[String], failures: &mut Vec<FlagError>) {
        let Some(f) = self.flags.canonical_mut(flag) else {
            return;
        };
        f.cfgs.extend(paths.iter().cloned());
        let value = f.value_rc();
        let choices = f.choices.clone();
        let binding = Rc::new(CfgBinding {
            command: self.full_name(),
            flag: flag.to_string(),
            paths: paths.to_vec(),
            value,
            choices,
            actual: self.flags.actual_handle(),
        });
        binding.apply(&self.context, failures);
        self.context.borrow_mut().register_cfg(binding);
    }

    fn bind_enum(&mut self, flag: &str, values: &[String]) -> Result<()> {
        let Some(f) = self.flags.canonical_mut(flag) else {
            return Ok(());
        };
        if !values.is_empty() && !values.iter().any(|v| v == f.default_value()) {
            return Err(FlagError::EnumDefault {
                flag: flag.to_string(),
                default: f.default_value().to_string(),
                allowed: values.to_vec(),
            });
        }
        f.choices.extend(values.iter().cloned());
        Ok(())
    }

    fn bind_alias(&mut self, flag: &str, names: &[String]) -> Result<()> {
        for name in names {
            if name == flag {
                return Err(FlagError::AliasSelf(name.clone()));
            }
            if let Err(err) = self.check_new_name(name) {
                return Err(FlagError::AliasCollision {
                    alias: name.clone(),
                    flag: flag.to_string(),
                    source: Box::new(err),
                });
            }
            self.flags.insert_alias(name, flag);
            if let Some(f) = self.flags.canonical_mut(flag) {
                f.aliases.insert(name.clone());
            }
        }
        Ok(())
    }
}

pub(crate) fn binding_result(flag: &str, failures: Vec<FlagError>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(FlagError::Binding {
            flag: flag.to_string(),
            failures,
        })
    }
}
