//! Flag parsing with layered configuration sources.
//!
//! This crate binds each command-line flag to any mix of sources:
//!
//! - command-line arguments, parsed by [`Command::parse`];
//! - environment variables, bound with [`env`];
//! - dot-paths in a shared config tree, bound with [`cfg`];
//! - alternate names, bound with [`alias`].
//!
//! A flag can also be restricted to a fixed set of values with [`choices`].
//!
//! Commands form a tree. [`Command::sub_cmd`] declares a child that shares
//! the parent's [`Context`] (config tree and env overlay), and
//! [`Command::parse`] dispatches to it when the first argument names it.
//!
//! Sources are applied in a fixed order: env, then cfg, then the enum check,
//! then aliases, all at definition time. Arguments are applied last, at
//! parse time, so an argument always wins. When a flag has both an env
//! variable and a config value, the config value wins.
//!
//! # Example
//!
//! ```
//! use flagtree_core::{alias, cfg, choices, env, Command, ConfigTree, ErrorHandling};
//! use serde_json::json;
//!
//! let mut app = Command::new("app", ErrorHandling::ContinueOnError);
//! app.install_config(ConfigTree::from_value(json!({"log": {"level": "warn"}})).unwrap(), None)
//!     .unwrap();
//! app.merge_env([("APP_LEVEL", "info")]).unwrap();
//!
//! let level = app
//!     .string(
//!         "level",
//!         "info",
//!         "log `level`",
//!         [env(["APP_LEVEL"]), cfg(["log.level"]), choices(["info", "warn"]), alias(["l"])],
//!     )
//!     .unwrap();
//! assert_eq!(level.get(), "warn");
//!
//! app.parse(["-l", "info", "input.txt"]).unwrap();
//! assert_eq!(level.get(), "info");
//! assert_eq!(app.args(), ["input.txt"]);
//! ```

mod command;
mod context;
pub mod duration;
mod error;
mod feature;
mod flag;
mod parser;
mod tree;
mod usage;
mod value;

pub use command::{Command, ErrorHandling, Handler, main_cmd, one_cmd};
pub use context::Context;
pub use error::{FlagError, Result, ValueError};
pub use feature::{
    ALIAS_PRIORITY, CFG_PRIORITY, ENUM_PRIORITY, ENV_PRIORITY, Feature, alias, cfg, choices, env,
};
pub use flag::Flag;
pub use parser::first_subcommand;
pub use tree::{ConfigTree, TreeError};
pub use usage::{UsageError, unquote_usage};
pub use value::{Scalar, TextValue, Value, ValueKind, Var};
