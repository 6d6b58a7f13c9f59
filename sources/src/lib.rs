//! Config and env file sources for flagtree commands.
//!
//! - [`Format`] decodes and encodes config files (JSON, YAML, TOML) as a
//!   [`ConfigTree`](flagtree_core::ConfigTree).
//! - [`parse_env`] decodes dotenv files without touching the process
//!   environment.
//! - [`LoadSources`] wires both into a [`Command`](flagtree_core::Command):
//!   `load_cfg`, `load_env`, `save_cfg`.

mod env;
mod error;
mod format;
mod load;

pub use env::{EnvMap, parse_env};
pub use error::{Result, SourceError};
pub use format::Format;
pub use load::LoadSources;
