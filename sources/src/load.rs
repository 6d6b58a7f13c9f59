//! File-backed sources for a [`Command`].
//!
//! [`LoadSources`] adds `load_cfg`, `load_env`, and `save_cfg` to every
//! command. Both loaders write into the run context shared by the whole
//! tree, so calling them on a subcommand affects the root as well.
//!
//! # Examples
//!
//! ```no_run
//! use flagtree_core::{cfg, env, Command, ErrorHandling};
//! use flagtree_sources::LoadSources;
//!
//! let mut app = Command::new("app", ErrorHandling::ContinueOnError);
//! app.load_env(".env").unwrap();
//! app.load_cfg("app.yaml").unwrap();
//!
//! let user = app.string("user", "guest", "login name", [env(["APP_USER"]), cfg(["auth.user"])]).unwrap();
//! app.parse(std::env::args().skip(1)).unwrap();
//!
//! // Persist the effective config, including defaults written back for
//! // missing paths.
//! app.save_cfg().unwrap();
//! # let _ = user;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use flagtree_core::Command;
use tracing::debug;

use crate::env::parse_env;
use crate::error::{Result, SourceError};
use crate::format::Format;

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| SourceError::io(path, err))
}

/// Config and env file loading for commands.
pub trait LoadSources {
    /// Loads a config file into the shared context and re-applies every cfg
    /// binding already declared in the tree, ancestors included.
    ///
    /// The format comes from the extension. Flags defined afterwards bind
    /// against the loaded tree.
    fn load_cfg(&mut self, path: impl AsRef<Path>) -> Result<()>;

    /// Loads an env file into the shared env overlay.
    ///
    /// Only flags defined afterwards see the loaded variables.
    fn load_env(&mut self, path: impl AsRef<Path>) -> Result<()>;

    /// Writes the shared config tree back to the file it was loaded from.
    fn save_cfg(&self) -> Result<PathBuf>;

    /// Writes the shared config tree to `path`, in the format implied by its
    /// extension.
    fn save_cfg_to(&self, path: impl AsRef<Path>) -> Result<()>;
}

impl LoadSources for Command {
    fn load_cfg(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(SourceError::EmptyPath);
        }
        let content = read(path)?;
        let format = Format::from_path(path)?;
        let tree = format.decode(&content)?;
        debug!(
            command = %self.name(),
            path = %path.display(),
            format = ?format,
            keys = tree.as_map().len(),
            "Loaded config file"
        );
        self.install_config(tree, Some(path.to_path_buf()))?;
        Ok(())
    }

    fn load_env(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = read(path)?;
        let vars = parse_env(&content)?;
        debug!(
            command = %self.name(),
            path = %path.display(),
            vars = vars.len(),
            "Loaded env file"
        );
        self.merge_env(vars)?;
        Ok(())
    }

    fn save_cfg(&self) -> Result<PathBuf> {
        let path = self
            .context()
            .config_path()
            .map(Path::to_path_buf)
            .ok_or(SourceError::NoConfigPath)?;
        self.save_cfg_to(&path)?;
        Ok(path)
    }

    fn save_cfg_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let text = format.encode(self.context().config())?;
        fs::write(path, text).map_err(|err| SourceError::io(path, err))?;
        debug!(path = %path.display(), format = ?format, "Saved config file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagtree_core::{ErrorHandling, cfg, env};

    fn app() -> Command {
        Command::new("app", ErrorHandling::ContinueOnError)
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = app().load_cfg("").unwrap_err();
        assert_eq!(err.to_string(), "path is empty while loading config");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = app().load_cfg(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn test_load_cfg_then_define() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "[db]\npass = \"abc\"\n").unwrap();

        let mut cmd = app();
        cmd.load_cfg(&path).unwrap();
        let pass = cmd.string("pass", "", "", [cfg(["db.pass"])]).unwrap();
        assert_eq!(pass.get(), "abc");
        assert_eq!(cmd.context().config_path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_env_feeds_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "FLAGTREE_TEST_BRANCH=stable\n").unwrap();

        let mut cmd = app();
        cmd.load_env(&path).unwrap();
        let branch = cmd
            .string("branch", "", "", [env(["FLAGTREE_TEST_BRANCH"])])
            .unwrap();
        assert_eq!(branch.get(), "stable");
        assert!(std::env::var("FLAGTREE_TEST_BRANCH").is_err());
    }

    #[test]
    fn test_save_without_load() {
        let err = app().save_cfg().unwrap_err();
        assert!(matches!(err, SourceError::NoConfigPath));
    }
}
