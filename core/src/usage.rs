//! Help text rendering.
//!
//! Rendering reads the command and its registry and never changes them.
//! Flags are listed in lexicographic order, one line each; an alias gets a
//! one-line pointer to its canonical flag.

use std::fmt::Write;

use thiserror::Error;

use crate::command::Command;
use crate::flag::{Entry, Flag};

/// Usage text rendered with problems.
///
/// Some flag's value could not render its zero value, so its default
/// annotation may be wrong. The full text is still available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("usage rendered with errors: {}", .problems.join("; "))]
pub struct UsageError {
    pub text: String,
    pub problems: Vec<String>,
}

/// Splits the type tag out of a flag's usage text.
///
/// A back-quoted word names the tag and is kept, unquoted, in the usage:
/// ``"a `path` to load"`` gives `("path", "a path to load")`. Without one,
/// the tag comes from the value's kind; switches have an empty tag.
///
/// ```
/// use flagtree_core::{unquote_usage, Command, ErrorHandling};
///
/// let mut cmd = Command::new("app", ErrorHandling::ContinueOnError);
/// cmd.string("config", "", "load settings from `file`", []).unwrap();
/// cmd.int("port", 0, "port to bind", []).unwrap();
///
/// let config = cmd.lookup("config").unwrap();
/// assert_eq!(unquote_usage(config), ("file".to_string(), "load settings from file".to_string()));
///
/// let port = cmd.lookup("port").unwrap();
/// assert_eq!(unquote_usage(port), ("int".to_string(), "port to bind".to_string()));
/// ```
pub fn unquote_usage(flag: &Flag) -> (String, String) {
    let usage = flag.usage();
    if let Some(start) = usage.find('`') {
        if let Some(len) = usage[start + 1..].find('`') {
            let name = &usage[start + 1..start + 1 + len];
            let unquoted = format!("{}{}{}", &usage[..start], name, &usage[start + len + 2..]);
            return (name.to_string(), unquoted);
        }
    }
    let tag = if flag.is_switch() {
        ""
    } else {
        flag.value().kind().type_tag()
    };
    (tag.to_string(), usage.to_string())
}

fn quoted<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .map(|item| format!("{item:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Command {
    /// Short help: description, invocation forms, subcommands, and one line
    /// per flag with its default.
    ///
    /// ```
    /// use flagtree_core::{Command, ErrorHandling};
    ///
    /// let mut cmd = Command::new("serve", ErrorHandling::ContinueOnError);
    /// cmd.set_usage("Runs the server.");
    /// cmd.int("port", 8080, "port to bind", []).unwrap();
    ///
    /// let text = cmd.default_usage().unwrap();
    /// assert!(text.starts_with("Runs the server.\n\nusage:\n  serve [<flags>]\n"));
    /// assert!(text.contains("  --port int  port to bind, (defaults to \"8080\")\n"));
    /// ```
    pub fn default_usage(&self) -> Result<String, UsageError> {
        self.render_usage(false)
    }

    /// Like [`default_usage`](Self::default_usage), and also lists each
    /// flag's permitted values, aliases, env variables, and config paths.
    pub fn default_usage_long(&self) -> Result<String, UsageError> {
        self.render_usage(true)
    }

    fn render_usage(&self, long: bool) -> Result<String, UsageError> {
        let mut out = String::new();
        let mut problems = Vec::new();
        let chain = self.full_name();
        let has_flags = !self.flags.is_empty();
        let has_subs = !self.subcommands.is_empty();

        if !self.usage.is_empty() {
            let _ = write!(out, "{}\n\n", self.usage);
        }
        if has_flags || has_subs {
            out.push_str("usage:\n");
        }
        if has_flags {
            let _ = writeln!(out, "  {chain} [<flags>]");
        }
        if has_flags && has_subs {
            out.push_str("  or\n");
        }
        if has_subs {
            let _ = writeln!(out, "  {chain} [<sub-command>]");
            out.push_str("\nAvailable sub commands:\n");
            for (name, sub) in &self.subcommands {
                let _ = writeln!(out, "  {name}  {}", sub.command.usage);
            }
        }

        if has_flags {
            out.push_str("\nFlags:\n");
            for (name, entry) in self.flags.entries() {
                let Some(flag) = self.flags.resolve(name) else {
                    continue;
                };
                let (tag, usage) = unquote_usage(flag);
                let head = if tag.is_empty() {
                    format!("  --{name}")
                } else {
                    format!("  --{name} {tag}")
                };
                if let Entry::Alias { target } = entry {
                    let _ = writeln!(out, "{head}  alias for \"--{target}\"");
                    continue;
                }

                let usage = if usage.is_empty() {
                    "usage not available".to_string()
                } else {
                    usage
                };
                let mut notes = match flag.value().zero_render() {
                    Ok(zero) if zero == flag.default_value() => "has no default value".to_string(),
                    Ok(_) => format!("defaults to {:?}", flag.default_value()),
                    Err(err) => {
                        problems.push(format!(
                            "cannot render zero value for flag {name}: {err}"
                        ));
                        format!("defaults to {:?}", flag.default_value())
                    }
                };
                if long {
                    if flag.choices().next().is_some() {
                        let _ = write!(notes, ", possible values [{}]", quoted(flag.choices()));
                    }
                    if flag.aliases().next().is_some() {
                        let _ = write!(notes, ", alias [{}]", quoted(flag.aliases()));
                    }
                    if flag.envs().next().is_some() {
                        let _ = write!(notes, ", binds to env/s [{}]", quoted(flag.envs()));
                    }
                    if flag.cfgs().next().is_some() {
                        let _ = write!(notes, ", binds to cfg/s [{}]", quoted(flag.cfgs()));
                    }
                }
                let _ = writeln!(out, "{head}  {usage}, ({notes})");
            }
        }

        if has_subs {
            let _ = writeln!(
                out,
                "\nUse \"{chain} [command] --help\" for more information about a command."
            );
        }

        if problems.is_empty() {
            Ok(out)
        } else {
            Err(UsageError {
                text: out,
                problems,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::error::ValueError;
    use crate::feature::{alias, cfg, choices, env};
    use crate::value::{Value, ValueKind};
    use crate::ErrorHandling;

    fn git() -> Command {
        let mut git = Command::new("git", ErrorHandling::ContinueOnError);
        git.set_usage("The stupid content tracker.");
        git.bool("verbose", false, "chatty output", [alias(["v"])]).unwrap();
        git.sub_cmd("commit", "Record changes", |_, _| Ok(()));
        git.sub_cmd("remote", "Manage remotes", |_, _| Ok(()));
        git
    }

    #[test]
    fn test_short_usage_layout() {
        let text = git().default_usage().unwrap();
        let expected = "\
The stupid content tracker.

usage:
  git [<flags>]
  or
  git [<sub-command>]

Available sub commands:
  commit  Record changes
  remote  Manage remotes

Flags:
  --v  alias for \"--verbose\"
  --verbose  chatty output, (has no default value)

Use \"git [command] --help\" for more information about a command.
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_help_footer_printed_once() {
        let mut cmd = git();
        cmd.string("a", "", "", []).unwrap();
        cmd.string("b", "", "", []).unwrap();
        let text = cmd.default_usage().unwrap();
        assert_eq!(text.matches("for more information").count(), 1);
        assert!(text.contains("  --a string  usage not available, (has no default value)\n"));
    }

    #[test]
    fn test_long_usage_lists_bindings() {
        let mut cmd = Command::new("app", ErrorHandling::ContinueOnError);
        cmd.string(
            "mode",
            "fast",
            "run `mode`",
            [choices(["fast", "slow"]), alias(["m"]), env(["APP_MODE_UNSET_FOR_TEST"]), cfg(["run.mode"])],
        )
        .unwrap();

        let short = cmd.default_usage().unwrap();
        assert!(short.contains("  --mode mode  run mode, (defaults to \"fast\")\n"));
        assert!(short.contains("  --m mode  alias for \"--mode\"\n"));

        let long = cmd.default_usage_long().unwrap();
        assert!(long.contains(
            "  --mode mode  run mode, (defaults to \"fast\", possible values [\"fast\", \"slow\"], \
             alias [\"m\"], binds to env/s [\"APP_MODE_UNSET_FOR_TEST\"], binds to cfg/s [\"run.mode\"])\n"
        ));
    }

    #[test]
    fn test_subcommand_chain_in_usage() {
        let mut git = git();
        let commit = git.subcommand_mut("commit").unwrap();
        commit.string("message", "", "commit message", []).unwrap();
        let text = commit.default_usage().unwrap();
        assert!(text.starts_with("Record changes\n\nusage:\n  git commit [<flags>]\n"));
        assert!(!text.contains("[command] --help"));
    }

    struct Broken;

    impl Value for Broken {
        fn set(&self, _: &str) -> Result<(), ValueError> {
            Ok(())
        }

        fn render(&self) -> String {
            "x".into()
        }

        fn kind(&self) -> ValueKind {
            ValueKind::Custom
        }

        fn zero_render(&self) -> Result<String, ValueError> {
            Err(ValueError::invalid("no zero value"))
        }
    }

    #[test]
    fn test_zero_render_failure_is_reported() {
        let mut cmd = Command::new("app", ErrorHandling::ContinueOnError);
        cmd.var(Rc::new(Broken), "broken", "", []).unwrap();
        cmd.int("fine", 1, "", []).unwrap();
        let err = cmd.default_usage().unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("flag broken"));
        assert!(err.text.contains("  --broken value  usage not available, (defaults to \"x\")\n"));
        assert!(err.text.contains("  --fine int  usage not available, (defaults to \"1\")\n"));
    }

    #[test]
    fn test_unquote_single_backquote_falls_back() {
        let mut cmd = Command::new("app", ErrorHandling::ContinueOnError);
        cmd.float64("ratio", 0.5, "odd ` quote", []).unwrap();
        let (tag, usage) = unquote_usage(cmd.lookup("ratio").unwrap());
        assert_eq!(tag, "float");
        assert_eq!(usage, "odd ` quote");
    }
}
