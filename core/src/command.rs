//! Command tree, flag definition, and parse-time dispatch.
//!
//! A [`Command`] owns a flag registry, the positional arguments left over
//! after parsing, and a table of subcommands. [`Command::parse`] first tries
//! to dispatch to a subcommand; only when the arguments do not start with a
//! subcommand-shaped token does it bind flags on the command itself.
//!
//! # Examples
//!
//! ```
//! use flagtree_core::{alias, Command, ErrorHandling, Var};
//!
//! let mut git = Command::new("git", ErrorHandling::ContinueOnError);
//! let branch = Var::new(String::new());
//! let seen = branch.clone();
//! git.sub_cmd("commit", "record changes", move |cmd, args| {
//!     cmd.string_var(&seen, "branch", "", "branch to commit on", [alias(["b"])])?;
//!     cmd.parse(args)
//! });
//!
//! git.parse(["commit", "-b", "stable"]).unwrap();
//! assert_eq!(branch.get(), "stable");
//! ```

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::{FlagError, Result, ValueError};
use crate::feature::{Feature, binding_result};
use crate::flag::{Flag, FlagSet};
use crate::parser::{self, first_subcommand};
use crate::tree::ConfigTree;
use crate::value::{FuncValue, Scalar, ScalarValue, TextAdaptor, TextValue, Value, Var};

/// What [`Command::parse`] does when parsing fails.
///
/// The policy is fixed when the command is created and inherited by every
/// subcommand declared on it. Definition errors never go through it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorHandling {
    /// Return the error to the caller.
    #[default]
    ContinueOnError,
    /// Log the error and exit the process: status 0 for
    /// [`FlagError::HelpRequested`], 2 for everything else.
    ExitOnError,
    /// Panic with the error message.
    PanicOnError,
}

/// Callback run when a subcommand is dispatched. It receives the subcommand
/// and the arguments that followed its name.
pub type Handler = Box<dyn FnMut(&mut Command, Vec<String>) -> Result<()>>;

pub(crate) struct SubCommand {
    pub(crate) command: Command,
    handler: Handler,
}

/// A node in the command tree.
pub struct Command {
    pub(crate) name: String,
    pub(crate) usage: String,
    /// Names of all ancestors, root first.
    pub(crate) lineage: Vec<String>,
    pub(crate) flags: FlagSet,
    args: Vec<String>,
    parsed: bool,
    error_handling: ErrorHandling,
    pub(crate) context: Rc<RefCell<Context>>,
    pub(crate) subcommands: BTreeMap<String, SubCommand>,
}

/// Runs `f` with a fresh root command and the process arguments, minus the
/// program name.
///
/// This is the only place the real argument vector is read.
///
/// ```no_run
/// use flagtree_core::{main_cmd, ErrorHandling};
///
/// main_cmd("app", "does things", ErrorHandling::ExitOnError, |cmd, args| {
///     let verbose = cmd.bool("verbose", false, "chatty output", []).unwrap();
///     cmd.parse(args).unwrap();
///     if verbose.get() {
///         println!("{:?}", cmd.args());
///     }
/// });
/// ```
pub fn main_cmd<F, R>(name: &str, usage: &str, error_handling: ErrorHandling, f: F) -> R
where
    F: FnOnce(&mut Command, Vec<String>) -> R,
{
    let mut cmd = Command::new(name, error_handling);
    cmd.set_usage(usage);
    let args = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    f(&mut cmd, args)
}

/// Creates a standalone root command.
pub fn one_cmd(name: &str, error_handling: ErrorHandling) -> Command {
    Command::new(name, error_handling)
}

/// Defines a `name` / `name_var` pair for a built-in scalar type.
macro_rules! scalar_definers {
    ($($(#[$doc:meta])* $name:ident, $name_var:ident => $ty:ty;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(
                &mut self,
                name: &str,
                default: $ty,
                usage: &str,
                features: impl IntoIterator<Item = Feature>,
            ) -> Result<Var<$ty>> {
                let var = Var::new(default);
                self.define(Rc::new(ScalarValue(var.clone())), name, usage, features)?;
                Ok(var)
            }

            /// Like the handle-returning form, but stores into an existing
            /// handle after resetting it to `default`.
            pub fn $name_var(
                &mut self,
                var: &Var<$ty>,
                name: &str,
                default: $ty,
                usage: &str,
                features: impl IntoIterator<Item = Feature>,
            ) -> Result<()> {
                var.set_value(default);
                self.define(Rc::new(ScalarValue(var.clone())), name, usage, features)
            }
        )*
    };
}

impl Command {
    /// Creates a root command with its own empty context.
    pub fn new(name: &str, error_handling: ErrorHandling) -> Self {
        Self {
            name: name.to_string(),
            usage: String::new(),
            lineage: Vec::new(),
            flags: FlagSet::default(),
            args: Vec::new(),
            parsed: false,
            error_handling,
            context: Rc::new(RefCell::new(Context::default())),
            subcommands: BTreeMap::new(),
        }
    }

    /// The command's own name, without ancestors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command's description, as shown at the top of its usage text.
    pub fn description(&self) -> &str {
        &self.usage
    }

    /// Replaces the description printed above the usage lines.
    pub fn set_usage(&mut self, usage: &str) {
        self.usage = usage.to_string();
    }

    /// Ancestor names and this command's name, separated by spaces.
    pub fn full_name(&self) -> String {
        let mut chain = self.lineage.clone();
        chain.push(self.name.clone());
        chain.join(" ")
    }

    /// The policy applied to parse-time failures.
    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    /// Whether a call to [`parse`](Self::parse) has bound this command's
    /// flags successfully.
    pub fn parsed(&self) -> bool {
        self.parsed
    }

    /// Shared run context: config tree, config path, and env overlay.
    pub fn context(&self) -> Ref<'_, Context> {
        self.context.borrow()
    }

    /// Mutable access to the shared run context.
    pub fn context_mut(&self) -> RefMut<'_, Context> {
        self.context.borrow_mut()
    }

    // ------------------------------------------------------------------
    // Definition
    // ------------------------------------------------------------------

    /// Checks that `name` is usable as a new flag or alias name here.
    pub(crate) fn check_new_name(&self, name: &str) -> Result<()> {
        if name.starts_with('-') {
            return Err(FlagError::BeginsWithDash(name.to_string()));
        }
        if name.contains('=') {
            return Err(FlagError::ContainsEquals(name.to_string()));
        }
        if self.flags.contains(name) {
            return Err(FlagError::Redefined {
                command: self.name.clone(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn define(
        &mut self,
        value: Rc<dyn Value>,
        name: &str,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<()> {
        self.check_new_name(name)?;
        self.flags.insert_flag(Flag::new(name, usage, value));
        debug!(command = %self.name, flag = %name, "Defined flag");
        self.apply_features(name, features.into_iter().collect())
    }

    /// Defines a flag backed by a caller-supplied [`Value`].
    ///
    /// The value's current rendering becomes the flag's default. Keep a clone
    /// of the `Rc` to read the parsed result.
    pub fn var(
        &mut self,
        value: Rc<dyn Value>,
        name: &str,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<()> {
        self.define(value, name, usage, features)
    }

    scalar_definers! {
        /// Defines a switch. `-name` alone sets it to `true`.
        bool, bool_var => bool;
        /// Defines a platform-sized signed integer flag.
        int, int_var => isize;
        /// Defines a 64-bit signed integer flag.
        int64, int64_var => i64;
        /// Defines a platform-sized unsigned integer flag.
        uint, uint_var => usize;
        /// Defines a 64-bit unsigned integer flag.
        uint64, uint64_var => u64;
        /// Defines a floating-point flag.
        float64, float64_var => f64;
        /// Defines a duration flag, written like `1h30m` or `250ms`.
        duration, duration_var => Duration;
    }

    /// Defines a string flag.
    pub fn string(
        &mut self,
        name: &str,
        default: &str,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<Var<String>> {
        let var = Var::new(default.to_string());
        self.define(Rc::new(ScalarValue(var.clone())), name, usage, features)?;
        Ok(var)
    }

    /// Defines a string flag stored in an existing handle.
    pub fn string_var(
        &mut self,
        var: &Var<String>,
        name: &str,
        default: &str,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<()> {
        var.set_value(default.to_string());
        self.define(Rc::new(ScalarValue(var.clone())), name, usage, features)
    }

    /// Defines a flag for any [`Scalar`] type, including caller types.
    pub fn scalar<T: Scalar>(
        &mut self,
        name: &str,
        default: T,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<Var<T>> {
        let var = Var::new(default);
        self.define(Rc::new(ScalarValue(var.clone())), name, usage, features)?;
        Ok(var)
    }

    /// Defines a [`Scalar`] flag stored in an existing handle.
    pub fn scalar_var<T: Scalar>(
        &mut self,
        var: &Var<T>,
        name: &str,
        default: T,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<()> {
        var.set_value(default);
        self.define(Rc::new(ScalarValue(var.clone())), name, usage, features)
    }

    /// Defines a flag for a type that converts itself to and from text.
    pub fn text<T: TextValue>(
        &mut self,
        name: &str,
        default: T,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<Var<T>> {
        let var = Var::new(default);
        self.define(Rc::new(TextAdaptor(var.clone())), name, usage, features)?;
        Ok(var)
    }

    /// Defines a text-converting flag stored in an existing handle.
    pub fn text_var<T: TextValue>(
        &mut self,
        var: &Var<T>,
        name: &str,
        default: T,
        usage: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<()> {
        var.set_value(default);
        self.define(Rc::new(TextAdaptor(var.clone())), name, usage, features)
    }

    /// Defines a flag that calls `f` with the text of every occurrence.
    ///
    /// An error from `f` is reported like any other invalid value.
    pub fn func<F>(
        &mut self,
        name: &str,
        usage: &str,
        f: F,
        features: impl IntoIterator<Item = Feature>,
    ) -> Result<()>
    where
        F: FnMut(&str) -> std::result::Result<(), ValueError> + 'static,
    {
        self.define(Rc::new(FuncValue::new(f)), name, usage, features)
    }

    // ------------------------------------------------------------------
    // Registry queries
    // ------------------------------------------------------------------

    /// Sets a flag by name or alias, recording it as explicitly set.
    ///
    /// The value is left untouched if `text` is not one of the flag's
    /// permitted values or does not parse.
    pub fn set(&mut self, name: &str, text: &str) -> Result<()> {
        self.flags.set(name, text)
    }

    /// Finds a flag by name, following aliases to the canonical flag.
    pub fn lookup(&self, name: &str) -> Option<&Flag> {
        self.flags.resolve(name)
    }

    /// The canonical name `name` is an alias for, if it is one.
    pub fn alias_target(&self, name: &str) -> Option<&str> {
        self.flags.alias_target(name)
    }

    /// Every other name that refers to the same flag as `name`.
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let Some(flag) = self.flags.resolve(name) else {
            return Vec::new();
        };
        std::iter::once(flag.name())
            .chain(flag.aliases())
            .filter(|other| *other != name)
            .map(str::to_string)
            .collect()
    }

    /// Visits explicitly set flags in lexicographic order, passing the name
    /// each was set under.
    pub fn visit(&self, mut f: impl FnMut(&str, &Flag)) {
        for name in self.flags.actual_names() {
            if let Some(flag) = self.flags.resolve(&name) {
                f(&name, flag);
            }
        }
    }

    /// Visits every registered name, aliases included, in lexicographic
    /// order.
    pub fn visit_all(&self, mut f: impl FnMut(&str, &Flag)) {
        for (name, _) in self.flags.entries() {
            if let Some(flag) = self.flags.resolve(name) {
                f(name, flag);
            }
        }
    }

    /// Whether `name` has been explicitly set by argument, env, or config.
    pub fn is_set(&self, name: &str) -> bool {
        self.flags.is_actual(name)
    }

    /// Number of explicitly set flags.
    pub fn n_flag(&self) -> usize {
        self.flags.actual_len()
    }

    /// The `i`th positional argument left after parsing.
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.args.get(i).map(String::as_str)
    }

    /// Number of positional arguments left after parsing.
    pub fn n_arg(&self) -> usize {
        self.args.len()
    }

    /// Positional arguments left after parsing.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    // ------------------------------------------------------------------
    // Subcommands
    // ------------------------------------------------------------------

    /// Declares a subcommand.
    ///
    /// The child shares this command's context and error policy. `handler`
    /// runs only when the subcommand is dispatched; it normally defines the
    /// child's flags and then calls [`parse`](Self::parse) on it.
    pub fn sub_cmd<F>(&mut self, name: &str, usage: &str, handler: F)
    where
        F: FnMut(&mut Command, Vec<String>) -> Result<()> + 'static,
    {
        let mut lineage = self.lineage.clone();
        lineage.push(self.name.clone());
        let command = Command {
            name: name.to_string(),
            usage: usage.to_string(),
            lineage,
            flags: FlagSet::default(),
            args: Vec::new(),
            parsed: false,
            error_handling: self.error_handling,
            context: Rc::clone(&self.context),
            subcommands: BTreeMap::new(),
        };
        let previous = self.subcommands.insert(
            name.to_string(),
            SubCommand {
                command,
                handler: Box::new(handler),
            },
        );
        if previous.is_some() {
            warn!(command = %self.name, subcommand = %name, "Replaced existing subcommand");
        }
    }

    /// The declared subcommand called `name`.
    pub fn subcommand(&self, name: &str) -> Option<&Command> {
        self.subcommands.get(name).map(|sub| &sub.command)
    }

    /// Mutable access to the declared subcommand called `name`.
    pub fn subcommand_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.subcommands.get_mut(name).map(|sub| &mut sub.command)
    }

    /// Declared subcommand names in lexicographic order.
    pub fn subcommand_names(&self) -> impl Iterator<Item = &str> {
        self.subcommands.keys().map(String::as_str)
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    /// Dispatches to a subcommand or binds this command's flags.
    ///
    /// If the first argument contains no `-`, it must name a declared
    /// subcommand; that subcommand's handler runs with the remaining
    /// arguments and this command binds nothing. Otherwise flags are parsed
    /// from the front of `args` and the rest are kept as positional
    /// arguments. Arguments override values bound from env or config.
    ///
    /// Failures go through the command's [`ErrorHandling`] policy.
    pub fn parse<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        match self.dispatch(&args) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => return self.handle_error(err),
        }

        let mut pending = VecDeque::from(args);
        let outcome = loop {
            match parser::parse_one(&mut self.flags, &mut pending) {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        self.args = pending.into();
        match outcome {
            Ok(()) => {
                self.parsed = true;
                debug!(command = %self.name, flags = self.n_flag(), args = self.args.len(), "Parsed arguments");
                Ok(())
            }
            Err(err) => self.handle_error(err),
        }
    }

    /// Runs subcommand dispatch only, leaving this command's flags to their
    /// env, config, and default values.
    pub fn parse_without_args<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        match self.dispatch(&args) {
            Ok(_) => Ok(()),
            Err(err) => self.handle_error(err),
        }
    }

    /// Returns `Ok(true)` if a subcommand consumed the arguments.
    fn dispatch(&mut self, args: &[String]) -> Result<bool> {
        let Some((name, rest)) = first_subcommand(args) else {
            return Ok(false);
        };
        let Some(sub) = self.subcommands.get_mut(name) else {
            return Err(FlagError::UnknownSubcommand(name.to_string()));
        };
        debug!(command = %self.name, subcommand = %name, args = rest.len(), "Dispatching subcommand");
        let SubCommand { command, handler } = sub;
        handler(command, rest.to_vec())?;
        Ok(true)
    }

    /// Applies the error policy to a parse-time failure.
    pub fn handle_error(&self, err: FlagError) -> Result<()> {
        match self.error_handling {
            ErrorHandling::ContinueOnError => Err(err),
            ErrorHandling::ExitOnError => {
                if matches!(err, FlagError::HelpRequested) {
                    std::process::exit(0);
                }
                error!(command = %self.full_name(), error = %err, "Command failed");
                std::process::exit(2)
            }
            ErrorHandling::PanicOnError => panic!("{err}"),
        }
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    /// Installs a decoded config tree into the shared context and re-applies
    /// every cfg binding declared anywhere in the tree, from the root down.
    ///
    /// Binding failures are collected; every other binding is still applied.
    pub fn install_config(&mut self, tree: ConfigTree, path: Option<PathBuf>) -> Result<()> {
        self.context.borrow_mut().install_config(tree, path);
        let bindings = self.context.borrow().cfg_bindings();
        let mut failures = Vec::new();
        for binding in bindings {
            let mut errors = Vec::new();
            binding.apply(&self.context, &mut errors);
            if let Err(err) = binding_result(binding.flag(), errors) {
                failures.push(err);
            }
        }
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(FlagError::Config(format!(
                "failed to apply config: {}",
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            ))),
        }
    }

    /// Merges variables into the shared env overlay.
    ///
    /// Only flags defined afterwards see the new values.
    pub fn merge_env<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.context.borrow_mut().merge_env(vars)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("lineage", &self.lineage)
            .field("flags", &self.flags)
            .field("args", &self.args)
            .field("parsed", &self.parsed)
            .field("error_handling", &self.error_handling)
            .field(
                "subcommands",
                &self.subcommands.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
