//! Error types for flag definition, value parsing, and argument parsing.
//!
//! Two layers of errors exist:
//!
//! - [`ValueError`] is produced by a [`Value`](crate::Value) when text cannot
//!   be converted into the underlying type.
//! - [`FlagError`] covers everything a [`Command`](crate::Command) can report,
//!   from definition mistakes to tokenizer failures and dispatch failures.
//!
//! Definition errors (see [`FlagError::is_definition`]) are returned straight
//! from the definition call and never go through the command's
//! [`ErrorHandling`](crate::ErrorHandling) policy.

use thiserror::Error;

/// Failure converting text into a flag value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The text is not valid syntax for the target type.
    #[error("parse error")]
    Syntax,
    /// The text is valid syntax but outside the representable range.
    #[error("value out of range")]
    Range,
    /// Failure reported by a text-marshal or callback value.
    #[error("{0}")]
    Invalid(String),
}

impl ValueError {
    /// Creates an [`Invalid`](ValueError::Invalid) error from any message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Errors raised while defining flags, binding sources, or parsing arguments.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Flag name starts with `-`.
    #[error("flag {0:?} begins with -")]
    BeginsWithDash(String),

    /// Flag name contains `=`.
    #[error("flag {0:?} contains =")]
    ContainsEquals(String),

    /// A flag with this name already exists on the command.
    #[error("{}flag redefined: {name}", command_prefix(.command))]
    Redefined { command: String, name: String },

    /// An alias uses the name of the flag it aliases.
    #[error("cannot add alias to the flag with the same name {0}")]
    AliasSelf(String),

    /// An alias name is already taken on the command.
    #[error("cannot add alias {alias} to flag {flag}: {source}")]
    AliasCollision {
        alias: String,
        flag: String,
        #[source]
        source: Box<FlagError>,
    },

    /// An enum feature was attached to a flag whose default is not allowed.
    #[error(
        "cannot add enum feature to flag {flag}: default value {default:?} is not one of [{}]",
        .allowed.join(", ")
    )]
    EnumDefault {
        flag: String,
        default: String,
        allowed: Vec<String>,
    },

    /// One or more env/cfg/enum bindings failed while defining a flag.
    #[error("failed to bind flag {flag}: {}", join_errors(.failures))]
    Binding {
        flag: String,
        failures: Vec<FlagError>,
    },

    /// A single env or cfg source rejected by the flag.
    #[error("{origin} value {value:?}: {source}")]
    Bound {
        origin: String,
        value: String,
        #[source]
        source: Box<FlagError>,
    },

    /// A value outside the flag's permitted set.
    #[error("flag {flag} is a enum flag, needs one of these values {}", .allowed.join(", "))]
    EnumViolation { flag: String, allowed: Vec<String> },

    /// Malformed flag token such as `---x` or `-=x`.
    #[error("bad flag syntax: {0}")]
    BadSyntax(String),

    /// Flag token naming no defined flag.
    #[error("flag provided but not defined: -{0}")]
    Undefined(String),

    /// A value-taking flag appeared last with no value.
    #[error("flag needs an argument: -{0}")]
    MissingArgument(String),

    /// A switch given an explicit value that is not a boolean.
    #[error("invalid boolean value {value:?} for -{name}: {source}")]
    InvalidBoolean {
        name: String,
        value: String,
        #[source]
        source: Box<FlagError>,
    },

    /// A value-taking flag given text its value rejects.
    #[error("invalid value {value:?} for flag -{name}: {source}")]
    InvalidValue {
        name: String,
        value: String,
        #[source]
        source: Box<FlagError>,
    },

    /// The value itself rejected the text.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Direct `set` of a flag that was never defined.
    #[error("no such flag -{0}")]
    NoSuchFlag(String),

    /// A dash-free leading token that names no declared subcommand.
    #[error("you are trying to run subcommand with name {0} but it doesn't exist")]
    UnknownSubcommand(String),

    /// Help was requested; the exit policy treats this as success.
    #[error("flag: help requested")]
    HelpRequested,

    /// Loading or persisting configuration failed.
    #[error("{0}")]
    Config(String),

    /// Error returned by a subcommand handler.
    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

fn join_errors(errors: &[FlagError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn command_prefix(command: &str) -> String {
    if command.is_empty() {
        String::new()
    } else {
        format!("{command} ")
    }
}

impl FlagError {
    /// Wraps an arbitrary handler error.
    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Handler(err.into())
    }

    /// Returns `true` for programmer errors raised while defining flags.
    ///
    /// ```
    /// use flagtree_core::FlagError;
    ///
    /// assert!(FlagError::BeginsWithDash("-x".into()).is_definition());
    /// assert!(!FlagError::Undefined("x".into()).is_definition());
    /// ```
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            Self::BeginsWithDash(_)
                | Self::ContainsEquals(_)
                | Self::Redefined { .. }
                | Self::AliasSelf(_)
                | Self::AliasCollision { .. }
                | Self::EnumDefault { .. }
                | Self::Binding { .. }
        )
    }

    /// Returns the innermost value-level cause, if any.
    pub fn value_error(&self) -> Option<&ValueError> {
        match self {
            Self::Value(err) => Some(err),
            Self::InvalidBoolean { source, .. }
            | Self::InvalidValue { source, .. }
            | Self::Bound { source, .. } => source.value_error(),
            _ => None,
        }
    }

    /// Returns `true` if this error, or the error it wraps, is an enum violation.
    pub fn is_enum_violation(&self) -> bool {
        match self {
            Self::EnumViolation { .. } => true,
            Self::InvalidBoolean { source, .. }
            | Self::InvalidValue { source, .. }
            | Self::Bound { source, .. } => source.is_enum_violation(),
            Self::Binding { failures, .. } => failures.iter().any(Self::is_enum_violation),
            _ => false,
        }
    }
}

/// Convenience alias for results with [`FlagError`].
pub type Result<T> = std::result::Result<T, FlagError>;
