//! Argument tokenizer.
//!
//! Consumes flag tokens from the front of a command's pending arguments, one
//! flag per call to [`parse_one`]. Both `-name` and `--name` are accepted;
//! a value is given either inline (`--name=value`) or as the next token.
//! Parsing stops at the first token that is not a flag, or right after a
//! standalone `--`.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{FlagError, Result};
use crate::flag::FlagSet;

/// Parses one flag off the front of `pending`.
///
/// Returns `Ok(true)` if a flag was consumed and `Ok(false)` when flag
/// parsing is over. Whatever is left in `pending` after `Ok(false)` is
/// positional.
pub(crate) fn parse_one(flags: &mut FlagSet, pending: &mut VecDeque<String>) -> Result<bool> {
    let Some(token) = pending.front() else {
        return Ok(false);
    };
    if token.len() < 2 || !token.starts_with('-') {
        return Ok(false);
    }

    let dashes = if token.starts_with("--") { 2 } else { 1 };
    if dashes == 2 && token.len() == 2 {
        pending.pop_front();
        trace!("Flag terminator, remaining tokens are positional");
        return Ok(false);
    }

    let body = &token[dashes..];
    if body.is_empty() || body.starts_with(['-', '=']) {
        return Err(FlagError::BadSyntax(token.clone()));
    }

    // `=` in first position was rejected above, so any match splits a
    // non-empty name.
    let (name, inline) = match body.char_indices().skip(1).find(|&(_, c)| c == '=') {
        Some((i, _)) => (body[..i].to_string(), Some(body[i + 1..].to_string())),
        None => (body.to_string(), None),
    };
    pending.pop_front();

    let Some(flag) = flags.resolve(&name) else {
        return Err(FlagError::Undefined(name));
    };

    if flag.is_switch() {
        let value = inline.unwrap_or_else(|| "true".to_string());
        if let Err(err) = flag.set(&value) {
            return Err(FlagError::InvalidBoolean {
                name,
                value,
                source: Box::new(err),
            });
        }
        trace!(flag = %name, value = %value, "Parsed switch");
    } else {
        let value = match inline {
            Some(value) => value,
            None => pending
                .pop_front()
                .ok_or_else(|| FlagError::MissingArgument(name.clone()))?,
        };
        if let Err(err) = flag.set(&value) {
            return Err(FlagError::InvalidValue {
                name,
                value,
                source: Box::new(err),
            });
        }
        trace!(flag = %name, value = %value, "Parsed flag");
    }

    flags.mark_actual(&name);
    Ok(true)
}

/// Splits off a leading subcommand-shaped token.
///
/// The first argument is treated as a subcommand name when it contains no
/// `-` anywhere. Returns the name and the arguments that follow it.
///
/// ```
/// use flagtree_core::first_subcommand;
///
/// let args: Vec<String> = ["commit", "--branch", "stable"].map(String::from).to_vec();
/// let (name, rest) = first_subcommand(&args).unwrap();
/// assert_eq!(name, "commit");
/// assert_eq!(rest, &args[1..]);
///
/// let flags: Vec<String> = vec!["--branch".into()];
/// assert!(first_subcommand(&flags).is_none());
/// assert!(first_subcommand(&[]).is_none());
/// ```
pub fn first_subcommand(args: &[String]) -> Option<(&str, &[String])> {
    let (first, rest) = args.split_first()?;
    if first.contains('-') {
        return None;
    }
    Some((first.as_str(), rest))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::flag::Flag;
    use crate::value::{ScalarValue, Var};

    fn pending(args: &[&str]) -> VecDeque<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn registry() -> (FlagSet, Var<bool>, Var<String>) {
        let verbose = Var::new(false);
        let name = Var::new(String::new());
        let mut set = FlagSet::default();
        set.insert_flag(Flag::new("v", "verbose", Rc::new(ScalarValue(verbose.clone()))));
        set.insert_flag(Flag::new("name", "a name", Rc::new(ScalarValue(name.clone()))));
        set.insert_alias("n", "name");
        (set, verbose, name)
    }

    fn drain(set: &mut FlagSet, args: &mut VecDeque<String>) -> Result<()> {
        while parse_one(set, args)? {}
        Ok(())
    }

    #[test]
    fn test_switch_does_not_consume_next_token() {
        let (mut set, verbose, _) = registry();
        let mut args = pending(&["-v", "extra"]);
        drain(&mut set, &mut args).unwrap();
        assert!(verbose.get());
        assert_eq!(args, pending(&["extra"]));
    }

    #[test]
    fn test_value_forms() {
        let (mut set, _, name) = registry();
        let mut args = pending(&["--name", "a"]);
        drain(&mut set, &mut args).unwrap();
        assert_eq!(name.get(), "a");

        let mut args = pending(&["-name=b=c"]);
        drain(&mut set, &mut args).unwrap();
        assert_eq!(name.get(), "b=c");

        let mut args = pending(&["--name="]);
        drain(&mut set, &mut args).unwrap();
        assert_eq!(name.get(), "");
    }

    #[test]
    fn test_double_dash_terminates() {
        let (mut set, verbose, _) = registry();
        let mut args = pending(&["--", "-v"]);
        drain(&mut set, &mut args).unwrap();
        assert!(!verbose.get());
        assert_eq!(args, pending(&["-v"]));
    }

    #[test]
    fn test_single_dash_is_positional() {
        let (mut set, _, _) = registry();
        let mut args = pending(&["-", "-v"]);
        drain(&mut set, &mut args).unwrap();
        assert_eq!(args, pending(&["-", "-v"]));
    }

    #[test]
    fn test_bad_syntax() {
        let (mut set, _, _) = registry();
        for token in ["---v", "-=x", "--=x"] {
            let mut args = pending(&[token]);
            let err = drain(&mut set, &mut args).unwrap_err();
            assert_eq!(err.to_string(), format!("bad flag syntax: {token}"));
        }
    }

    #[test]
    fn test_undefined_and_missing_argument() {
        let (mut set, _, _) = registry();
        let err = drain(&mut set, &mut pending(&["-help"])).unwrap_err();
        assert_eq!(err.to_string(), "flag provided but not defined: -help");

        let err = drain(&mut set, &mut pending(&["--name"])).unwrap_err();
        assert_eq!(err.to_string(), "flag needs an argument: -name");
    }

    #[test]
    fn test_invalid_boolean() {
        let (mut set, verbose, _) = registry();
        let err = drain(&mut set, &mut pending(&["-v=maybe"])).unwrap_err();
        assert!(matches!(err, FlagError::InvalidBoolean { .. }));
        assert_eq!(err.to_string(), "invalid boolean value \"maybe\" for -v: parse error");
        assert!(!verbose.get());
        assert_eq!(set.actual_len(), 0);
    }

    #[test]
    fn test_alias_recorded_under_literal_name() {
        let (mut set, _, name) = registry();
        drain(&mut set, &mut pending(&["-n", "x"])).unwrap();
        assert_eq!(name.get(), "x");
        assert!(set.is_actual("n"));
        assert!(!set.is_actual("name"));
    }
}
