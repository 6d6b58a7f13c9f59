//! Flag records and the per-command flag registry.
//!
//! A [`Flag`] owns the canonical definition: name, usage, value, default
//! text, and the env/cfg/enum/alias metadata attached by features. Aliases
//! are registered as separate entries that only name their target, so every
//! read of an alias's metadata goes through the canonical flag.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::error::{FlagError, Result};
use crate::value::Value;

/// A defined flag.
pub struct Flag {
    name: String,
    usage: String,
    value: Rc<dyn Value>,
    default: String,
    pub(crate) envs: BTreeSet<String>,
    pub(crate) cfgs: BTreeSet<String>,
    pub(crate) choices: BTreeSet<String>,
    pub(crate) aliases: BTreeSet<String>,
}

impl Flag {
    /// Creates a flag, capturing the current rendering of `value` as its
    /// default.
    pub(crate) fn new(name: &str, usage: &str, value: Rc<dyn Value>) -> Self {
        let default = value.render();
        Self {
            name: name.to_string(),
            usage: usage.to_string(),
            value,
            default,
            envs: BTreeSet::new(),
            cfgs: BTreeSet::new(),
            choices: BTreeSet::new(),
            aliases: BTreeSet::new(),
        }
    }

    /// Name as it appears on the command line, without dashes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Default value as text, captured when the flag was defined.
    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// The underlying value.
    pub fn value(&self) -> &dyn Value {
        self.value.as_ref()
    }

    /// Current value as text.
    pub fn current(&self) -> String {
        self.value.render()
    }

    /// Whether the flag can be given without a value.
    pub fn is_switch(&self) -> bool {
        self.value.is_switch()
    }

    /// Environment variables bound to this flag.
    pub fn envs(&self) -> impl Iterator<Item = &str> {
        self.envs.iter().map(String::as_str)
    }

    /// Config dot-paths bound to this flag.
    pub fn cfgs(&self) -> impl Iterator<Item = &str> {
        self.cfgs.iter().map(String::as_str)
    }

    /// Permitted values; empty means unrestricted.
    pub fn choices(&self) -> impl Iterator<Item = &str> {
        self.choices.iter().map(String::as_str)
    }

    /// Alias names registered for this flag.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    pub(crate) fn value_rc(&self) -> Rc<dyn Value> {
        Rc::clone(&self.value)
    }

    pub(crate) fn allows(&self, text: &str) -> bool {
        self.choices.is_empty() || self.choices.contains(text)
    }

    /// Enum check, then type parse. The value is untouched on failure.
    pub(crate) fn set(&self, text: &str) -> Result<()> {
        if !self.allows(text) {
            return Err(FlagError::EnumViolation {
                flag: self.name.clone(),
                allowed: self.choices.iter().cloned().collect(),
            });
        }
        self.value.set(text)?;
        Ok(())
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("kind", &self.value.kind())
            .field("current", &self.value.render())
            .field("default", &self.default)
            .field("envs", &self.envs)
            .field("cfgs", &self.cfgs)
            .field("choices", &self.choices)
            .field("aliases", &self.aliases)
            .finish()
    }
}

/// Registry entry: either a canonical flag or an alias naming one.
#[derive(Debug)]
pub(crate) enum Entry {
    Flag(Flag),
    Alias { target: String },
}

/// Names explicitly set on one command. Shared with the cfg bindings kept
/// in the run context, which mark flags when a config is reloaded.
pub(crate) type ActualSet = Rc<RefCell<BTreeSet<String>>>;

/// Formal (defined) and actual (explicitly set) flags of one command.
#[derive(Debug, Default)]
pub(crate) struct FlagSet {
    formal: BTreeMap<String, Entry>,
    actual: ActualSet,
}

impl FlagSet {
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.formal.contains_key(name)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.formal.is_empty()
    }

    pub(crate) fn insert_flag(&mut self, flag: Flag) {
        self.formal.insert(flag.name.clone(), Entry::Flag(flag));
    }

    pub(crate) fn insert_alias(&mut self, alias: &str, target: &str) {
        self.formal.insert(
            alias.to_string(),
            Entry::Alias {
                target: target.to_string(),
            },
        );
    }

    /// Resolves `name` to its canonical flag, following an alias entry.
    pub(crate) fn resolve(&self, name: &str) -> Option<&Flag> {
        match self.formal.get(name)? {
            Entry::Flag(flag) => Some(flag),
            Entry::Alias { target } => match self.formal.get(target)? {
                Entry::Flag(flag) => Some(flag),
                Entry::Alias { .. } => None,
            },
        }
    }

    /// Mutable access to a canonical flag by its own name.
    pub(crate) fn canonical_mut(&mut self, name: &str) -> Option<&mut Flag> {
        match self.formal.get_mut(name)? {
            Entry::Flag(flag) => Some(flag),
            Entry::Alias { .. } => None,
        }
    }

    pub(crate) fn alias_target(&self, name: &str) -> Option<&str> {
        match self.formal.get(name)? {
            Entry::Alias { target } => Some(target),
            Entry::Flag(_) => None,
        }
    }

    /// Validated set keyed by the literal name used.
    pub(crate) fn set(&mut self, name: &str, text: &str) -> Result<()> {
        let flag = self
            .resolve(name)
            .ok_or_else(|| FlagError::NoSuchFlag(name.to_string()))?;
        flag.set(text)?;
        self.mark_actual(name);
        Ok(())
    }

    pub(crate) fn mark_actual(&mut self, name: &str) {
        self.actual.borrow_mut().insert(name.to_string());
    }

    pub(crate) fn actual_handle(&self) -> ActualSet {
        Rc::clone(&self.actual)
    }

    pub(crate) fn actual_len(&self) -> usize {
        self.actual.borrow().len()
    }

    pub(crate) fn is_actual(&self, name: &str) -> bool {
        self.actual.borrow().contains(name)
    }

    /// All entries in lexicographic order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.formal.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Explicitly set names, in lexicographic order.
    pub(crate) fn actual_names(&self) -> Vec<String> {
        self.actual.borrow().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ScalarValue, Var};

    fn string_flag(name: &str, default: &str) -> (Flag, Var<String>) {
        let var = Var::new(default.to_string());
        let flag = Flag::new(name, "usage", Rc::new(ScalarValue(var.clone())));
        (flag, var)
    }

    #[test]
    fn test_default_captured_at_definition() {
        let (flag, var) = string_flag("mode", "fast");
        var.set_value("slow".into());
        assert_eq!(flag.default_value(), "fast");
        assert_eq!(flag.current(), "slow");
    }

    #[test]
    fn test_enum_violation_keeps_value() {
        let (mut flag, var) = string_flag("mode", "a");
        flag.choices.extend(["a".to_string(), "b".to_string()]);
        let err = flag.set("z").unwrap_err();
        assert!(matches!(err, FlagError::EnumViolation { .. }));
        assert_eq!(var.get(), "a");
        flag.set("b").unwrap();
        assert_eq!(var.get(), "b");
    }

    #[test]
    fn test_alias_resolves_to_target() {
        let (flag, var) = string_flag("password", "");
        let mut set = FlagSet::default();
        set.insert_flag(flag);
        set.insert_alias("p", "password");

        assert_eq!(set.resolve("p").unwrap().name(), "password");
        assert_eq!(set.alias_target("p"), Some("password"));
        assert_eq!(set.alias_target("password"), None);
        assert!(set.canonical_mut("p").is_none());

        set.set("p", "12345").unwrap();
        assert_eq!(var.get(), "12345");
        assert!(set.is_actual("p"));
        assert!(!set.is_actual("password"));
    }

    #[test]
    fn test_set_unknown_flag() {
        let mut set = FlagSet::default();
        let err = set.set("nope", "1").unwrap_err();
        assert_eq!(err.to_string(), "no such flag -nope");
        assert_eq!(set.actual_len(), 0);
    }
}
