//! Flag value abstraction.
//!
//! Every flag owns a [`Value`]: something that can be set from text and
//! rendered back to text. The built-in scalar types implement [`Scalar`] and
//! are stored behind a [`Var`] handle that the caller keeps to read the
//! parsed result:
//!
//! ```
//! use flagtree_core::{Command, ErrorHandling};
//!
//! let mut cmd = Command::new("app", ErrorHandling::ContinueOnError);
//! let port = cmd.int("port", 8080, "port to listen on", []).unwrap();
//! cmd.parse(["--port", "9090"]).unwrap();
//! assert_eq!(port.get(), 9090);
//! ```
//!
//! Each value reports a [`ValueKind`], which the usage renderer turns into a
//! type tag such as `int` or `duration`.

use std::cell::RefCell;
use std::fmt;
use std::num::IntErrorKind;
use std::rc::Rc;
use std::time::Duration;

use crate::duration;
use crate::error::ValueError;

/// The variant of a flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Int64,
    Uint,
    Uint64,
    Float64,
    String,
    Duration,
    /// A caller type using [`TextValue`].
    Text,
    /// A callback flag created with [`Command::func`](crate::Command::func).
    Func,
    /// Any other caller-supplied [`Value`].
    Custom,
}

impl ValueKind {
    /// Type tag shown in usage text. Switches have no tag.
    ///
    /// ```
    /// use flagtree_core::ValueKind;
    ///
    /// assert_eq!(ValueKind::Int64.type_tag(), "int");
    /// assert_eq!(ValueKind::Bool.type_tag(), "");
    /// assert_eq!(ValueKind::Text.type_tag(), "value");
    /// ```
    pub fn type_tag(self) -> &'static str {
        match self {
            Self::Bool => "",
            Self::Duration => "duration",
            Self::Float64 => "float",
            Self::Int | Self::Int64 => "int",
            Self::String => "string",
            Self::Uint | Self::Uint64 => "uint",
            Self::Text | Self::Func | Self::Custom => "value",
        }
    }
}

/// The dynamic value stored in a flag.
///
/// Values use interior mutability: a flag and all of its aliases hold the
/// same `Rc<dyn Value>`, so `set` takes `&self`.
pub trait Value {
    /// Sets the value from text.
    fn set(&self, text: &str) -> Result<(), ValueError>;

    /// Renders the current value as text.
    fn render(&self) -> String;

    /// The variant of this value.
    fn kind(&self) -> ValueKind {
        ValueKind::Custom
    }

    /// Whether the parser may omit an explicit value (`-v` means `-v=true`).
    fn is_switch(&self) -> bool {
        self.kind() == ValueKind::Bool
    }

    /// Renders the zero value of this value's type, used to decide whether a
    /// default is worth printing in usage text.
    fn zero_render(&self) -> Result<String, ValueError> {
        Ok(String::new())
    }
}

/// Shared handle to the storage behind a flag.
///
/// Cloning the handle clones the pointer, not the value.
#[derive(Default)]
pub struct Var<T>(Rc<RefCell<T>>);

impl<T> Var<T> {
    /// Creates a handle holding `value`.
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Runs `f` against the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Replaces the current value.
    pub fn set_value(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    /// Returns `true` if both handles point at the same storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> Var<T> {
    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Var").field(&*self.0.borrow()).finish()
    }
}

/// A plain flag type stored by value in a [`Var`].
///
/// The built-in types implement it; a caller type can too and be defined
/// with [`Command::scalar`](crate::Command::scalar). `Default` supplies the
/// zero value shown in usage text.
pub trait Scalar: Clone + Default + 'static {
    /// Kind reported for usage type tags and switch detection.
    const KIND: ValueKind;

    /// Parses text into a new value.
    fn parse_text(text: &str) -> Result<Self, ValueError>;

    /// Renders the value as text that `parse_text` accepts.
    fn render_text(&self) -> String;
}

impl Scalar for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn parse_text(text: &str) -> Result<Self, ValueError> {
        match text {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(ValueError::Syntax),
        }
    }

    fn render_text(&self) -> String {
        self.to_string()
    }
}

impl Scalar for String {
    const KIND: ValueKind = ValueKind::String;

    fn parse_text(text: &str) -> Result<Self, ValueError> {
        Ok(text.to_string())
    }

    fn render_text(&self) -> String {
        self.clone()
    }
}

impl Scalar for Duration {
    const KIND: ValueKind = ValueKind::Duration;

    fn parse_text(text: &str) -> Result<Self, ValueError> {
        duration::parse(text)
    }

    fn render_text(&self) -> String {
        duration::render(*self)
    }
}

impl Scalar for f64 {
    const KIND: ValueKind = ValueKind::Float64;

    fn parse_text(text: &str) -> Result<Self, ValueError> {
        let value: f64 = text.parse().map_err(|_| ValueError::Syntax)?;
        if value.is_infinite() && !text.to_ascii_lowercase().contains("inf") {
            return Err(ValueError::Range);
        }
        Ok(value)
    }

    fn render_text(&self) -> String {
        render_float(*self)
    }
}

macro_rules! signed_scalar {
    ($ty:ty, $kind:ident) => {
        impl Scalar for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn parse_text(text: &str) -> Result<Self, ValueError> {
                let (negative, magnitude) = parse_integer(text, true)?;
                let magnitude = i128::try_from(magnitude).map_err(|_| ValueError::Range)?;
                let value = if negative { -magnitude } else { magnitude };
                <$ty>::try_from(value).map_err(|_| ValueError::Range)
            }

            fn render_text(&self) -> String {
                self.to_string()
            }
        }
    };
}

macro_rules! unsigned_scalar {
    ($ty:ty, $kind:ident) => {
        impl Scalar for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn parse_text(text: &str) -> Result<Self, ValueError> {
                let (_, magnitude) = parse_integer(text, false)?;
                <$ty>::try_from(magnitude).map_err(|_| ValueError::Range)
            }

            fn render_text(&self) -> String {
                self.to_string()
            }
        }
    };
}

signed_scalar!(isize, Int);
signed_scalar!(i64, Int64);
unsigned_scalar!(usize, Uint);
unsigned_scalar!(u64, Uint64);

/// Parses integer text with an optional sign and base prefix.
///
/// Supports `0x`, `0o`, `0b` and leading-zero octal. Underscores are only
/// allowed between digits of a prefixed literal.
fn parse_integer(text: &str, signed: bool) -> Result<(bool, u128), ValueError> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') if signed => (true, &text[1..]),
        Some(b'+') if signed => (false, &text[1..]),
        _ => (false, text),
    };

    let lower = body.to_ascii_lowercase();
    let (radix, digits, prefixed) = if let Some(d) = lower.strip_prefix("0x") {
        (16, d, true)
    } else if let Some(d) = lower.strip_prefix("0o") {
        (8, d, true)
    } else if let Some(d) = lower.strip_prefix("0b") {
        (2, d, true)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..], true)
    } else {
        (10, lower.as_str(), false)
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(ValueError::Syntax);
    }
    let cleaned: String = if digits.contains('_') {
        if !prefixed || digits.ends_with('_') || digits.contains("__") {
            return Err(ValueError::Syntax);
        }
        digits.chars().filter(|c| *c != '_').collect()
    } else {
        digits.to_string()
    };

    let magnitude = u128::from_str_radix(&cleaned, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ValueError::Range,
        _ => ValueError::Syntax,
    })?;
    Ok((negative, magnitude))
}

/// Shortest round-trip text, in exponent form outside `1e-4 ..= 1e6`.
fn render_float(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value.is_nan() {
        return "NaN".to_string();
    }
    let sci = format!("{value:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return value.to_string();
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..6).contains(&exp) {
        value.to_string()
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    }
}

/// [`Value`] adaptor for [`Scalar`] types.
pub(crate) struct ScalarValue<T>(pub(crate) Var<T>);

impl<T: Scalar> Value for ScalarValue<T> {
    fn set(&self, text: &str) -> Result<(), ValueError> {
        let parsed = T::parse_text(text)?;
        self.0.set_value(parsed);
        Ok(())
    }

    fn render(&self) -> String {
        self.0.with(T::render_text)
    }

    fn kind(&self) -> ValueKind {
        T::KIND
    }

    fn zero_render(&self) -> Result<String, ValueError> {
        Ok(T::default().render_text())
    }
}

/// A caller type that converts itself to and from text.
///
/// ```
/// use flagtree_core::{TextValue, ValueError};
///
/// #[derive(Default)]
/// struct Level(u8);
///
/// impl TextValue for Level {
///     fn unmarshal_text(&mut self, text: &str) -> Result<(), ValueError> {
///         self.0 = match text {
///             "low" => 1,
///             "high" => 2,
///             _ => return Err(ValueError::invalid(format!("unknown level {text}"))),
///         };
///         Ok(())
///     }
///
///     fn marshal_text(&self) -> Result<String, ValueError> {
///         match self.0 {
///             1 => Ok("low".into()),
///             2 => Ok("high".into()),
///             _ => Err(ValueError::invalid("level not set")),
///         }
///     }
/// }
/// ```
pub trait TextValue: Default + 'static {
    fn unmarshal_text(&mut self, text: &str) -> Result<(), ValueError>;

    fn marshal_text(&self) -> Result<String, ValueError>;
}

/// [`Value`] adaptor for [`TextValue`] types.
pub(crate) struct TextAdaptor<T>(pub(crate) Var<T>);

impl<T: TextValue> Value for TextAdaptor<T> {
    fn set(&self, text: &str) -> Result<(), ValueError> {
        let mut next = T::default();
        next.unmarshal_text(text)?;
        self.0.set_value(next);
        Ok(())
    }

    fn render(&self) -> String {
        self.0.with(|v| v.marshal_text().unwrap_or_default())
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Text
    }

    fn zero_render(&self) -> Result<String, ValueError> {
        T::default().marshal_text()
    }
}

type Callback = Box<dyn FnMut(&str) -> Result<(), ValueError>>;

/// [`Value`] that hands every occurrence to a callback.
pub(crate) struct FuncValue(RefCell<Callback>);

impl FuncValue {
    pub(crate) fn new(f: impl FnMut(&str) -> Result<(), ValueError> + 'static) -> Self {
        Self(RefCell::new(Box::new(f)))
    }
}

impl Value for FuncValue {
    fn set(&self, text: &str) -> Result<(), ValueError> {
        let mut callback = self.0.borrow_mut();
        (*callback)(text)
    }

    fn render(&self) -> String {
        String::new()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Func
    }
}
