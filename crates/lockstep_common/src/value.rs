//! The typed value model carried by bus signals.
//!
//! Every signal has a [`SignalType`] fixed at bus instantiation. Values that
//! processes stage are checked against it before they can reach the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SignalType {
    /// Single boolean wire.
    Bool,
    /// Two's complement integer of the given bit width (1..=64).
    Signed {
        /// Bit width.
        width: u8,
    },
    /// Unsigned integer of the given bit width (1..=64).
    Unsigned {
        /// Bit width.
        width: u8,
    },
}

/// Errors from constructing a type or checking a value against one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Integer width outside 1..=64.
    #[error("invalid integer width {0} (expected 1..=64)")]
    InvalidWidth(u32),
    /// The value's variant does not match the declared type.
    #[error("{value} is not a {expected} value")]
    WrongKind {
        /// Declared type.
        expected: SignalType,
        /// Offending value.
        value: Value,
    },
    /// An integer does not fit the declared width.
    #[error("{value} does not fit in {ty}")]
    OutOfRange {
        /// Declared type.
        ty: SignalType,
        /// Offending value.
        value: Value,
    },
}

/// Error returned when a type name such as `u8` or `bool` fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal type '{input}' (expected bool, int, uint, iN or uN)")]
pub struct ParseTypeError {
    /// The rejected text.
    pub input: String,
}

impl SignalType {
    /// Signed integer type, validating the width.
    pub fn signed(width: u32) -> Result<Self, ValueError> {
        Ok(Self::Signed {
            width: check_width(width)?,
        })
    }

    /// Unsigned integer type, validating the width.
    pub fn unsigned(width: u32) -> Result<Self, ValueError> {
        Ok(Self::Unsigned {
            width: check_width(width)?,
        })
    }

    /// Checks that an integer type's width is within 1..=64.
    ///
    /// The constructors enforce this; types built from the public fields
    /// are only checked here.
    pub fn check(&self) -> Result<(), ValueError> {
        match self {
            SignalType::Bool => Ok(()),
            SignalType::Signed { width } | SignalType::Unsigned { width } => {
                check_width(u32::from(*width)).map(|_| ())
            }
        }
    }

    /// Bit width of the type; `Bool` is one bit.
    pub fn width(&self) -> u32 {
        match self {
            SignalType::Bool => 1,
            SignalType::Signed { width } | SignalType::Unsigned { width } => u32::from(*width),
        }
    }

    /// Returns `true` if `value` is exactly representable in this type
    /// without conversion.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (SignalType::Bool, Value::Bool(_)) => true,
            (SignalType::Signed { width }, Value::Signed(v)) => signed_fits(*v, *width),
            (SignalType::Unsigned { width }, Value::Unsigned(v)) => unsigned_fits(*v, *width),
            _ => false,
        }
    }

    /// Converts `value` into this type's variant.
    ///
    /// Integers may cross between signed and unsigned when the number fits
    /// the declared width; booleans and integers never mix.
    pub fn coerce(&self, value: Value) -> Result<Value, ValueError> {
        let converted = match (self, value) {
            (SignalType::Bool, Value::Bool(_)) => Some(value),
            (SignalType::Signed { .. }, Value::Signed(_)) => Some(value),
            (SignalType::Signed { .. }, Value::Unsigned(v)) => {
                i64::try_from(v).ok().map(Value::Signed)
            }
            (SignalType::Unsigned { .. }, Value::Unsigned(_)) => Some(value),
            (SignalType::Unsigned { .. }, Value::Signed(v)) => {
                u64::try_from(v).ok().map(Value::Unsigned)
            }
            (SignalType::Bool, _) | (_, Value::Bool(_)) => {
                return Err(ValueError::WrongKind {
                    expected: *self,
                    value,
                })
            }
        };
        match converted {
            Some(v) if self.admits(&v) => Ok(v),
            _ => Err(ValueError::OutOfRange { ty: *self, value }),
        }
    }

    /// Renders `value` as a binary string of exactly `self.width()` digits,
    /// two's complement for signed types.
    pub fn to_bits(&self, value: &Value) -> String {
        let width = self.width() as usize;
        let raw = match value {
            Value::Bool(b) => u64::from(*b),
            Value::Signed(v) => *v as u64,
            Value::Unsigned(v) => *v,
        };
        let masked = if width >= 64 {
            raw
        } else {
            raw & ((1u64 << width) - 1)
        };
        format!("{masked:0width$b}")
    }
}

fn check_width(width: u32) -> Result<u8, ValueError> {
    if (1..=64).contains(&width) {
        Ok(width as u8)
    } else {
        Err(ValueError::InvalidWidth(width))
    }
}

fn signed_fits(v: i64, width: u8) -> bool {
    if width == 0 {
        return false;
    }
    if width >= 64 {
        return true;
    }
    let bound = 1i64 << (width - 1);
    (-bound..bound).contains(&v)
}

fn unsigned_fits(v: u64, width: u8) -> bool {
    width != 0 && (width >= 64 || v < (1u64 << width))
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Bool => write!(f, "bool"),
            SignalType::Signed { width } => write!(f, "i{width}"),
            SignalType::Unsigned { width } => write!(f, "u{width}"),
        }
    }
}

impl FromStr for SignalType {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseTypeError {
            input: s.to_string(),
        };
        match s {
            "bool" => return Ok(SignalType::Bool),
            "int" => return Ok(SignalType::Signed { width: 32 }),
            "uint" => return Ok(SignalType::Unsigned { width: 32 }),
            _ => {}
        }
        let (signed, digits) = if let Some(d) = s.strip_prefix('i') {
            (true, d)
        } else if let Some(d) = s.strip_prefix('u') {
            (false, d)
        } else {
            return Err(err());
        };
        let width: u32 = digits.parse().map_err(|_| err())?;
        let ty = if signed {
            SignalType::signed(width)
        } else {
            SignalType::unsigned(width)
        };
        ty.map_err(|_| err())
    }
}

impl TryFrom<String> for SignalType {
    type Error = ParseTypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SignalType> for String {
    fn from(ty: SignalType) -> Self {
        ty.to_string()
    }
}

/// A committed or staged signal value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Signed(i64),
    /// Unsigned integer value.
    Unsigned(u64),
}

impl Value {
    /// Returns the boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `i64` if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Signed(v) => Some(*v),
            Value::Unsigned(v) => i64::try_from(*v).ok(),
            Value::Bool(_) => None,
        }
    }

    /// Returns the number as `u64` if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(v) => Some(*v),
            Value::Signed(v) => u64::try_from(*v).ok(),
            Value::Bool(_) => None,
        }
    }

    /// Stable byte encoding used when digesting committed state.
    pub fn digest_bytes(&self) -> [u8; 9] {
        let (tag, raw) = match self {
            Value::Bool(b) => (0u8, u64::from(*b)),
            Value::Signed(v) => (1u8, *v as u64),
            Value::Unsigned(v) => (2u8, *v),
        };
        let mut out = [0u8; 9];
        out[0] = tag;
        out[1..].copy_from_slice(&raw.to_le_bytes());
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! value_from_int {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

value_from_int!(Signed, i64, i8, i16, i32, i64);
value_from_int!(Unsigned, u64, u8, u16, u32, u64);
