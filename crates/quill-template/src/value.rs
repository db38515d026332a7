//! Runtime values read and written by compiled templates.
//!
//! Conversions follow JavaScript rules (truthiness, `ToString`,
//! `ToNumber`, `==` / `===`) because template expressions are written in
//! that dialect.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use quill_engine::Event;

use crate::data::DataContext;

/// Insertion-ordered field map used for objects and the data context.
pub type Map = IndexMap<String, Value>;

// ── Handler ───────────────────────────────────────────────────────────────

/// An event handler stored in the data context and bound with `t-on-*`.
///
/// The handler receives the data context it was rendered with as receiver.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&DataContext, &Event)>);

impl Handler {
    pub fn new(f: impl Fn(&DataContext, &Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn call(&self, receiver: &DataContext, event: &Event) {
        (self.0)(receiver, event)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// ── Value ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
    Function(Handler),
}

impl Value {
    /// Wrap a closure as a [`Value::Function`].
    pub fn function(f: impl Fn(&DataContext, &Event) + 'static) -> Self {
        Value::Function(Handler::new(f))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// `true` for the number zero (either sign).
    pub fn is_zero(&self) -> bool {
        matches!(self, Value::Number(n) if *n == 0.0)
    }

    /// Emission test used by `t-esc` / `t-raw`: truthy, or the number zero.
    pub fn is_present(&self) -> bool {
        self.is_truthy() || self.is_zero()
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// JavaScript `ToNumber`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => single.to_number(),
                _ => f64::NAN,
            },
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// `==`
    pub fn loose_eq(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number(_), String(_)) | (String(_), Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Bool(_), _) => Number(self.to_number()).loose_eq(other),
            (_, Bool(_)) => self.loose_eq(&Number(other.to_number())),
            (Array(_) | Object(_), Number(_) | String(_)) => {
                String(self.to_string()).loose_eq(other)
            }
            (Number(_) | String(_), Array(_) | Object(_)) => {
                self.loose_eq(&String(other.to_string()))
            }
            _ => self.strict_eq(other),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// JavaScript `ToString`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !matches!(item, Value::Undefined | Value::Null) {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(_) => f.write_str("function"),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if !(1e-6..1e21).contains(&n.abs()) {
        // Exponent form always carries a sign: 1e+21, 1.5e-7.
        let sci = format!("{n:e}");
        match sci.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => sci,
        }
    } else if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    // Rust accepts "inf" / "nan" spellings that JavaScript rejects.
    if s.bytes().any(|b| b.is_ascii_alphabetic() && !matches!(b, b'e' | b'E')) {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Value::Function(h)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}
