//! Field declarations: declared type, typed value, default and validators.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Declared type of a section field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `true` / `false`
    Bool,
    /// Signed integer; floating-point input is rejected
    Int,
    /// Floating-point; integer input is widened
    Float,
    /// UTF-8 string
    Str,
    /// Any JSON value, kept as-is
    Json,
}

impl FieldType {
    /// Human-readable name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Str => "string",
            Self::Json => "any",
        }
    }

    /// Whether an extension may redeclare a field of type `self` as `narrowed`.
    ///
    /// Every value accepted by `narrowed` must also be accepted by `self`.
    pub fn admits_narrowing_to(self, narrowed: FieldType) -> bool {
        self == narrowed
            || matches!((self, narrowed), (Self::Float, Self::Int) | (Self::Json, _))
    }

    /// Convert a raw JSON value to this type. `None` means a type mismatch.
    pub fn coerce(self, raw: &Value) -> Option<FieldValue> {
        match self {
            Self::Bool => raw.as_bool().map(FieldValue::Bool),
            Self::Int => raw.as_i64().map(FieldValue::Int),
            Self::Float => raw.as_f64().map(FieldValue::Float),
            Self::Str => raw.as_str().map(|s| FieldValue::Str(s.to_string())),
            Self::Json => Some(FieldValue::Json(raw.clone())),
        }
    }

    /// Whether an already-typed value belongs to this type.
    pub fn holds(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Self::Bool, FieldValue::Bool(_))
                | (Self::Int, FieldValue::Int(_))
                | (Self::Float, FieldValue::Float(_))
                | (Self::Str, FieldValue::Str(_))
                | (Self::Json, _)
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed field value after parsing and defaulting.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Json(Value),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert back to an untyped JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(x) => Value::from(*x),
            Self::Str(s) => Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }

    /// Re-type a default declared for a wider type, e.g. `Float(2.0)` for an `Int` field.
    pub(crate) fn retype(&self, ty: FieldType) -> Option<FieldValue> {
        if ty.holds(self) {
            return Some(self.clone());
        }
        match (self, ty) {
            (Self::Float(x), FieldType::Int)
                if x.fract() == 0.0 && *x >= i64::MIN as f64 && *x <= i64::MAX as f64 =>
            {
                Some(Self::Int(*x as i64))
            }
            _ => ty.coerce(&self.to_json()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Json(v) => v.serialize(serializer),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Describe a raw input value for type-mismatch diagnostics.
pub(crate) fn describe_raw(raw: &Value) -> String {
    let kind = match raw {
        Value::Null => return "null".to_string(),
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    };
    format!("{kind} {raw}")
}

type Predicate = dyn Fn(&FieldValue) -> Result<(), String> + Send + Sync;

/// A named predicate over a parsed field value.
///
/// On failure the predicate returns the reason shown to the user.
#[derive(Clone)]
pub struct Validator {
    name: String,
    check: Arc<Predicate>,
}

impl Validator {
    /// Create a validator from a name and a predicate.
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&FieldValue) -> Result<(), String> + Send + Sync + 'static,
    {
        Self { name: name.into(), check: Arc::new(check) }
    }

    /// Numeric value must be strictly positive and finite.
    pub fn positive() -> Self {
        Self::new("positive", |v| match v.as_f64() {
            Some(x) if x.is_finite() && x > 0.0 => Ok(()),
            _ => Err("must be > 0".to_string()),
        })
    }

    /// Numeric value must be zero or greater.
    pub fn non_negative() -> Self {
        Self::new("non_negative", |v| match v.as_f64() {
            Some(x) if x >= 0.0 => Ok(()),
            _ => Err("must be >= 0".to_string()),
        })
    }

    /// Numeric value must be at least `min`.
    pub fn at_least(min: f64) -> Self {
        Self::new(format!("at_least({min})"), move |v| match v.as_f64() {
            Some(x) if x >= min => Ok(()),
            _ => Err(format!("must be >= {min}")),
        })
    }

    /// Numeric value must be at most `max`.
    pub fn at_most(max: f64) -> Self {
        Self::new(format!("at_most({max})"), move |v| match v.as_f64() {
            Some(x) if x <= max => Ok(()),
            _ => Err(format!("must be <= {max}")),
        })
    }

    /// String value must be one of `allowed`.
    pub fn one_of(allowed: &[&str]) -> Self {
        let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
        Self::new(format!("one_of({})", allowed.join(", ")), move |v| match v.as_str() {
            Some(s) if allowed.iter().any(|a| a == s) => Ok(()),
            _ => Err(format!("must be one of: {}", allowed.join(", "))),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the predicate.
    pub fn check(&self, value: &FieldValue) -> Result<(), String> {
        (self.check)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Validator").field(&self.name).finish()
    }
}

/// Alternative input key for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub deprecated: bool,
}

/// Declaration of one field in a section schema.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) default: Option<FieldValue>,
    pub(crate) required: bool,
    pub(crate) validators: Vec<Validator>,
    pub(crate) aliases: Vec<Alias>,
    pub(crate) doc: Option<String>,
}

impl FieldSpec {
    /// Declare a field of the given type with no default.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            required: false,
            validators: Vec::new(),
            aliases: Vec::new(),
            doc: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Str)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Json)
    }

    /// Set the default used when the field is not supplied.
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Require the field to be supplied in the raw input.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Append a validator.
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Accept `name` as an alternative input key.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.aliases.push(Alias { name: name.into(), deprecated: false });
        self
    }

    /// Accept `name` as an alternative input key and warn when it is used.
    pub fn deprecated_alias(mut self, name: impl Into<String>) -> Self {
        self.aliases.push(Alias { name: name.into(), deprecated: true });
        self
    }

    /// Attach a one-line description.
    pub fn doc(mut self, text: impl Into<String>) -> Self {
        self.doc = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    pub fn default(&self) -> Option<&FieldValue> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn description(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Run every validator in declaration order; the first failure wins.
    pub(crate) fn check(&self, value: &FieldValue) -> Result<(), String> {
        self.validators.iter().try_for_each(|v| v.check(value))
    }
}
