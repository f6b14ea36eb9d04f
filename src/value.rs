//! Dynamic values and target-type descriptors.
//!
//! Resolution produces [`Value`]s: a closed dynamic representation of every
//! type an accessor may declare. [`TargetType`] is the matching descriptor
//! that tells the coercion engine what to produce from a raw string. The
//! [`Opaque`](Value::Opaque) variant is the escape hatch for user types with
//! custom parsing rules, paired with [`TargetType::Custom`] and a registered
//! coercible.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Trait object bound for opaque values produced by custom coercibles.
///
/// Any `'static` type that is `Debug + Send + Sync` qualifies via the
/// blanket impl; downcast with [`Value::opaque_as`].
pub trait OpaqueValue: Any + fmt::Debug + Send + Sync {
    /// Upcast for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> OpaqueValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A resolved configuration value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absence accepted as a value (null-default accessors).
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Time span, parsed from forms like `250ms`, `10s`, `5m`, `2h`, `1d`.
    Duration(Duration),
    /// Point in time, parsed from RFC 3339 text.
    DateTime(DateTime<Utc>),
    /// An enumerator name matched against the declared variant set.
    Enum(String),
    /// Ordered sequence produced by split-rule coercion.
    List(Vec<Value>),
    /// Immutable key/value snapshot (the replacement-map binding).
    Map(BTreeMap<String, String>),
    /// Value produced by a custom coercible for an opaque target.
    Opaque(Arc<dyn OpaqueValue>),
}

impl Value {
    /// Wrap a concrete value as an opaque one.
    pub fn opaque<T: OpaqueValue>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Downcast an opaque value to its concrete type.
    pub fn opaque_as<T: OpaqueValue>(&self) -> Option<&T> {
        match self {
            // Deref to the trait object before calling as_any, otherwise
            // the blanket impl resolves on the Arc itself and the returned
            // Any is the Arc, not the inner value.
            Value::Opaque(v) => (**v).as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Render as JSON for diagnostic dumps.
    ///
    /// Opaque values render as their debug text; durations as integer
    /// milliseconds; date/times as RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Str(s) => json!(s),
            Value::Duration(d) => json!(d.as_millis() as u64),
            Value::DateTime(dt) => json!(dt.to_rfc3339()),
            Value::Enum(v) => json!(v),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => json!(map),
            Value::Opaque(v) => json!(format!("{:?}", v)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            // Opaque values have no structural equality; identity only.
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Canonical textual form of a value.
///
/// Re-coercing the canonical form against the original target type yields an
/// equal value for every builtin scalar target.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Duration(d) => write!(f, "{}ms", d.as_millis()),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Enum(v) => write!(f, "{}", v),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Map(map) => {
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                Ok(())
            }
            Value::Opaque(v) => write!(f, "{:?}", v),
        }
    }
}

/// Declared variant set for an enumerated target type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct EnumSpec {
    /// Type name, used in diagnostics only.
    pub name: String,
    /// Enumerator names, matched case-sensitively.
    pub variants: Vec<String>,
}

impl EnumSpec {
    pub fn new(name: impl Into<String>, variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

/// Semantic type descriptor for an accessor's return value.
///
/// The descriptor drives coercer selection; see the `coerce` module for the
/// selection order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TargetType {
    Bool,
    Int,
    Float,
    Str,
    Duration,
    DateTime,
    Enum(EnumSpec),
    /// Collection of an element type, produced via a split rule.
    List(Box<TargetType>),
    /// Opaque type handled only by a registered custom coercible.
    Custom(String),
}

impl TargetType {
    /// Convenience constructor for enumerated targets.
    pub fn enumeration(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        TargetType::Enum(EnumSpec::new(name, variants))
    }

    /// Convenience constructor for list targets.
    pub fn list(inner: TargetType) -> Self {
        TargetType::List(Box::new(inner))
    }

    /// Human-readable name for error messages.
    pub fn describe(&self) -> String {
        match self {
            TargetType::Bool => "bool".to_string(),
            TargetType::Int => "int".to_string(),
            TargetType::Float => "float".to_string(),
            TargetType::Str => "string".to_string(),
            TargetType::Duration => "duration".to_string(),
            TargetType::DateTime => "datetime".to_string(),
            TargetType::Enum(spec) => format!("enum {}", spec.name),
            TargetType::List(inner) => format!("list<{}>", inner.describe()),
            TargetType::Custom(name) => format!("custom {}", name),
        }
    }
}

/// Delimiter specification for coercing a delimited string into a list.
///
/// Elements are trimmed of surrounding ASCII whitespace after splitting, so
/// `"a, b, c"` with the default delimiter yields `["a", "b", "c"]`. An empty
/// raw string yields an empty list, never a single empty element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRule {
    pub delimiter: String,
}

impl SplitRule {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    /// Split and trim a raw string into element slices.
    pub fn split<'a>(&self, raw: &'a str) -> Vec<&'a str> {
        if raw.is_empty() {
            return Vec::new();
        }
        raw.split(self.delimiter.as_str()).map(str::trim).collect()
    }
}

impl Default for SplitRule {
    fn default() -> Self {
        Self::new(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_canonical_forms() {
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-42).to_string(), "-42");
        assert_eq!(Value::Str("hello".into()).to_string(), "hello");
        assert_eq!(Value::Enum("RED".into()).to_string(), "RED");
        assert_eq!(
            Value::Duration(Duration::from_secs(10)).to_string(),
            "10000ms"
        );
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "1,2"
        );
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_split_rule_trims_elements() {
        let rule = SplitRule::default();
        assert_eq!(rule.split("a, b , c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_rule_empty_input_is_empty_list() {
        let rule = SplitRule::default();
        assert!(rule.split("").is_empty());
    }

    #[test]
    fn test_split_rule_custom_delimiter() {
        let rule = SplitRule::new(";");
        assert_eq!(rule.split("x;y"), vec!["x", "y"]);
        // The default delimiter is not special-cased.
        assert_eq!(rule.split("x,y"), vec!["x,y"]);
    }

    #[test]
    fn test_target_describe() {
        assert_eq!(TargetType::list(TargetType::Int).describe(), "list<int>");
        assert_eq!(
            TargetType::enumeration("Color", ["RED", "BLUE"]).describe(),
            "enum Color"
        );
    }

    #[test]
    fn test_opaque_downcast() {
        #[derive(Debug, PartialEq)]
        struct Endpoint(String);

        let value = Value::opaque(Endpoint("db:5432".into()));
        assert_eq!(
            value.opaque_as::<Endpoint>(),
            Some(&Endpoint("db:5432".into()))
        );
        assert!(value.opaque_as::<String>().is_none());
    }

    #[test]
    fn test_to_json() {
        let value = Value::List(vec![Value::Int(1), Value::Str("x".into()), Value::Null]);
        assert_eq!(value.to_json(), serde_json::json!([1, "x", null]));
    }
}
