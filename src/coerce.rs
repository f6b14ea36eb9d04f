//! String-to-value coercion.
//!
//! The engine turns a raw source string into the [`Value`] matching an
//! accessor's declared [`TargetType`]. Selection of the converter is a
//! design contract, not an implementation detail:
//!
//! 1. a custom coercible registered for the exact target is consulted
//!    first, in registration order;
//! 2. otherwise the builtin chain is walked in fixed order:
//!    primitives and booleans, enumerations, canonical-parse types
//!    (durations), then date/times built through an intermediate parsed
//!    representation.
//!
//! List targets split the raw string first (per the accessor's split rule,
//! defaulting to `,`) and coerce each element, unless a custom coercible
//! claims the whole list target.
//!
//! Malformed input surfaces as [`Error::Coercion`] wrapping the original
//! parse failure; it is never retried or swallowed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::value::{SplitRule, TargetType, Value};
use crate::{Error, Result};

/// A conversion function chosen for one target type.
pub type Coercer = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// A family of conversions: asked whether it handles a target type, and if
/// so, hands back the coercer for it.
pub trait Coercible: Send + Sync {
    fn accept(&self, target: &TargetType) -> Option<Coercer>;
}

fn coercion_error(target: &TargetType, raw: &str, reason: impl Into<String>) -> Error {
    Error::Coercion {
        target: target.describe(),
        raw: raw.to_string(),
        reason: reason.into(),
    }
}

/// Booleans, integers, floats, and plain strings.
///
/// Booleans accept `true`/`false`/`yes`/`no`, case-insensitively. Integers
/// and floats use decimal textual parses.
struct PrimitiveCoercible;

impl Coercible for PrimitiveCoercible {
    fn accept(&self, target: &TargetType) -> Option<Coercer> {
        match target {
            TargetType::Bool => Some(Arc::new(|raw| match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Value::Bool(true)),
                "false" | "no" => Ok(Value::Bool(false)),
                _ => Err(coercion_error(
                    &TargetType::Bool,
                    raw,
                    "expected true/false/yes/no",
                )),
            })),
            TargetType::Int => Some(Arc::new(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| coercion_error(&TargetType::Int, raw, e.to_string()))
            })),
            TargetType::Float => Some(Arc::new(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|e| coercion_error(&TargetType::Float, raw, e.to_string()))
            })),
            TargetType::Str => Some(Arc::new(|raw| Ok(Value::Str(raw.to_string())))),
            _ => None,
        }
    }
}

/// Enumerated targets: the raw string must exactly match a declared
/// variant name (case-sensitive).
struct EnumCoercible;

impl Coercible for EnumCoercible {
    fn accept(&self, target: &TargetType) -> Option<Coercer> {
        let TargetType::Enum(spec) = target else {
            return None;
        };
        let spec = spec.clone();
        Some(Arc::new(move |raw| {
            if spec.variants.iter().any(|v| v == raw) {
                Ok(Value::Enum(raw.to_string()))
            } else {
                Err(coercion_error(
                    &TargetType::Enum(spec.clone()),
                    raw,
                    format!("expected one of [{}]", spec.variants.join(", ")),
                ))
            }
        }))
    }
}

/// Types with a canonical textual parse: time spans.
///
/// Accepted forms: a bare integer (milliseconds) or an integer with one of
/// the unit suffixes `ms`, `s`, `m`, `h`, `d`.
struct ParseCoercible;

fn parse_time_span(raw: &str) -> std::result::Result<Duration, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("empty time span".to_string());
    }
    if let Ok(millis) = text.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    let unit_start = text
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| format!("malformed time span '{}'", text))?;
    let (number, unit) = text.split_at(unit_start);
    let count = number
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("malformed time span '{}': {}", text, e))?;
    let millis_per_unit: u64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return Err(format!("unknown time unit '{}'", unit)),
    };
    count
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("time span '{}' overflows", text))
}

impl Coercible for ParseCoercible {
    fn accept(&self, target: &TargetType) -> Option<Coercer> {
        match target {
            TargetType::Duration => Some(Arc::new(|raw| {
                parse_time_span(raw)
                    .map(Value::Duration)
                    .map_err(|reason| coercion_error(&TargetType::Duration, raw, reason))
            })),
            _ => None,
        }
    }
}

/// Date/times, built through an intermediate parsed representation: the
/// raw string parses as RFC 3339 with its own offset, then normalizes to
/// UTC for the final value.
struct DateTimeCoercible;

impl Coercible for DateTimeCoercible {
    fn accept(&self, target: &TargetType) -> Option<Coercer> {
        match target {
            TargetType::DateTime => Some(Arc::new(|raw| {
                DateTime::parse_from_rfc3339(raw.trim())
                    .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|e| coercion_error(&TargetType::DateTime, raw, e.to_string()))
            })),
            _ => None,
        }
    }
}

/// Converter registry: the builtin chain plus custom registrations.
///
/// Shared by every build of a factory; safe for concurrent use. The chosen
/// coercer per target is memoized, and the memo is dropped whenever a
/// custom coercible is registered so later builds observe it.
pub struct CoercerRegistry {
    builtins: Vec<Arc<dyn Coercible>>,
    custom: RwLock<Vec<Arc<dyn Coercible>>>,
    cache: Mutex<HashMap<TargetType, Coercer>>,
}

impl CoercerRegistry {
    pub fn new() -> Self {
        Self {
            builtins: vec![
                Arc::new(PrimitiveCoercible),
                Arc::new(EnumCoercible),
                Arc::new(ParseCoercible),
                Arc::new(DateTimeCoercible),
            ],
            custom: RwLock::new(Vec::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Register a custom coercible, consulted before the builtins for any
    /// target it accepts. Effective for subsequent coercions only.
    pub fn add_coercible(&self, coercible: impl Coercible + 'static) {
        self.custom
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(coercible));
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Convert a raw string into the declared target type.
    ///
    /// For list targets the raw string is split first (`split`, or the
    /// default comma rule) and elements are coerced individually, unless a
    /// custom coercible claims the list target as a whole.
    pub fn coerce(&self, target: &TargetType, raw: &str, split: Option<&SplitRule>) -> Result<Value> {
        if let TargetType::List(inner) = target {
            if let Some(whole) = self.custom_coercer(target) {
                return whole(raw);
            }
            let default_rule = SplitRule::default();
            let rule = split.unwrap_or(&default_rule);
            let items = rule
                .split(raw)
                .into_iter()
                .map(|part| self.coerce_single(inner, part))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Value::List(items));
        }
        self.coerce_single(target, raw)
    }

    fn coerce_single(&self, target: &TargetType, raw: &str) -> Result<Value> {
        match self.coercer_for(target) {
            Some(coercer) => coercer(raw),
            None => Err(coercion_error(
                target,
                raw,
                "no registered coercer accepts this target type",
            )),
        }
    }

    fn custom_coercer(&self, target: &TargetType) -> Option<Coercer> {
        self.custom
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find_map(|c| c.accept(target))
    }

    fn coercer_for(&self, target: &TargetType) -> Option<Coercer> {
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
        {
            return Some(hit.clone());
        }
        let found = self
            .custom_coercer(target)
            .or_else(|| self.builtins.iter().find_map(|c| c.accept(target)));
        if let Some(coercer) = &found {
            self.cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(target.clone(), coercer.clone());
        }
        found
    }
}

impl Default for CoercerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EnumSpec;

    fn registry() -> CoercerRegistry {
        CoercerRegistry::new()
    }

    // ==================== Primitive Tests ====================

    #[test]
    fn test_coerce_bool_forms() {
        let r = registry();
        for raw in ["true", "TRUE", "yes", "Yes"] {
            assert_eq!(r.coerce(&TargetType::Bool, raw, None).unwrap(), Value::Bool(true));
        }
        for raw in ["false", "no", "NO"] {
            assert_eq!(r.coerce(&TargetType::Bool, raw, None).unwrap(), Value::Bool(false));
        }
        assert!(r.coerce(&TargetType::Bool, "on", None).is_err());
    }

    #[test]
    fn test_coerce_int() {
        let r = registry();
        assert_eq!(
            r.coerce(&TargetType::Int, "4815162342", None).unwrap(),
            Value::Int(4_815_162_342)
        );
        assert_eq!(r.coerce(&TargetType::Int, "-7", None).unwrap(), Value::Int(-7));
    }

    #[test]
    fn test_coerce_int_malformed() {
        let err = registry().coerce(&TargetType::Int, "ten", None).unwrap_err();
        assert!(matches!(err, Error::Coercion { .. }));
        assert!(err.to_string().contains("ten"));
    }

    #[test]
    fn test_coerce_float_and_str() {
        let r = registry();
        assert_eq!(
            r.coerce(&TargetType::Float, "2.5", None).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            r.coerce(&TargetType::Str, "hello, world", None).unwrap(),
            Value::Str("hello, world".into())
        );
    }

    #[test]
    fn test_coerce_empty_string_to_str_is_valid() {
        // Empty string is a present value: fine for strings, an error for
        // numeric targets.
        let r = registry();
        assert_eq!(r.coerce(&TargetType::Str, "", None).unwrap(), Value::Str(String::new()));
        assert!(r.coerce(&TargetType::Int, "", None).is_err());
    }

    // ==================== Enum Tests ====================

    #[test]
    fn test_coerce_enum_exact_match() {
        let target = TargetType::Enum(EnumSpec::new("Color", ["RED", "BLUE"]));
        let r = registry();
        assert_eq!(
            r.coerce(&target, "RED", None).unwrap(),
            Value::Enum("RED".into())
        );
    }

    #[test]
    fn test_coerce_enum_is_case_sensitive() {
        let target = TargetType::Enum(EnumSpec::new("Color", ["RED", "BLUE"]));
        let err = registry().coerce(&target, "red", None).unwrap_err();
        assert!(err.to_string().contains("RED"));
    }

    // ==================== Time Tests ====================

    #[test]
    fn test_coerce_duration_forms() {
        let r = registry();
        let cases = [
            ("250", Duration::from_millis(250)),
            ("250ms", Duration::from_millis(250)),
            ("10s", Duration::from_secs(10)),
            ("5m", Duration::from_secs(300)),
            ("2h", Duration::from_secs(7200)),
            ("1d", Duration::from_secs(86_400)),
        ];
        for (raw, expected) in cases {
            assert_eq!(
                r.coerce(&TargetType::Duration, raw, None).unwrap(),
                Value::Duration(expected),
                "raw: {}",
                raw
            );
        }
    }

    #[test]
    fn test_coerce_duration_rejects_unknown_unit() {
        assert!(registry().coerce(&TargetType::Duration, "10w", None).is_err());
    }

    #[test]
    fn test_coerce_duration_rejects_overflowing_span() {
        let err = registry()
            .coerce(&TargetType::Duration, "9999999999999999d", None)
            .unwrap_err();
        assert!(matches!(err, Error::Coercion { .. }));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_coerce_datetime_normalizes_to_utc() {
        let value = registry()
            .coerce(&TargetType::DateTime, "2010-11-22T01:58:00+02:00", None)
            .unwrap();
        let dt = value.as_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "2010-11-21T23:58:00+00:00");
    }

    // ==================== List Tests ====================

    #[test]
    fn test_coerce_list_elementwise() {
        let target = TargetType::list(TargetType::Int);
        let rule = SplitRule::default();
        assert_eq!(
            registry().coerce(&target, "1, 2, 3", Some(&rule)).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_coerce_list_without_rule_uses_default_delimiter() {
        let target = TargetType::list(TargetType::Str);
        assert_eq!(
            registry().coerce(&target, "a,b", None).unwrap(),
            Value::List(vec![Value::Str("a".into()), Value::Str("b".into())])
        );
    }

    #[test]
    fn test_coerce_list_element_failure_propagates() {
        let target = TargetType::list(TargetType::Int);
        assert!(registry().coerce(&target, "1,x,3", None).is_err());
    }

    #[test]
    fn test_coerce_empty_list() {
        let target = TargetType::list(TargetType::Int);
        assert_eq!(
            registry().coerce(&target, "", None).unwrap(),
            Value::List(Vec::new())
        );
    }

    // ==================== Custom Coercible Tests ====================

    struct UppercaseCoercible;

    impl Coercible for UppercaseCoercible {
        fn accept(&self, target: &TargetType) -> Option<Coercer> {
            match target {
                TargetType::Custom(name) if name == "Shout" => {
                    Some(Arc::new(|raw| Ok(Value::Str(raw.to_ascii_uppercase()))))
                }
                _ => None,
            }
        }
    }

    #[test]
    fn test_custom_coercible_handles_opaque_target() {
        let r = registry();
        let target = TargetType::Custom("Shout".into());
        assert!(r.coerce(&target, "hi", None).is_err());

        r.add_coercible(UppercaseCoercible);
        assert_eq!(
            r.coerce(&target, "hi", None).unwrap(),
            Value::Str("HI".into())
        );
    }

    struct HexIntCoercible;

    impl Coercible for HexIntCoercible {
        fn accept(&self, target: &TargetType) -> Option<Coercer> {
            match target {
                TargetType::Int => Some(Arc::new(|raw| {
                    i64::from_str_radix(raw.trim_start_matches("0x"), 16)
                        .map(Value::Int)
                        .map_err(|e| Error::Coercion {
                            target: "int".into(),
                            raw: raw.into(),
                            reason: e.to_string(),
                        })
                })),
                _ => None,
            }
        }
    }

    #[test]
    fn test_custom_coercible_overrides_builtin_for_exact_target() {
        let r = registry();
        // Prime the memo with the builtin, then register an override.
        assert_eq!(r.coerce(&TargetType::Int, "10", None).unwrap(), Value::Int(10));
        r.add_coercible(HexIntCoercible);
        assert_eq!(r.coerce(&TargetType::Int, "0x10", None).unwrap(), Value::Int(16));
    }
}
