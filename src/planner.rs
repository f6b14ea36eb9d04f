//! Per-accessor resolution planning.
//!
//! For every accessor the planner applies the precedence algorithm and
//! produces one immutable [`Outcome`]:
//!
//! - `Fixed`: the value was resolved (from a source key, the replacement
//!   map, a declared default, or a null default) and coerced at build time;
//! - `DeferToFallback`: nothing resolved, the accessor's callable body is
//!   invoked on access;
//! - `Parameterized`: keys contain call-time placeholders; lookup and
//!   coercion happen per invocation, with a default coerced eagerly at
//!   build time so a bad default literal fails the build, not the first
//!   call.
//!
//! Key precedence is strict: the first template yielding a present string
//! wins, and an empty string counts as present. Each outcome carries a
//! provenance string used only for diagnostics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::coerce::CoercerRegistry;
use crate::contract::{AccessorSpec, Binding, Fallback, REPLACEMENT_MAP};
use crate::source::ConfigSource;
use crate::template;
use crate::value::{SplitRule, TargetType, Value};
use crate::{Error, Result};

/// The precomputed decision for one accessor.
pub enum Outcome {
    /// A value resolved and coerced at build time.
    Fixed(Value),
    /// Invoke the accessor's callable body on access.
    DeferToFallback(Fallback),
    /// Resolve per call from substituted key templates.
    Parameterized(ParamResolver),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Outcome::DeferToFallback(_) => f.write_str("DeferToFallback"),
            Outcome::Parameterized(resolver) => {
                f.debug_tuple("Parameterized").field(resolver).finish()
            }
        }
    }
}

/// One accessor's resolution result, with diagnostic provenance.
#[derive(Debug)]
pub struct ResolvedAccessor {
    pub name: String,
    pub outcome: Outcome,
    /// Human-readable origin, e.g. `property: 'foo.bar'`.
    pub assigned_from: String,
}

impl ResolvedAccessor {
    /// One line of the bound instance's diagnostic dump.
    pub fn provenance_line(&self) -> String {
        match &self.outcome {
            Outcome::Fixed(Value::Null) => {
                format!("{}(): {}, <null>", self.name, self.assigned_from)
            }
            Outcome::Fixed(value) => {
                format!("{}(): {}, {}", self.name, self.assigned_from, value)
            }
            Outcome::DeferToFallback(_) | Outcome::Parameterized(_) => {
                format!("{}(): {}", self.name, self.assigned_from)
            }
        }
    }
}

/// Call-time resolver for parameterized accessors.
pub struct ParamResolver {
    accessor: String,
    keys: Vec<String>,
    /// `${name}` tokens, one per declared parameter, in declaration order.
    tokens: Vec<String>,
    target: TargetType,
    split: Option<SplitRule>,
    default: Value,
    source: Arc<dyn ConfigSource>,
    registry: Arc<CoercerRegistry>,
}

impl ParamResolver {
    /// Resolve against call-time arguments.
    ///
    /// Substitutes each parameter token with its argument in every key
    /// template, in declared order; the first concrete key with a present
    /// value wins and is coerced. If every template misses, the precomputed
    /// default is returned.
    pub fn resolve(&self, args: &[&str]) -> Result<Value> {
        if args.len() != self.tokens.len() {
            return Err(Error::ParameterMismatch {
                accessor: self.accessor.clone(),
                detail: format!(
                    "expected {} argument(s), got {}",
                    self.tokens.len(),
                    args.len()
                ),
            });
        }
        for key in &self.keys {
            let mut concrete = key.clone();
            for (token, arg) in self.tokens.iter().zip(args) {
                concrete = concrete.replace(token, arg);
            }
            if let Some(raw) = self.source.get_string(&concrete) {
                debug!(
                    accessor = %self.accessor,
                    key = %concrete,
                    value = %raw,
                    "assigning parameterized value"
                );
                return self.registry.coerce(&self.target, &raw, self.split.as_ref());
            }
        }
        debug!(accessor = %self.accessor, "assigning parameterized default");
        Ok(self.default.clone())
    }
}

impl fmt::Debug for ParamResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamResolver")
            .field("accessor", &self.accessor)
            .field("keys", &self.keys)
            .field("tokens", &self.tokens)
            .field("target", &self.target)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/// Apply the precedence algorithm to one accessor declaration.
pub(crate) fn plan_accessor(
    spec: &AccessorSpec,
    source: &Arc<dyn ConfigSource>,
    registry: &Arc<CoercerRegistry>,
    replacements: Option<&BTreeMap<String, String>>,
) -> Result<ResolvedAccessor> {
    // Two no-value strategies never coexist, independent of source state.
    if spec.default.is_some() && spec.default_null {
        return Err(Error::ConflictingDefaults(spec.name.clone()));
    }

    if !spec.params.is_empty() {
        return plan_parameterized(spec, source, registry, replacements);
    }

    let (raw, assigned_from) = match &spec.binding {
        Some(Binding::Source { keys }) => {
            if keys.is_empty() {
                return Err(Error::MissingKeyDeclaration(spec.name.clone()));
            }
            lookup_first(&spec.name, keys, source, replacements)
        }
        Some(Binding::Replacement { key }) if key == REPLACEMENT_MAP => {
            // Reserved key: the outcome is the whole replacement map as an
            // immutable snapshot.
            let snapshot = replacements.cloned().unwrap_or_default();
            return Ok(ResolvedAccessor {
                name: spec.name.clone(),
                outcome: Outcome::Fixed(Value::Map(snapshot)),
                assigned_from: "replacement map".to_string(),
            });
        }
        Some(Binding::Replacement { key }) => {
            let value = replacements.and_then(|map| map.get(key).cloned());
            if value.is_some() {
                debug!(accessor = %spec.name, key = %key, "assigning replacement value");
            }
            (value, format!("replacement: '{}'", key))
        }
        None => {
            // No binding at all: only a callable body can implement this.
            return match &spec.fallback {
                Some(body) => Ok(ResolvedAccessor {
                    name: spec.name.clone(),
                    outcome: Outcome::DeferToFallback(body.clone()),
                    assigned_from: format!("fallback: '{}()'", spec.name),
                }),
                None => Err(Error::UnboundAbstractMethod(spec.name.clone())),
            };
        }
    };

    let (outcome, assigned_from) = match raw {
        Some(raw) => {
            let value = registry.coerce(&spec.target, &raw, spec.split.as_ref())?;
            (Outcome::Fixed(value), assigned_from)
        }
        None if spec.default.is_some() => {
            let literal = spec.default.as_deref().unwrap_or_default();
            debug!(accessor = %spec.name, value = %literal, "assigning declared default");
            let value = registry.coerce(&spec.target, literal, spec.split.as_ref())?;
            (Outcome::Fixed(value), "declared default".to_string())
        }
        None if spec.default_null => {
            debug!(accessor = %spec.name, "assigning null default");
            (Outcome::Fixed(Value::Null), "null default".to_string())
        }
        None => match &spec.fallback {
            Some(body) => {
                debug!(accessor = %spec.name, "deferring to fallback body");
                (
                    Outcome::DeferToFallback(body.clone()),
                    format!("fallback: '{}()'", spec.name),
                )
            }
            None => {
                return Err(Error::MissingValue {
                    accessor: spec.name.clone(),
                    keys: pretty_keys(spec, replacements),
                });
            }
        },
    };

    Ok(ResolvedAccessor {
        name: spec.name.clone(),
        outcome,
        assigned_from,
    })
}

/// First key template yielding a present string wins; no merging across
/// keys. Returns the winning raw value and its provenance.
fn lookup_first(
    accessor: &str,
    keys: &[String],
    source: &Arc<dyn ConfigSource>,
    replacements: Option<&BTreeMap<String, String>>,
) -> (Option<String>, String) {
    for key in keys {
        let concrete = match replacements {
            Some(map) => template::expand(key, map),
            None => key.clone(),
        };
        if let Some(raw) = source.get_string(&concrete) {
            debug!(accessor = %accessor, key = %concrete, value = %raw, "assigning value");
            return (Some(raw), format!("property: '{}'", concrete));
        }
    }
    (None, String::new())
}

fn plan_parameterized(
    spec: &AccessorSpec,
    source: &Arc<dyn ConfigSource>,
    registry: &Arc<CoercerRegistry>,
    replacements: Option<&BTreeMap<String, String>>,
) -> Result<ResolvedAccessor> {
    if replacements.is_some() {
        return Err(Error::UnsupportedCombination(spec.name.clone()));
    }
    let keys = match &spec.binding {
        Some(Binding::Source { keys }) if !keys.is_empty() => keys.clone(),
        Some(Binding::Source { .. }) | None => {
            return Err(Error::MissingKeyDeclaration(spec.name.clone()));
        }
        Some(Binding::Replacement { .. }) => {
            return Err(Error::UnsupportedCombination(spec.name.clone()));
        }
    };

    // Every declared parameter must appear as a placeholder somewhere.
    let tokens: Vec<String> = spec.params.iter().map(|p| template::token(p)).collect();
    for (param, token) in spec.params.iter().zip(&tokens) {
        if !keys.iter().any(|key| key.contains(token)) {
            return Err(Error::ParameterMismatch {
                accessor: spec.name.clone(),
                detail: format!("parameter '{}' never appears in a key template", param),
            });
        }
    }

    // The default is coerced eagerly so a bad literal fails the build.
    let default = if let Some(literal) = &spec.default {
        registry.coerce(&spec.target, literal, spec.split.as_ref())?
    } else if spec.default_null {
        Value::Null
    } else {
        return Err(Error::MissingValue {
            accessor: spec.name.clone(),
            keys: pretty_keys(spec, None),
        });
    };

    let assigned_from = format!("parameterized lookup: [{}]", keys.join(", "));
    Ok(ResolvedAccessor {
        name: spec.name.clone(),
        outcome: Outcome::Parameterized(ParamResolver {
            accessor: spec.name.clone(),
            keys,
            tokens,
            target: spec.target.clone(),
            split: spec.split.clone(),
            default,
            source: source.clone(),
            registry: registry.clone(),
        }),
        assigned_from,
    })
}

fn pretty_keys(spec: &AccessorSpec, replacements: Option<&BTreeMap<String, String>>) -> String {
    let keys = match &spec.binding {
        Some(Binding::Source { keys }) => keys.as_slice(),
        Some(Binding::Replacement { key }) => std::slice::from_ref(key),
        None => &[],
    };
    let declared = format!("[{}]", keys.join(", "));
    match replacements {
        Some(map) if !map.is_empty() => {
            let expanded: Vec<String> = keys.iter().map(|k| template::expand(k, map)).collect();
            format!("{} translated to [{}]", declared, expanded.join(", "))
        }
        _ => declared,
    }
}
