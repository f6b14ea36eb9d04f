//! Contract binding assembly.
//!
//! [`ConfigFactory`] drives the planner once per accessor and wires the
//! resulting outcomes into a [`BoundConfig`]: an immutable dispatch-table
//! object implementing the contract. Builds are all-or-nothing; the first
//! fatal error aborts with no instance observable.
//!
//! The factory memoizes the *shape* of a contract (its accessor dispatch
//! table) per contract name, so repeated builds of the same contract reuse
//! the wiring; a cached shape that no longer matches the contract being
//! built is discarded and rebuilt. Resolved values are always recomputed
//! per build and never shared between instances.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Serialize;

use crate::coerce::{Coercible, CoercerRegistry};
use crate::contract::ContractSpec;
use crate::planner::{self, Outcome, ResolvedAccessor};
use crate::source::{ConfigSource, MapSource};
use crate::value::Value;
use crate::{Error, Result};

/// Dispatch wiring for a contract: accessor name to outcome slot.
///
/// Never holds resolved values.
#[derive(Debug)]
struct ContractShape {
    slots: HashMap<String, usize>,
}

impl ContractShape {
    fn of(contract: &ContractSpec) -> Self {
        let mut slots = HashMap::with_capacity(contract.accessors().len());
        for (index, accessor) in contract.accessors().iter().enumerate() {
            slots.insert(accessor.name.clone(), index);
        }
        Self { slots }
    }

    /// Whether this wiring dispatches exactly the given contract's
    /// accessors, in the same slot order.
    fn matches(&self, contract: &ContractSpec) -> bool {
        self.slots.len() == contract.accessors().len()
            && contract
                .accessors()
                .iter()
                .enumerate()
                .all(|(index, accessor)| self.slots.get(&accessor.name) == Some(&index))
    }
}

/// Factory binding contracts against one configuration source.
///
/// Safe to share across threads: concurrent builds race safely to populate
/// the shape cache, and custom coercibles registered through
/// [`add_coercible`](ConfigFactory::add_coercible) affect subsequent builds
/// only.
pub struct ConfigFactory {
    source: Arc<dyn ConfigSource>,
    registry: Arc<CoercerRegistry>,
    shapes: Mutex<HashMap<String, Arc<ContractShape>>>,
}

impl ConfigFactory {
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            registry: Arc::new(CoercerRegistry::new()),
            shapes: Mutex::new(HashMap::new()),
        }
    }

    /// Convenience constructor over an in-memory key/value map.
    pub fn with_properties(
        properties: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self::new(properties.into_iter().collect::<MapSource>())
    }

    /// Register a custom coercible, effective for subsequent builds.
    pub fn add_coercible(&self, coercible: impl Coercible + 'static) {
        self.registry.add_coercible(coercible);
    }

    /// Build a bound instance of the contract.
    pub fn build(&self, contract: &ContractSpec) -> Result<BoundConfig> {
        self.internal_build(contract, None)
    }

    /// Build with a replacement map substituted into key templates.
    pub fn build_with_replacements(
        &self,
        contract: &ContractSpec,
        replacements: &BTreeMap<String, String>,
    ) -> Result<BoundConfig> {
        self.internal_build(contract, Some(replacements))
    }

    fn internal_build(
        &self,
        contract: &ContractSpec,
        replacements: Option<&BTreeMap<String, String>>,
    ) -> Result<BoundConfig> {
        let shape = self.shape(contract);
        let outcomes = contract
            .accessors()
            .iter()
            .map(|spec| planner::plan_accessor(spec, &self.source, &self.registry, replacements))
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundConfig {
            contract: contract.name().to_string(),
            shape,
            outcomes,
            dump: OnceLock::new(),
        })
    }

    /// Fetch or build the dispatch shape for a contract.
    ///
    /// The lock is held across shape construction, so concurrent builds of
    /// the same contract block on the first one; a partially built shape is
    /// never observable. A cached shape is reused only if it matches the
    /// contract being built, so distinct contracts sharing a name never
    /// dispatch through each other's wiring.
    fn shape(&self, contract: &ContractSpec) -> Arc<ContractShape> {
        let mut shapes = self.shapes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(shape) = shapes.get(contract.name()) {
            if shape.matches(contract) {
                return shape.clone();
            }
        }
        let shape = Arc::new(ContractShape::of(contract));
        shapes.insert(contract.name().to_string(), shape.clone());
        shape
    }
}

/// Diagnostic record for one accessor in a JSON dump.
#[derive(Debug, Serialize)]
struct ResolutionReport<'a> {
    accessor: &'a str,
    source: &'a str,
    value: serde_json::Value,
}

/// A bound, immutable instance of a contract.
///
/// Every accessor invocation routes through the outcome precomputed at
/// build time. Zero-argument accessors use [`value`](BoundConfig::value);
/// parameterized accessors use [`value_with`](BoundConfig::value_with).
pub struct BoundConfig {
    contract: String,
    shape: Arc<ContractShape>,
    outcomes: Vec<ResolvedAccessor>,
    dump: OnceLock<String>,
}

impl BoundConfig {
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Invoke a zero-argument accessor.
    pub fn value(&self, name: &str) -> Result<Value> {
        self.value_with(name, &[])
    }

    /// Invoke an accessor with call-time arguments.
    ///
    /// Non-parameterized accessors require an empty argument list.
    pub fn value_with(&self, name: &str, args: &[&str]) -> Result<Value> {
        let resolved = self.resolved(name)?;
        match &resolved.outcome {
            Outcome::Parameterized(resolver) => resolver.resolve(args),
            Outcome::Fixed(value) if args.is_empty() => Ok(value.clone()),
            Outcome::DeferToFallback(body) if args.is_empty() => Ok(body()),
            Outcome::Fixed(_) | Outcome::DeferToFallback(_) => Err(Error::ParameterMismatch {
                accessor: name.to_string(),
                detail: format!("expected 0 argument(s), got {}", args.len()),
            }),
        }
    }

    /// Where an accessor's value came from, for diagnostics.
    pub fn provenance(&self, name: &str) -> Result<&str> {
        Ok(&self.resolved(name)?.assigned_from)
    }

    /// JSON dump of every accessor's provenance and resolved value.
    ///
    /// Fallback and parameterized outcomes report a null value; their
    /// results only exist at invocation time.
    pub fn to_json(&self) -> serde_json::Value {
        let reports: Vec<ResolutionReport<'_>> = self
            .outcomes
            .iter()
            .map(|resolved| ResolutionReport {
                accessor: &resolved.name,
                source: &resolved.assigned_from,
                value: match &resolved.outcome {
                    Outcome::Fixed(value) => value.to_json(),
                    Outcome::DeferToFallback(_) | Outcome::Parameterized(_) => {
                        serde_json::Value::Null
                    }
                },
            })
            .collect();
        serde_json::to_value(&reports).unwrap_or(serde_json::Value::Null)
    }

    fn resolved(&self, name: &str) -> Result<&ResolvedAccessor> {
        self.shape
            .slots
            .get(name)
            .and_then(|&index| self.outcomes.get(index))
            .ok_or_else(|| Error::UnknownAccessor(name.to_string()))
    }
}

/// Newline-joined provenance dump of every outcome, computed lazily once
/// per instance and cached for its lifetime.
impl fmt::Display for BoundConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dump = self.dump.get_or_init(|| {
            self.outcomes
                .iter()
                .map(ResolvedAccessor::provenance_line)
                .collect::<Vec<_>>()
                .join("\n")
        });
        f.write_str(dump)
    }
}

impl fmt::Debug for BoundConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundConfig")
            .field("contract", &self.contract)
            .field("outcomes", &self.outcomes)
            .finish_non_exhaustive()
    }
}
