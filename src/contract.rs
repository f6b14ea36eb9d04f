//! Contract and accessor declarations.
//!
//! A [`ContractSpec`] is the normalized description of a configuration
//! contract: one [`AccessorSpec`] per operation, carrying the declared
//! target type, lookup-key templates, defaults, split rule, and optional
//! fallback body. Producing these declarations (from derive macros, code
//! generation, or by hand) is the caller's concern; the factory only
//! consumes them.
//!
//! Accessor names must be unique within a contract; if a name is declared
//! twice, the later declaration wins at dispatch time.

use std::fmt;
use std::sync::Arc;

use crate::value::{SplitRule, TargetType, Value};

/// Reserved replacement-binding key that resolves to the entire replacement
/// map as an immutable snapshot.
pub const REPLACEMENT_MAP: &str = "*";

/// Last-resort value producer for accessors with a callable body.
pub type Fallback = Arc<dyn Fn() -> Value + Send + Sync>;

/// How an accessor obtains its raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Ordered key templates looked up through the configuration source.
    Source { keys: Vec<String> },
    /// Single key looked up directly in the build-time replacement map.
    /// The reserved key [`REPLACEMENT_MAP`] yields the whole map.
    Replacement { key: String },
}

/// Declaration for one contract accessor.
#[derive(Clone)]
pub struct AccessorSpec {
    pub name: String,
    pub target: TargetType,
    pub binding: Option<Binding>,
    /// Placeholder names bound to call-time arguments, in declaration order.
    pub params: Vec<String>,
    /// Literal default used when no source value is found.
    pub default: Option<String>,
    /// When set, absence itself is a valid outcome (null).
    pub default_null: bool,
    pub split: Option<SplitRule>,
    pub fallback: Option<Fallback>,
}

impl AccessorSpec {
    pub fn new(name: impl Into<String>, target: TargetType) -> Self {
        Self {
            name: name.into(),
            target,
            binding: None,
            params: Vec::new(),
            default: None,
            default_null: false,
            split: None,
            fallback: None,
        }
    }

    /// Append a lookup-key template (source binding).
    pub fn key(mut self, key: impl Into<String>) -> Self {
        match &mut self.binding {
            Some(Binding::Source { keys }) => keys.push(key.into()),
            _ => {
                self.binding = Some(Binding::Source {
                    keys: vec![key.into()],
                });
            }
        }
        self
    }

    /// Append several lookup-key templates in order.
    pub fn keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for key in keys {
            self = self.key(key);
        }
        self
    }

    /// Bind to a single key of the build-time replacement map.
    pub fn replacement_key(mut self, key: impl Into<String>) -> Self {
        self.binding = Some(Binding::Replacement { key: key.into() });
        self
    }

    /// Bind to the entire replacement map (immutable snapshot).
    pub fn replacement_map(self) -> Self {
        self.replacement_key(REPLACEMENT_MAP)
    }

    /// Declare a call-time parameter placeholder.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    /// Declare the literal default used when every key misses.
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// Declare that absence is itself a valid (null) outcome.
    pub fn null_default(mut self) -> Self {
        self.default_null = true;
        self
    }

    /// Declare the delimiter used to split a raw value into a list.
    pub fn split_on(mut self, delimiter: impl Into<String>) -> Self {
        self.split = Some(SplitRule::new(delimiter));
        self
    }

    /// Attach a callable fallback body, used only when every key misses and
    /// no default is declared.
    pub fn fallback(mut self, body: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.fallback = Some(Arc::new(body));
        self
    }
}

impl fmt::Debug for AccessorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorSpec")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("binding", &self.binding)
            .field("params", &self.params)
            .field("default", &self.default)
            .field("default_null", &self.default_null)
            .field("split", &self.split)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Named configuration contract: an ordered set of accessor declarations.
#[derive(Debug, Clone)]
pub struct ContractSpec {
    name: String,
    accessors: Vec<AccessorSpec>,
}

impl ContractSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accessors: Vec::new(),
        }
    }

    /// Append an accessor declaration.
    pub fn accessor(mut self, spec: AccessorSpec) -> Self {
        self.accessors.push(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessors(&self) -> &[AccessorSpec] {
        &self.accessors
    }
}
