//! Confbind - runtime configuration binding for contract-style settings.
//!
//! Given a [`ContractSpec`] describing named configuration accessors (target
//! types, lookup-key templates, defaults, split rules, fallback bodies) and
//! a [`ConfigSource`] backing raw string values, a [`ConfigFactory`] builds
//! a [`BoundConfig`]: a live, queryable object whose accessors resolve to
//! source values, declared defaults, or fallbacks, resolved once at build
//! time and immutable thereafter.
//!
//! ```
//! use confbind::{AccessorSpec, ConfigFactory, ContractSpec, TargetType, Value};
//!
//! let factory = ConfigFactory::with_properties([("app.greeting", "hello, world")]);
//! let contract = ContractSpec::new("AppConfig")
//!     .accessor(AccessorSpec::new("greeting", TargetType::Str).key("app.greeting"))
//!     .accessor(
//!         AccessorSpec::new("retries", TargetType::Int)
//!             .key("app.retries")
//!             .default_value("3"),
//!     );
//!
//! let config = factory.build(&contract).unwrap();
//! assert_eq!(config.value("greeting").unwrap(), Value::Str("hello, world".into()));
//! assert_eq!(config.value("retries").unwrap(), Value::Int(3));
//! ```

pub mod coerce;
pub mod contract;
pub mod factory;
pub mod planner;
pub mod source;
pub mod template;
pub mod value;

pub use coerce::{Coercer, Coercible};
pub use contract::{AccessorSpec, Binding, ContractSpec, REPLACEMENT_MAP};
pub use factory::{BoundConfig, ConfigFactory};
pub use planner::Outcome;
pub use source::{ChainedSource, ConfigSource, EnvSource, MapSource};
pub use value::{EnumSpec, SplitRule, TargetType, Value};

/// Library-level error type for binding operations.
///
/// Everything not call-time-dependent is raised during `build`, so a
/// binding that would fail can never be constructed; only parameterized
/// accessors can still fail at invocation time.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("accessor '{0}' declares both a literal default and a null default")]
    ConflictingDefaults(String),

    #[error("accessor '{0}' is source-bound but declares no lookup keys")]
    MissingKeyDeclaration(String),

    #[error("no value present for {keys} on accessor '{accessor}'")]
    MissingValue { accessor: String, keys: String },

    #[error("accessor '{0}' has no binding and no fallback body")]
    UnboundAbstractMethod(String),

    #[error("parameter mismatch on accessor '{accessor}': {detail}")]
    ParameterMismatch { accessor: String, detail: String },

    #[error("replacements are not supported for parameterized accessor '{0}'")]
    UnsupportedCombination(String),

    #[error("cannot coerce '{raw}' into {target}: {reason}")]
    Coercion {
        target: String,
        raw: String,
        reason: String,
    },

    #[error("unknown accessor '{0}'")]
    UnknownAccessor(String),
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, Error>;
