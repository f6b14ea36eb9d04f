//! Configuration-value sources.
//!
//! A [`ConfigSource`] is a plain key-to-string lookup. Absence must be
//! reported as `None`; an empty string is a present value and is never
//! conflated with "not found".

use std::collections::HashMap;
use std::sync::Arc;

/// Key-to-string lookup backing configuration values.
pub trait ConfigSource: Send + Sync {
    /// Fetch the raw string stored under `key`, or `None` if absent.
    fn get_string(&self, key: &str) -> Option<String>;
}

/// In-memory source backed by a static key/value map.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapSource {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl From<HashMap<String, String>> for MapSource {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Source backed by process environment variables.
///
/// Keys are looked up literally, with an optional fixed prefix prepended
/// (e.g. prefix `APP_` turns key `PORT` into variable `APP_PORT`). Unset
/// and non-unicode variables report as absent.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: Option<String>,
}

impl EnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl ConfigSource for EnvSource {
    fn get_string(&self, key: &str) -> Option<String> {
        let name = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        };
        std::env::var(name).ok()
    }
}

/// Ordered chain of sources; the first source holding the key wins.
#[derive(Clone, Default)]
pub struct ChainedSource {
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl ChainedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source at the end of the chain (lowest precedence so far).
    pub fn then(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }
}

impl ConfigSource for ChainedSource {
    fn get_string(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|s| s.get_string(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_source_lookup() {
        let source = MapSource::new().with("foo", "bar");
        assert_eq!(source.get_string("foo").as_deref(), Some("bar"));
        assert_eq!(source.get_string("missing"), None);
    }

    #[test]
    fn test_map_source_empty_string_is_present() {
        let source = MapSource::new().with("blank", "");
        assert_eq!(source.get_string("blank").as_deref(), Some(""));
    }

    #[test]
    fn test_map_source_from_iterator() {
        let source: MapSource = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(source.get_string("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_chained_source_first_wins() {
        let chain = ChainedSource::new()
            .then(MapSource::new().with("key", "first"))
            .then(MapSource::new().with("key", "second").with("other", "x"));
        assert_eq!(chain.get_string("key").as_deref(), Some("first"));
        assert_eq!(chain.get_string("other").as_deref(), Some("x"));
        assert_eq!(chain.get_string("missing"), None);
    }

    #[test]
    fn test_chained_source_empty_string_shadows_later_sources() {
        let chain = ChainedSource::new()
            .then(MapSource::new().with("key", ""))
            .then(MapSource::new().with("key", "fallback"));
        // Empty string is a value, not absence, so it wins the chain.
        assert_eq!(chain.get_string("key").as_deref(), Some(""));
    }
}
