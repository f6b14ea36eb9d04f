//! Key-template expansion.
//!
//! Lookup keys may contain `${name}` placeholders. Whole-accessor remapping
//! expands them from a caller-supplied replacement map at build time;
//! parameterized accessors expand them from call arguments at invocation
//! time. Expansion iterates the replacement map in its sorted key order, so
//! the same mapping always produces the same concrete key.
//!
//! A placeholder with no matching replacement is left literal. For
//! whole-accessor remapping that simply makes the source lookup miss; it is
//! not an error here.

use std::collections::BTreeMap;

/// Render a placeholder token for a replacement or parameter name.
pub fn token(name: &str) -> String {
    format!("${{{}}}", name)
}

/// Expand every `${key}` occurrence in `template` from the replacement map.
pub fn expand(template: &str, replacements: &BTreeMap<String, String>) -> String {
    let mut key = template.to_string();
    for (name, value) in replacements {
        key = key.replace(&token(name), value);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacements(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_token() {
        assert_eq!(token("env"), "${env}");
    }

    #[test]
    fn test_expand_single_placeholder() {
        let map = replacements(&[("env", "prod")]);
        assert_eq!(expand("service.${env}.url", &map), "service.prod.url");
    }

    #[test]
    fn test_expand_multiple_placeholders() {
        let map = replacements(&[("env", "prod"), ("region", "eu")]);
        assert_eq!(
            expand("service.${env}.${region}.url", &map),
            "service.prod.eu.url"
        );
    }

    #[test]
    fn test_expand_repeated_placeholder() {
        let map = replacements(&[("x", "a")]);
        assert_eq!(expand("${x}.${x}", &map), "a.a");
    }

    #[test]
    fn test_unmatched_placeholder_left_literal() {
        let map = replacements(&[("env", "prod")]);
        assert_eq!(expand("service.${other}.url", &map), "service.${other}.url");
    }

    #[test]
    fn test_expand_is_deterministic() {
        let map = replacements(&[("b", "2"), ("a", "1"), ("c", "3")]);
        let first = expand("${a}-${b}-${c}", &map);
        for _ in 0..10 {
            assert_eq!(expand("${a}-${b}-${c}", &map), first);
        }
        assert_eq!(first, "1-2-3");
    }
}
