//! Variable resolution
//!
//! Finds every `${...}` expression in a string property, resolves each
//! against the document's variable table, applies the recorded function
//! chain, and substitutes the result back into the string. Resolution is
//! lazy (it runs when a property is read, not at load time) and memoized
//! in a path-keyed cache so repeated reads of the same slot are cheap.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::document::Document;
use crate::error::Result;
use crate::interpolation;
use crate::value::Value;

/// Resolves interpolation expressions in property values.
///
/// The cache maps a full tree path (e.g. `aws_instance.foo.value`) to its
/// resolved string. The configuration tree itself is never mutated, so a
/// resolver and its document can be shared freely across selections.
#[derive(Debug, Default)]
pub struct VariableResolver {
    cache: RwLock<HashMap<String, CachedResolution>>,
}

/// One memoized resolution. The raw input is kept because repeated resource
/// declarations share a tree path while holding distinct raw values; a hit
/// only counts when the raw text matches.
#[derive(Debug, Clone)]
struct CachedResolution {
    raw: String,
    resolved: String,
}

impl VariableResolver {
    /// Create a resolver with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one property value read at `path`.
    ///
    /// Non-string values and strings without expressions pass through
    /// unchanged; with expansion disabled this is a no-op. Resolution fails
    /// fast on the first undeclared variable or unimplemented function.
    pub fn resolve(
        &self,
        path: &str,
        raw: &Value,
        document: &Document,
        expand: bool,
    ) -> Result<Value> {
        if !expand {
            return Ok(raw.clone());
        }
        let Some(input) = raw.as_str() else {
            return Ok(raw.clone());
        };
        if !interpolation::contains_expression(input) {
            return Ok(raw.clone());
        }

        if let Some(resolved) = self.cached(path, input) {
            log::trace!("resolution cache hit for {}", path);
            return Ok(Value::String(resolved));
        }

        let resolved = self.resolve_string(input, document)?;
        self.cache
            .write()
            .expect("resolver cache lock poisoned")
            .insert(
                path.to_string(),
                CachedResolution {
                    raw: input.to_string(),
                    resolved: resolved.clone(),
                },
            );
        Ok(Value::String(resolved))
    }

    /// Number of memoized property slots
    pub fn cached_count(&self) -> usize {
        self.cache
            .read()
            .expect("resolver cache lock poisoned")
            .len()
    }

    fn cached(&self, path: &str, raw: &str) -> Option<String> {
        self.cache
            .read()
            .expect("resolver cache lock poisoned")
            .get(path)
            .filter(|entry| entry.raw == raw)
            .map(|entry| entry.resolved.clone())
    }

    /// Resolve and substitute every expression in one string, left to right
    fn resolve_string(&self, input: &str, document: &Document) -> Result<String> {
        let mut output = input.to_string();
        for expression in interpolation::find_expressions(input) {
            let parsed = interpolation::parse(interpolation::inner(expression))?;

            let Some(default) = document.variable_default(&parsed.variable)? else {
                // Declared without a default: the expression stays in place
                continue;
            };

            let mut substituted = default.to_string();
            for function in &parsed.functions {
                substituted = function.apply(&substituted);
            }
            log::trace!("substituting {} -> {}", expression, substituted);
            output = output.replacen(expression, &substituted, 1);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn document() -> Document {
        Document::from_hcl(
            r#"
            variable "bar" {
                default = 1
            }
            variable "name" {
                default = "MiXeD"
            }
            variable "empty" {}
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_plain_substitution() {
        let resolver = VariableResolver::new();
        let raw = Value::String("${var.bar}".into());
        let resolved = resolver.resolve("a.b.value", &raw, &document(), true).unwrap();
        assert_eq!(resolved, Value::String("1".into()));
    }

    #[test]
    fn test_substitution_inside_larger_string() {
        let resolver = VariableResolver::new();
        let raw = Value::String("${var.bar}${var.bar} and ${var.name}".into());
        let resolved = resolver.resolve("a.b.value", &raw, &document(), true).unwrap();
        assert_eq!(resolved, Value::String("11 and MiXeD".into()));
    }

    #[test]
    fn test_function_chain_applies_in_recorded_order() {
        // Textual order: lower first, then upper. The innermost function
        // textually is applied last, so upper wins here.
        let resolver = VariableResolver::new();
        let raw = Value::String("${lower(upper(var.name))}".into());
        let resolved = resolver.resolve("a.b.value", &raw, &document(), true).unwrap();
        assert_eq!(resolved, Value::String("MIXED".into()));
    }

    #[test]
    fn test_single_function() {
        let resolver = VariableResolver::new();
        let raw = Value::String("${upper(var.name)}".into());
        let resolved = resolver.resolve("a.b.value", &raw, &document(), true).unwrap();
        assert_eq!(resolved, Value::String("MIXED".into()));
    }

    #[test]
    fn test_undeclared_variable_fails_fast() {
        let resolver = VariableResolver::new();
        let raw = Value::String("${var.nope}".into());
        let err = resolver
            .resolve("a.b.value", &raw, &document(), true)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndeclaredVariable { name: "nope".into() });
    }

    #[test]
    fn test_unimplemented_function_fails_fast() {
        let resolver = VariableResolver::new();
        let raw = Value::String("${base64encode(var.bar)}".into());
        let err = resolver
            .resolve("a.b.value", &raw, &document(), true)
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::UnimplementedInterpolation { .. }
        ));
    }

    #[test]
    fn test_declared_without_default_stays_in_place() {
        let resolver = VariableResolver::new();
        let raw = Value::String("${var.empty}".into());
        let resolved = resolver.resolve("a.b.value", &raw, &document(), true).unwrap();
        assert_eq!(resolved, Value::String("${var.empty}".into()));
    }

    #[test]
    fn test_disabled_expansion_is_a_no_op() {
        let resolver = VariableResolver::new();
        let raw = Value::String("${var.bar}".into());
        let resolved = resolver
            .resolve("a.b.value", &raw, &document(), false)
            .unwrap();
        assert_eq!(resolved, raw);
        assert_eq!(resolver.cached_count(), 0);
    }

    #[test]
    fn test_non_strings_pass_through() {
        let resolver = VariableResolver::new();
        let raw = Value::Integer(7);
        let resolved = resolver.resolve("a.b.value", &raw, &document(), true).unwrap();
        assert_eq!(resolved, Value::Integer(7));
    }

    #[test]
    fn test_same_path_with_different_raw_text_is_not_a_stale_hit() {
        // Repeated resource declarations share a tree path; the cache must
        // not serve one instance's resolution for the other's raw value.
        let resolver = VariableResolver::new();
        let doc = document();

        let first = resolver
            .resolve("a.b.value", &Value::String("${var.bar}".into()), &doc, true)
            .unwrap();
        let second = resolver
            .resolve("a.b.value", &Value::String("${var.name}".into()), &doc, true)
            .unwrap();

        assert_eq!(first, Value::String("1".into()));
        assert_eq!(second, Value::String("MiXeD".into()));
    }

    #[test]
    fn test_resolution_is_memoized_per_path() {
        let resolver = VariableResolver::new();
        let doc = document();
        let raw = Value::String("${var.bar}".into());

        let first = resolver.resolve("a.b.value", &raw, &doc, true).unwrap();
        let second = resolver.resolve("a.b.value", &raw, &doc, true).unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.cached_count(), 1);
    }
}
