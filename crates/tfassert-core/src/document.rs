//! Parsed configuration documents
//!
//! A [`Document`] owns the configuration tree: a root mapping whose
//! top-level sections of interest are `"resource"` (type → name → property
//! mapping) and `"variable"` (name → declaration). The tree is built once
//! from the HCL parser's output and never mutated afterwards; resolved
//! interpolations live in the resolver's cache, not in the tree.
//!
//! The configuration grammar itself is the parser's concern: this module
//! converts `hcl::Body` into the engine's [`Value`] shape and passes parse
//! failures through as syntax errors carrying the offending file path.

use indexmap::map::Entry;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::value::Value;

/// A parsed configuration document
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
}

impl Document {
    /// Create a document directly from an in-memory value tree
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse a document from an HCL string
    pub fn from_hcl(input: &str) -> Result<Self> {
        let mut root = IndexMap::new();
        add_source(&mut root, input, "<string>")?;
        Ok(Self {
            root: Value::Mapping(root),
        })
    }

    /// Parse a document from a JSON string (useful for in-memory test trees)
    pub fn from_json(input: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(input)
            .map_err(|e| Error::syntax("<json>", e.to_string()))?;
        Ok(Self { root })
    }

    /// Load every `*.tf` file under a directory (recursively) into one document.
    ///
    /// Files load in sorted path order; a file that fails to parse aborts the
    /// load with a syntax error naming that file.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self> {
        let mut files = Vec::new();
        collect_tf_files(path.as_ref(), &mut files)?;
        files.sort();

        let mut root = IndexMap::new();
        for file in &files {
            log::debug!("loading {}", file.display());
            let contents = std::fs::read_to_string(file)
                .map_err(|e| Error::io(file.display().to_string(), e.to_string()))?;
            add_source(&mut root, &contents, &file.display().to_string())?;
        }
        Ok(Self {
            root: Value::Mapping(root),
        })
    }

    /// The root value of the document
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// A top-level section (e.g. "resource", "variable") as a mapping
    pub fn section(&self, name: &str) -> Option<&IndexMap<String, Value>> {
        self.root.as_mapping()?.get(name)?.as_mapping()
    }

    /// The declared resource type names, in declaration order
    pub fn resource_type_names(&self) -> Vec<&str> {
        match self.section("resource") {
            Some(types) => types.keys().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    /// The resource instances declared under one type, in declaration order.
    ///
    /// A (type, name) pair declared more than once yields one instance per
    /// declaration; an unknown type yields an empty list.
    pub fn resources_of_type(&self, type_name: &str) -> Vec<(&str, &Value)> {
        let mut out = Vec::new();
        if let Some(types) = self.section("resource") {
            if let Some(by_name) = types.get(type_name).and_then(Value::as_mapping) {
                for (name, declared) in by_name {
                    for body in declared.as_blocks() {
                        out.push((name.as_str(), body));
                    }
                }
            }
        }
        out
    }

    /// The default value of a declared variable.
    ///
    /// Fails if the variable section is absent or the name is not declared;
    /// a variable declared without a default is `Ok(None)`, not a failure.
    pub fn variable_default(&self, name: &str) -> Result<Option<&Value>> {
        let declared = self
            .section("variable")
            .and_then(|variables| variables.get(name))
            .ok_or_else(|| Error::undeclared_variable(name))?;

        let default = declared
            .as_blocks()
            .first()
            .and_then(|block| block.as_mapping())
            .and_then(|mapping| mapping.get("default"));
        Ok(default)
    }
}

/// Parse one HCL source and merge its structures into the root mapping
fn add_source(root: &mut IndexMap<String, Value>, input: &str, origin: &str) -> Result<()> {
    let body = hcl::parse(input).map_err(|e| Error::syntax(origin, e.to_string()))?;
    add_body(root, body)
}

/// Fold an `hcl::Body` into a mapping, in structure order
fn add_body(map: &mut IndexMap<String, Value>, body: hcl::Body) -> Result<()> {
    for structure in body {
        match structure {
            hcl::Structure::Attribute(attr) => {
                let value = expression_to_value(attr.expr)?;
                // Repeated attribute keys: last writer wins
                map.insert(attr.key.to_string(), value);
            }
            hcl::Structure::Block(block) => {
                let mut body_map = IndexMap::new();
                add_body(&mut body_map, block.body)?;

                let labels: Vec<String> = block
                    .labels
                    .iter()
                    .map(|label| label.as_str().to_string())
                    .collect();
                insert_block(
                    map,
                    block.identifier.to_string(),
                    labels,
                    Value::Mapping(body_map),
                )?;
            }
        }
    }
    Ok(())
}

/// Nest a block body under its identifier + label chain.
///
/// Intermediate segments merge into existing mappings; a repeated full block
/// path appends to a list of bodies, which is the shape the navigator's
/// block normalization exists for.
fn insert_block(
    map: &mut IndexMap<String, Value>,
    identifier: String,
    labels: Vec<String>,
    body: Value,
) -> Result<()> {
    let mut segments = vec![identifier];
    segments.extend(labels);
    let (last, intermediate) = segments
        .split_last()
        .expect("segments always contains the identifier");

    let mut current = map;
    for segment in intermediate {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Mapping(IndexMap::new()));
        current = match slot {
            Value::Mapping(m) => m,
            other => {
                return Err(Error::unsupported_expression(format!(
                    "block path segment '{}' collides with a {} value",
                    segment,
                    other.type_name()
                )))
            }
        };
    }

    match current.entry(last.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(body);
        }
        Entry::Occupied(mut slot) => {
            let existing = slot.get_mut();
            match existing {
                Value::Sequence(bodies) => bodies.push(body),
                _ => {
                    let first = std::mem::take(existing);
                    *existing = Value::Sequence(vec![first, body]);
                }
            }
        }
    }
    Ok(())
}

/// Convert one parsed expression into a configuration value.
///
/// Template strings keep their raw text (interpolations resolve lazily at
/// property-read time); expression forms the engine does not evaluate fail
/// loudly here rather than silently carrying an unevaluated shape.
fn expression_to_value(expr: hcl::Expression) -> Result<Value> {
    use hcl::Expression;

    match expr {
        Expression::Null => Ok(Value::Null),
        Expression::Bool(b) => Ok(Value::Bool(b)),
        Expression::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Value::Integer(i)),
            (None, Some(f)) => Ok(Value::Float(f)),
            (None, None) => Err(Error::unsupported_expression("out-of-range number")),
        },
        Expression::String(s) => Ok(Value::String(s)),
        Expression::TemplateExpr(template) => Ok(Value::String(match *template {
            hcl::TemplateExpr::QuotedString(s) => s,
            hcl::TemplateExpr::Heredoc(heredoc) => heredoc.template,
        })),
        Expression::Array(items) => items
            .into_iter()
            .map(expression_to_value)
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Expression::Object(object) => {
            let mut map = IndexMap::new();
            for (key, value) in object {
                map.insert(key.to_string(), expression_to_value(value)?);
            }
            Ok(Value::Mapping(map))
        }
        Expression::Parenthesis(inner) => expression_to_value(*inner),
        other => Err(Error::unsupported_expression(describe_expression(&other))),
    }
}

fn describe_expression(expr: &hcl::Expression) -> &'static str {
    use hcl::Expression;

    match expr {
        Expression::Variable(_) => "bare variable reference (quote it as \"${var.name}\")",
        Expression::Traversal(_) => "resource-attribute traversal",
        Expression::FuncCall(_) => "bare function call",
        Expression::Conditional(_) => "conditional expression",
        Expression::Operation(_) => "arithmetic or logical operation",
        Expression::ForExpr(_) => "for expression",
        _ => "unevaluated expression",
    }
}

fn collect_tf_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::io(dir.display().to_string(), e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir.display().to_string(), e.to_string()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_tf_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "tf") {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_blocks_nest_under_type_and_name() {
        let doc = Document::from_hcl(
            r#"
            resource "aws_instance" "foo" {
                value = 1
            }
            resource "aws_instance" "bar" {
                value = 2
            }
            "#,
        )
        .unwrap();

        let resources = doc.resources_of_type("aws_instance");
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].0, "foo");
        assert_eq!(resources[1].0, "bar");

        let foo = resources[0].1.as_mapping().unwrap();
        assert_eq!(foo.get("value"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_unknown_resource_type_is_empty() {
        let doc = Document::from_hcl(r#"resource "aws_instance" "foo" { value = 1 }"#).unwrap();
        assert!(doc.resources_of_type("aws_elb").is_empty());
    }

    #[test]
    fn test_template_strings_keep_raw_text() {
        let doc = Document::from_hcl(
            r#"
            resource "aws_instance" "foo" {
                value = "${var.bar}"
            }
            "#,
        )
        .unwrap();

        let resources = doc.resources_of_type("aws_instance");
        let body = resources[0].1.as_mapping().unwrap();
        assert_eq!(body.get("value"), Some(&Value::String("${var.bar}".into())));
    }

    #[test]
    fn test_repeated_nested_block_becomes_a_list() {
        let doc = Document::from_hcl(
            r#"
            resource "aws_security_group" "sg" {
                ingress {
                    port = 80
                }
                ingress {
                    port = 443
                }
            }
            "#,
        )
        .unwrap();

        let resources = doc.resources_of_type("aws_security_group");
        let body = resources[0].1.as_mapping().unwrap();
        let ingress = body.get("ingress").unwrap();
        assert!(ingress.is_sequence());
        assert_eq!(ingress.as_blocks().len(), 2);
    }

    #[test]
    fn test_single_nested_block_stays_a_mapping() {
        let doc = Document::from_hcl(
            r#"
            resource "aws_instance" "foo" {
                tags {
                    env = "dev"
                }
            }
            "#,
        )
        .unwrap();

        let resources = doc.resources_of_type("aws_instance");
        let body = resources[0].1.as_mapping().unwrap();
        assert!(body.get("tags").unwrap().is_mapping());
    }

    #[test]
    fn test_variable_defaults() {
        let doc = Document::from_hcl(
            r#"
            variable "bar" {
                default = 1
            }
            variable "no_default" {}
            "#,
        )
        .unwrap();

        assert_eq!(doc.variable_default("bar").unwrap(), Some(&Value::Integer(1)));
        assert_eq!(doc.variable_default("no_default").unwrap(), None);

        let err = doc.variable_default("missing").unwrap_err();
        assert_eq!(
            err.kind,
            crate::error::ErrorKind::UndeclaredVariable {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn test_missing_variable_section_is_undeclared() {
        let doc = Document::from_hcl(r#"resource "aws_instance" "foo" { value = 1 }"#).unwrap();
        assert!(doc.variable_default("bar").is_err());
    }

    #[test]
    fn test_syntax_error_is_a_typed_failure() {
        let err = Document::from_hcl("resource \"aws_instance\" {{{").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Syntax);
    }

    #[test]
    fn test_bare_traversal_fails_loudly() {
        let err = Document::from_hcl(
            r#"
            resource "aws_instance" "foo" {
                value = aws_vpc.main.id
            }
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ErrorKind::UnsupportedExpression { .. }
        ));
    }

    #[test]
    fn test_from_json_document() {
        let doc = Document::from_json(
            r#"{"resource": {"aws_instance": {"foo": {"value": 1}}}}"#,
        )
        .unwrap();
        assert_eq!(doc.resources_of_type("aws_instance").len(), 1);
    }

    #[test]
    fn test_load_dir_merges_files_and_recurses() {
        let dir = std::env::temp_dir().join(format!("tfassert-doc-test-{}", std::process::id()));
        let sub = dir.join("modules");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(
            dir.join("main.tf"),
            r#"resource "aws_instance" "foo" { value = 1 }"#,
        )
        .unwrap();
        std::fs::write(sub.join("extra.tf"), r#"variable "bar" { default = 2 }"#).unwrap();
        std::fs::write(dir.join("ignored.txt"), "not terraform").unwrap();

        let doc = Document::load_dir(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(doc.resources_of_type("aws_instance").len(), 1);
        assert_eq!(doc.variable_default("bar").unwrap(), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_load_dir_syntax_error_names_the_file() {
        let dir = std::env::temp_dir().join(format!("tfassert-syn-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.tf"), "resource \"x\" {{{").unwrap();

        let err = Document::load_dir(&dir).unwrap_err();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(err.kind, crate::error::ErrorKind::Syntax);
        assert!(err.path.as_deref().unwrap().contains("broken.tf"));
    }
}
