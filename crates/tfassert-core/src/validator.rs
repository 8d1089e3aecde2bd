//! The fluent assertion surface
//!
//! A [`Validator`] binds a parsed [`Document`] to a resolver and a pair of
//! evaluation modes. Selections ([`ResourceSet`]) and navigations
//! ([`PropertySet`]) are cheap immutable views; every chain step returns a
//! new set, so intermediate sets can be stored and branched safely.
//!
//! Terminal operations share one contract: evaluate every element of the
//! set, collect all violations, sort them, and raise one aggregated failure.
//! A selection that matches nothing passes trivially. Structural failures
//! (undeclared variable, unimplemented interpolation function, syntax
//! errors) abort the call immediately instead of joining the violations.

use regex::Regex;
use std::path::Path;

use crate::document::Document;
use crate::error::{Error, Result, Violations};
use crate::resolver::VariableResolver;
use crate::value::Value;

/// Evaluation modes, read by every selection, navigation, and terminal.
///
/// These are plain data threaded by reference into each call; toggling a
/// mode affects chains started afterwards, never a set already in hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Resolve `${...}` interpolations when reading property values
    pub variable_expand: bool,
    /// Treat a missing property during navigation as a violation instead of
    /// silently eliding the element
    pub raise_error_if_property_missing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            variable_expand: true,
            raise_error_if_property_missing: false,
        }
    }
}

/// The assertion entry point, bound to one parsed document
#[derive(Debug)]
pub struct Validator {
    document: Document,
    resolver: VariableResolver,
    settings: Settings,
}

impl Validator {
    /// Create a validator over an already-parsed document
    pub fn new(document: Document) -> Self {
        Self {
            document,
            resolver: VariableResolver::new(),
            settings: Settings::default(),
        }
    }

    /// Parse an HCL string and bind a validator to it
    pub fn from_hcl(input: &str) -> Result<Self> {
        Ok(Self::new(Document::from_hcl(input)?))
    }

    /// Parse a JSON string and bind a validator to it (in-memory test trees)
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(Self::new(Document::from_json(input)?))
    }

    /// Bind a validator directly to an in-memory value tree
    pub fn from_value(root: Value) -> Self {
        Self::new(Document::from_value(root))
    }

    /// Load every `*.tf` file under a directory and bind a validator to it
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Document::load_dir(path)?))
    }

    /// Resolve `${...}` interpolations when reading property values (default)
    pub fn enable_variable_expansion(&mut self) {
        self.settings.variable_expand = true;
    }

    /// Leave property values unresolved; assertions see the raw strings
    pub fn disable_variable_expansion(&mut self) {
        self.settings.variable_expand = false;
    }

    /// Fail navigation when a named property is missing from an element
    pub fn error_if_property_missing(&mut self) {
        self.settings.raise_error_if_property_missing = true;
    }

    /// Silently elide elements that lack a navigated property (default)
    pub fn allow_missing_properties(&mut self) {
        self.settings.raise_error_if_property_missing = false;
    }

    /// The current evaluation modes
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// The bound document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Select every resource of one declared type
    pub fn resources(&self, type_name: &str) -> ResourceSet<'_> {
        self.resources_of_types(&[type_name])
    }

    /// Select the union of resources under several declared types,
    /// preserving type-then-declaration order
    pub fn resources_of_types(&self, type_names: &[&str]) -> ResourceSet<'_> {
        let mut resources = Vec::new();
        for type_name in type_names {
            for (name, body) in self.document.resources_of_type(type_name) {
                resources.push(ResourceEntry {
                    rtype: type_name.to_string(),
                    name: name.to_string(),
                    body,
                });
            }
        }
        ResourceSet {
            validator: self,
            resources,
        }
    }

    /// Select resources of every declared type whose name matches the
    /// anchored pattern
    pub fn resources_matching(&self, pattern: &str) -> Result<ResourceSet<'_>> {
        let regex = anchored(pattern)?;
        let mut resources = Vec::new();
        for type_name in self.document.resource_type_names() {
            if !regex.is_match(type_name) {
                continue;
            }
            for (name, body) in self.document.resources_of_type(type_name) {
                resources.push(ResourceEntry {
                    rtype: type_name.to_string(),
                    name: name.to_string(),
                    body,
                });
            }
        }
        Ok(ResourceSet {
            validator: self,
            resources,
        })
    }

    /// Select one declared variable by name
    pub fn variable(&self, name: &str) -> VariableHandle<'_> {
        VariableHandle {
            validator: self,
            name: name.to_string(),
        }
    }

    fn resolve_property(&self, path: &str, raw: &Value) -> Result<Value> {
        self.resolver
            .resolve(path, raw, &self.document, self.settings.variable_expand)
    }
}

/// Compile a pattern with whole-string anchoring.
///
/// `^` and `$` are added unless already present, so a bare substring
/// pattern never partially matches.
fn anchored(pattern: &str) -> Result<Regex> {
    let mut full = String::with_capacity(pattern.len() + 2);
    if !pattern.starts_with('^') {
        full.push('^');
    }
    full.push_str(pattern);
    if !pattern.ends_with('$') {
        full.push('$');
    }
    Regex::new(&full).map_err(|e| Error::invalid_pattern(pattern, e.to_string()))
}

#[derive(Debug, Clone)]
struct ResourceEntry<'a> {
    rtype: String,
    name: String,
    body: &'a Value,
}

#[derive(Debug, Clone)]
struct PropertyEntry<'a> {
    rtype: String,
    name: String,
    path: String,
    value: &'a Value,
}

impl PropertyEntry<'_> {
    /// The `type.name.path` label used in violation lines and cache keys
    fn label(&self) -> String {
        format!("{}.{}.{}", self.rtype, self.name, self.path)
    }
}

/// An ordered, immutable selection of resources
#[derive(Debug)]
pub struct ResourceSet<'a> {
    validator: &'a Validator,
    resources: Vec<ResourceEntry<'a>>,
}

impl<'a> ResourceSet<'a> {
    /// Number of selected resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the selection is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Navigate into a named property of every selected resource.
    ///
    /// Elements without the property are silently elided, or aggregated
    /// into one failure when the strict missing-property mode is on.
    pub fn property(&self, name: &str) -> Result<PropertySet<'a>> {
        let strict = self.validator.settings.raise_error_if_property_missing;
        let mut violations = Violations::new();
        let mut properties = Vec::new();

        for resource in &self.resources {
            match resource.body.as_mapping().and_then(|m| m.get(name)) {
                Some(value) => properties.push(PropertyEntry {
                    rtype: resource.rtype.clone(),
                    name: resource.name.clone(),
                    path: name.to_string(),
                    value,
                }),
                None if strict => violations.push(format!(
                    "[{}.{}] should have property: '{}'",
                    resource.rtype, resource.name, name
                )),
                None => {}
            }
        }

        violations.finish()?;
        Ok(PropertySet {
            validator: self.validator,
            properties,
        })
    }

    /// Navigate into every property whose name matches the anchored pattern.
    ///
    /// In strict missing-property mode a resource with no matching property
    /// contributes a violation.
    pub fn find_property(&self, pattern: &str) -> Result<PropertySet<'a>> {
        let regex = anchored(pattern)?;
        let strict = self.validator.settings.raise_error_if_property_missing;
        let mut violations = Violations::new();
        let mut properties = Vec::new();

        for resource in &self.resources {
            let mut matched = false;
            if let Some(mapping) = resource.body.as_mapping() {
                for (key, value) in mapping {
                    if regex.is_match(key) {
                        matched = true;
                        properties.push(PropertyEntry {
                            rtype: resource.rtype.clone(),
                            name: resource.name.clone(),
                            path: key.clone(),
                            value,
                        });
                    }
                }
            }
            if !matched && strict {
                violations.push(format!(
                    "[{}.{}] No properties were found that match the regex '{}'",
                    resource.rtype, resource.name, pattern
                ));
            }
        }

        violations.finish()?;
        Ok(PropertySet {
            validator: self.validator,
            properties,
        })
    }

    /// Assert that every selected resource's name matches the anchored pattern
    pub fn name_should_match_regex(&self, pattern: &str) -> Result<()> {
        let regex = anchored(pattern)?;
        let mut violations = Violations::new();
        for resource in &self.resources {
            if !regex.is_match(&resource.name) {
                violations.push(format!(
                    "[{}.{}] should match regex '{}'",
                    resource.rtype, resource.name, pattern
                ));
            }
        }
        violations.finish()
    }

    /// Assert that every selected resource declares all of the named properties
    pub fn should_have_properties(&self, names: &[&str]) -> Result<()> {
        let mut violations = Violations::new();
        for resource in &self.resources {
            let mapping = resource.body.as_mapping();
            for required in names {
                if !mapping.is_some_and(|m| m.contains_key(*required)) {
                    violations.push(format!(
                        "[{}.{}] should have property: '{}'",
                        resource.rtype, resource.name, required
                    ));
                }
            }
        }
        violations.finish()
    }

    /// Assert that no selected resource declares any of the named properties
    pub fn should_not_have_properties(&self, names: &[&str]) -> Result<()> {
        let mut violations = Violations::new();
        for resource in &self.resources {
            let mapping = resource.body.as_mapping();
            for forbidden in names {
                if mapping.is_some_and(|m| m.contains_key(*forbidden)) {
                    violations.push(format!(
                        "[{}.{}] should not have property: '{}'",
                        resource.rtype, resource.name, forbidden
                    ));
                }
            }
        }
        violations.finish()
    }
}

/// An ordered, immutable selection of properties
#[derive(Debug)]
pub struct PropertySet<'a> {
    validator: &'a Validator,
    properties: Vec<PropertyEntry<'a>>,
}

impl<'a> PropertySet<'a> {
    /// Number of selected properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the selection is empty
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Navigate into a named property of every selected block.
    ///
    /// A property holding a single nested mapping and one holding a list of
    /// nested mappings navigate identically.
    pub fn property(&self, name: &str) -> Result<PropertySet<'a>> {
        let strict = self.validator.settings.raise_error_if_property_missing;
        let mut violations = Violations::new();
        let mut properties = Vec::new();

        for property in &self.properties {
            let blocks = property.value.as_blocks();
            if blocks.is_empty() && strict {
                violations.push(format!(
                    "[{}] should have property: '{}'",
                    property.label(),
                    name
                ));
                continue;
            }
            for block in blocks {
                match block.as_mapping().and_then(|m| m.get(name)) {
                    Some(value) => properties.push(PropertyEntry {
                        rtype: property.rtype.clone(),
                        name: property.name.clone(),
                        path: format!("{}.{}", property.path, name),
                        value,
                    }),
                    None if strict => violations.push(format!(
                        "[{}] should have property: '{}'",
                        property.label(),
                        name
                    )),
                    None => {}
                }
            }
        }

        violations.finish()?;
        Ok(PropertySet {
            validator: self.validator,
            properties,
        })
    }

    /// Navigate into every child property whose name matches the anchored
    /// pattern, across every selected block
    pub fn find_property(&self, pattern: &str) -> Result<PropertySet<'a>> {
        let regex = anchored(pattern)?;
        let strict = self.validator.settings.raise_error_if_property_missing;
        let mut violations = Violations::new();
        let mut properties = Vec::new();

        for property in &self.properties {
            let mut matched = false;
            for block in property.value.as_blocks() {
                if let Some(mapping) = block.as_mapping() {
                    for (key, value) in mapping {
                        if regex.is_match(key) {
                            matched = true;
                            properties.push(PropertyEntry {
                                rtype: property.rtype.clone(),
                                name: property.name.clone(),
                                path: format!("{}.{}", property.path, key),
                                value,
                            });
                        }
                    }
                }
            }
            if !matched && strict {
                violations.push(format!(
                    "[{}] No properties were found that match the regex '{}'",
                    property.label(),
                    pattern
                ));
            }
        }

        violations.finish()?;
        Ok(PropertySet {
            validator: self.validator,
            properties,
        })
    }

    /// Assert that every selected property's resolved value equals `expected`
    /// after boolean/integer normalization of both sides
    pub fn should_equal(&self, expected: impl Into<Value>) -> Result<()> {
        let expected = expected.into().normalized_string();
        let mut violations = Violations::new();
        for property in &self.properties {
            let actual = self.resolved(property)?.normalized_string();
            if actual != expected {
                violations.push(format!(
                    "[{}] should be '{}'. Is: '{}'",
                    property.label(),
                    expected,
                    actual
                ));
            }
        }
        violations.finish()
    }

    /// Assert that no selected property's resolved value equals `expected`
    pub fn should_not_equal(&self, expected: impl Into<Value>) -> Result<()> {
        let expected = expected.into().normalized_string();
        let mut violations = Violations::new();
        for property in &self.properties {
            let actual = self.resolved(property)?.normalized_string();
            if actual == expected {
                violations.push(format!(
                    "[{}] should not be '{}'. Is: '{}'",
                    property.label(),
                    expected,
                    actual
                ));
            }
        }
        violations.finish()
    }

    /// Assert that every selected property's resolved, stringified value
    /// matches the anchored pattern
    pub fn should_match_regex(&self, pattern: &str) -> Result<()> {
        let regex = anchored(pattern)?;
        let mut violations = Violations::new();
        for property in &self.properties {
            let actual = self.resolved(property)?.to_string();
            if !regex.is_match(&actual) {
                violations.push(format!(
                    "[{}] should match regex '{}'. Is: '{}'",
                    property.label(),
                    pattern,
                    actual
                ));
            }
        }
        violations.finish()
    }

    /// Assert that every selected block declares all of the named properties
    pub fn should_have_properties(&self, names: &[&str]) -> Result<()> {
        let mut violations = Violations::new();
        for property in &self.properties {
            let blocks = property.value.as_blocks();
            if blocks.is_empty() {
                for required in names {
                    violations.push(format!(
                        "[{}] should have property: '{}'",
                        property.label(),
                        required
                    ));
                }
                continue;
            }
            for block in blocks {
                let mapping = block.as_mapping();
                for required in names {
                    if !mapping.is_some_and(|m| m.contains_key(*required)) {
                        violations.push(format!(
                            "[{}] should have property: '{}'",
                            property.label(),
                            required
                        ));
                    }
                }
            }
        }
        violations.finish()
    }

    /// Assert that no selected block declares any of the named properties
    pub fn should_not_have_properties(&self, names: &[&str]) -> Result<()> {
        let mut violations = Violations::new();
        for property in &self.properties {
            for block in property.value.as_blocks() {
                let mapping = block.as_mapping();
                for forbidden in names {
                    if mapping.is_some_and(|m| m.contains_key(*forbidden)) {
                        violations.push(format!(
                            "[{}] should not have property: '{}'",
                            property.label(),
                            forbidden
                        ));
                    }
                }
            }
        }
        violations.finish()
    }

    /// Assert that the resolved property value, treated as a collection,
    /// contains every supplied value
    pub fn list_should_contain<T: Into<Value> + Clone>(&self, values: &[T]) -> Result<()> {
        let mut violations = Violations::new();
        for property in &self.properties {
            let resolved = self.resolved(property)?;
            let members = collection_members(&resolved);
            for value in values {
                let needle = value.clone().into().normalized_string();
                if !members.contains(&needle) {
                    violations.push(format!(
                        "[{}] should contain '{}'. Is: '{}'",
                        property.label(),
                        needle,
                        resolved
                    ));
                }
            }
        }
        violations.finish()
    }

    /// Assert that the resolved property value, treated as a collection,
    /// contains none of the supplied values
    pub fn list_should_not_contain<T: Into<Value> + Clone>(&self, values: &[T]) -> Result<()> {
        let mut violations = Violations::new();
        for property in &self.properties {
            let resolved = self.resolved(property)?;
            let members = collection_members(&resolved);
            for value in values {
                let needle = value.clone().into().normalized_string();
                if members.contains(&needle) {
                    violations.push(format!(
                        "[{}] should not contain '{}'. Is: '{}'",
                        property.label(),
                        needle,
                        resolved
                    ));
                }
            }
        }
        violations.finish()
    }

    fn resolved(&self, property: &PropertyEntry<'a>) -> Result<Value> {
        self.validator
            .resolve_property(&property.label(), property.value)
    }
}

/// The normalized membership view of a resolved value: a sequence yields
/// its elements, anything else is a one-element collection
fn collection_members(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(seq) => seq.iter().map(Value::normalized_string).collect(),
        other => vec![other.normalized_string()],
    }
}

/// A selected variable declaration
pub struct VariableHandle<'a> {
    validator: &'a Validator,
    name: String,
}

impl VariableHandle<'_> {
    /// Assert that the variable is declared with a default value
    pub fn default_value_exists(&self) -> Result<()> {
        let mut violations = Violations::new();
        if self.default()?.is_none() {
            violations.push(format!(
                "Variable {} should have a default value",
                self.name
            ));
        }
        violations.finish()
    }

    /// Assert that the variable's default equals `expected` after
    /// boolean/integer normalization of both sides
    pub fn default_value_equals(&self, expected: impl Into<Value>) -> Result<()> {
        let expected = expected.into().normalized_string();
        let actual = self.default_string(Value::normalized_string)?;
        let mut violations = Violations::new();
        if actual != expected {
            violations.push(format!(
                "Variable {} should have a default value of {}. Is: {}",
                self.name, expected, actual
            ));
        }
        violations.finish()
    }

    /// Assert that the variable's stringified default matches the anchored
    /// pattern
    pub fn default_value_matches_regex(&self, pattern: &str) -> Result<()> {
        let regex = anchored(pattern)?;
        let actual = self.default_string(Value::to_string)?;
        let mut violations = Violations::new();
        if !regex.is_match(&actual) {
            violations.push(format!(
                "Variable {} should have a default value that matches regex '{}'. Is: {}",
                self.name, pattern, actual
            ));
        }
        violations.finish()
    }

    fn default(&self) -> Result<Option<&Value>> {
        self.validator.document.variable_default(&self.name)
    }

    fn default_string(&self, stringify: impl Fn(&Value) -> String) -> Result<String> {
        Ok(match self.default()? {
            Some(value) => stringify(value),
            None => "None".to_string(),
        })
    }
}
