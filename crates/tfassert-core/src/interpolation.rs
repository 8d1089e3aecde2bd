//! Interpolation expression parsing
//!
//! Parses the inner content of one `${...}` expression into a bare variable
//! name plus an ordered chain of transformation functions:
//! - `var.name` - a plain variable reference
//! - `lower(var.name)` - a wrapped reference
//! - `lower(upper(var.name))` - a chained reference; functions are recorded
//!   in textual (outer-to-inner) order and applied in that same order
//!
//! Anything else - unknown functions, arithmetic, conditionals, bare
//! resource-attribute references - is unimplemented and fails with an error
//! naming the offending text.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// A transformation function that may wrap a variable reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Lowercase the resolved value
    Lower,
    /// Uppercase the resolved value
    Upper,
}

impl Function {
    /// Look up a function by its interpolation name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "lower" => Ok(Function::Lower),
            "upper" => Ok(Function::Upper),
            other => Err(Error::unimplemented_interpolation(other)),
        }
    }

    /// Apply this function to a resolved value
    pub fn apply(&self, input: &str) -> String {
        match self {
            Function::Lower => input.to_lowercase(),
            Function::Upper => input.to_uppercase(),
        }
    }
}

/// A parsed interpolation expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolation {
    /// The bare variable name (without the `var.` prefix)
    pub variable: String,
    /// Function chain in textual order, outermost first
    pub functions: Vec<Function>,
}

/// Parser for the inner content of one `${...}` expression
pub struct InterpolationParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> InterpolationParser<'a> {
    /// Create a new parser for the given inner content (delimiters stripped)
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse the expression into a variable name and function chain
    pub fn parse(&mut self) -> Result<Interpolation> {
        let mut functions = Vec::new();

        loop {
            if self.at_var_prefix() {
                // Skip the literal prefix and exactly one separator
                self.pos += VAR_PREFIX.len() + 1;
                return Ok(Interpolation {
                    variable: self.collect_variable_name(),
                    functions,
                });
            }
            functions.push(Function::from_name(&self.collect_function_name()?)?);
        }
    }

    /// Check if we're at end of input
    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Get current character
    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Advance by one character
    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
        }
    }

    /// Check if the remaining input starts with `var` plus the separator
    fn at_var_prefix(&self) -> bool {
        let rest = &self.input[self.pos..];
        rest.starts_with(VAR_PREFIX)
            && rest[VAR_PREFIX.len()..].starts_with(SEPARATOR)
    }

    /// Accumulate the variable name until the closing parenthesis or end of input
    fn collect_variable_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.current() {
            if c == ')' {
                break;
            }
            name.push(c);
            self.advance();
        }
        name
    }

    /// Accumulate a function name until `(`.
    ///
    /// Reaching end of input first means the expression is not a wrapped
    /// variable reference at all (e.g. a resource-attribute traversal);
    /// the accumulated text is reported as the unimplemented construct.
    fn collect_function_name(&mut self) -> Result<String> {
        let mut name = String::new();
        loop {
            match self.current() {
                Some('(') => {
                    self.advance();
                    return Ok(name);
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Err(Error::unimplemented_interpolation(name)),
            }
        }
    }
}

const VAR_PREFIX: &str = "var";
const SEPARATOR: char = '.';

/// Parse the inner content of one interpolation expression
pub fn parse(inner: &str) -> Result<Interpolation> {
    InterpolationParser::new(inner).parse()
}

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Non-greedy so adjacent expressions match separately
    RE.get_or_init(|| Regex::new(r"\$\{(.*?)\}").expect("expression pattern is valid"))
}

/// Extract every `${...}` occurrence from a string, left to right.
///
/// Each returned slice includes the delimiters; use [`inner`] to strip them.
pub fn find_expressions(input: &str) -> Vec<&str> {
    expression_regex()
        .find_iter(input)
        .map(|m| m.as_str())
        .collect()
}

/// Strip the `${` and `}` delimiters from one found expression
pub fn inner(expression: &str) -> &str {
    &expression[2..expression.len() - 1]
}

/// Check if a string contains any interpolation expression
pub fn contains_expression(input: &str) -> bool {
    expression_regex().is_match(input)
}
