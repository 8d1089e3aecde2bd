//! Error types for tfassert
//!
//! Two families of failure exist and never mix: structural errors (a value
//! cannot be computed at all) abort the current call immediately, while
//! assertion violations are collected across every element of a selection
//! and raised once, sorted, at the end of the terminal operation.

use std::fmt;

/// Result type alias for tfassert operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tfassert operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path context (a file path or a tree path, depending on the kind)
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration could not be parsed (pass-through from the HCL parser)
    Syntax,
    /// An interpolation references a variable that is not declared
    UndeclaredVariable { name: String },
    /// An interpolation uses a transformation function that is not implemented
    UnimplementedInterpolation { function: String },
    /// The configuration uses an expression form the engine does not evaluate
    UnsupportedExpression { construct: String },
    /// A supplied regex pattern failed to compile
    InvalidPattern { pattern: String },
    /// One or more assertion violations, already sorted
    AssertionFailed { violations: Vec<String> },
    /// I/O error while loading configuration files
    Io,
}

impl Error {
    /// Create a syntax error from the parsing collaborator
    pub fn syntax(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            path: Some(file.into()),
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create an undeclared-variable error
    pub fn undeclared_variable(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ErrorKind::UndeclaredVariable { name: name.clone() },
            path: None,
            help: Some(format!(
                "Declare 'variable \"{}\" {{ ... }}' or remove the reference",
                name
            )),
            cause: None,
        }
    }

    /// Create an unimplemented-interpolation error
    pub fn unimplemented_interpolation(function: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnimplementedInterpolation {
                function: function.into(),
            },
            path: None,
            help: Some("Supported interpolation functions are 'lower' and 'upper'".into()),
            cause: None,
        }
    }

    /// Create an unsupported-expression error
    pub fn unsupported_expression(construct: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnsupportedExpression {
                construct: construct.into(),
            },
            path: None,
            help: Some("Only literal values and ${var.*} template strings are evaluated".into()),
            cause: None,
        }
    }

    /// Create an invalid-pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidPattern {
                pattern: pattern.into(),
            },
            path: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create an aggregated assertion failure from already-sorted violations
    pub fn assertion_failed(violations: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::AssertionFailed { violations },
            path: None,
            help: None,
            cause: None,
        }
    }

    /// Create an I/O error
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Io,
            path: Some(path.into()),
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The violation lines if this is an aggregated assertion failure
    pub fn violations(&self) -> Option<&[String]> {
        match &self.kind {
            ErrorKind::AssertionFailed { violations } => Some(violations),
            _ => None,
        }
    }

    /// Whether this error is an aggregated assertion failure (as opposed to
    /// a structural error that aborted evaluation)
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::AssertionFailed { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            // The aggregated message is exactly the joined violation lines
            ErrorKind::AssertionFailed { violations } => {
                return write!(f, "{}", violations.join("\n"));
            }
            ErrorKind::Syntax => write!(f, "Invalid Terraform configuration")?,
            ErrorKind::UndeclaredVariable { name } => {
                write!(f, "There is no Terraform variable '{}'", name)?
            }
            ErrorKind::UnimplementedInterpolation { function } => {
                write!(f, "Interpolation function '{}' is not implemented", function)?
            }
            ErrorKind::UnsupportedExpression { construct } => {
                write!(f, "Unsupported expression: {}", construct)?
            }
            ErrorKind::InvalidPattern { pattern } => {
                write!(f, "Invalid regex pattern '{}'", pattern)?
            }
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// Collects per-element violation messages during a terminal operation.
///
/// Violations accumulate across the whole selection; `finish` sorts them
/// for determinism and raises one aggregated failure if any were recorded.
#[derive(Debug, Default)]
pub struct Violations {
    lines: Vec<String>,
}

impl Violations {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one violation line
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    /// Whether no violations have been recorded
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sort the collected lines and raise one aggregated failure if non-empty
    pub fn finish(mut self) -> Result<()> {
        if self.lines.is_empty() {
            return Ok(());
        }
        self.lines.sort();
        Err(Error::assertion_failed(self.lines))
    }
}
