//! tfassert-core: Terraform assertion engine
//!
//! This crate provides the core functionality for asserting over parsed
//! Terraform configuration: select resources by type (or regex), navigate
//! into properties and nested blocks, and assert values, with `${var.*}`
//! interpolations resolved first and every violation reported in one
//! sorted, aggregated failure.
//!
//! # Example
//!
//! ```rust
//! use tfassert_core::Validator;
//!
//! let hcl = r#"
//! variable "port" {
//!   default = 8080
//! }
//!
//! resource "aws_instance" "web" {
//!   port = "${var.port}"
//! }
//! "#;
//!
//! let validator = Validator::from_hcl(hcl).unwrap();
//! validator
//!     .resources("aws_instance")
//!     .property("port").unwrap()
//!     .should_equal(8080).unwrap();
//! ```

pub mod document;
pub mod error;
pub mod interpolation;
pub mod resolver;
pub mod value;

mod validator;

pub use document::Document;
pub use error::{Error, ErrorKind, Result};
pub use resolver::VariableResolver;
pub use validator::{PropertySet, ResourceSet, Settings, Validator, VariableHandle};
pub use value::Value;
