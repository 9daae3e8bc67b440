//! Section schemas
//!
//! A section is declared once as a [`SectionSchema`]: an ordered set of
//! [`FieldSpec`]s, each with a declared type, an optional default, a
//! required flag and any number of [`Validator`]s. Extensions are built with
//! [`SectionSchema::extending`], which inherits the parent's fragments; the
//! capability check in [`SectionSchema::compose`] rejects any redeclaration
//! that loosens an inherited constraint.
//!
//! ## Example
//!
//! ```
//! use trainconf::schema::{FieldSpec, SectionSchema, Validator};
//! use serde_json::json;
//!
//! let base = SectionSchema::new("logging")
//!     .field(FieldSpec::int("interval").default_value(10_i64).validate(Validator::positive()));
//! let strict = SectionSchema::extending("strict_logging", &base)
//!     .field(FieldSpec::int("interval").validate(Validator::at_most(100.0)));
//!
//! let node = strict.compose()?.parse(&json!({"interval": 50}))?;
//! assert_eq!(node.get_int("interval"), Some(50));
//! assert!(strict.compose()?.parse(&json!({"interval": 500})).is_err());
//! # Ok::<(), trainconf::Error>(())
//! ```

mod compose;
mod field;
mod parse;


pub use compose::{ComposedSchema, SchemaFragment, SectionSchema};
pub use field::{Alias, FieldSpec, FieldType, FieldValue, Validator};
pub(crate) use field::describe_raw;

use crate::error::Result;
use crate::node::ConfigNode;

/// A built-in section with a typed Rust view.
pub trait ConfigSection: Sized {
    /// Top-level key of the section in raw input.
    const NAME: &'static str;

    /// Field declarations of the section.
    fn schema() -> SectionSchema;

    /// Build the typed view from a node parsed with [`Self::schema`].
    fn from_node(node: &ConfigNode) -> Result<Self>;
}
