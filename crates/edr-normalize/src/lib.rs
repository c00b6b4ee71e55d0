//! Normalization of EDR rule definitions.
//!
//! Rule providers ship each rule as an XML document. This crate turns one
//! such document into a [`NormalizedRule`]: a JSON object holding the rule's
//! fields, stripped of the raw `definition` and `maliciousTarget` payloads,
//! with an `actions` list of action names.
//!
//! # Example
//!
//! ```
//! let rule = edr_normalize::normalize(
//!     r#"<rule><definition>...</definition><action name="block"/></rule>"#,
//! )?;
//! assert_eq!(rule.actions(), ["block"]);
//! # Ok::<(), edr_normalize::NormalizeError>(())
//! ```

pub mod error;
pub mod rule;
pub mod xml;

pub use error::{ActionLookupError, NormalizeError, Result, RuleParseError};
pub use rule::{NormalizedRule, ROOT_NAMES, normalize};
pub use xml::parse_document;
