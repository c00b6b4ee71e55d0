//! Error types for rule normalization.
//!
//! Failures are split in two classes. [`RuleParseError`] covers documents
//! that cannot be read as a rule at all; callers skip such rules and count
//! them. [`ActionLookupError`] covers rules that parse but carry no usable
//! action names; callers treat it as fatal unless told otherwise.

use thiserror::Error;

/// The XML payload could not be read as a rule.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuleParseError {
    /// The payload is not well-formed XML.
    #[error("malformed XML: {message}")]
    MalformedXml {
        /// Description of the syntax problem.
        message: String,
    },

    /// The document root is neither `rule` nor `Rule`.
    #[error("no rule root element (found '{found}')")]
    MissingRoot {
        /// Name of the root element that was found instead.
        found: String,
    },

    /// The root element holds text or nothing instead of child fields.
    #[error("rule root element '{root}' has no fields")]
    InvalidRoot {
        /// Name of the root element.
        root: String,
    },

    /// The rule has no `definition` field.
    #[error("rule has no 'definition' field")]
    MissingDefinition,
}

impl RuleParseError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedXml {
            message: message.into(),
        }
    }
}

/// The rule parsed, but its action names could not be extracted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActionLookupError {
    /// Neither `action` nor `actions.action` is present.
    #[error("rule has neither 'action' nor 'actions.action'")]
    Missing,

    /// An action entry exists but does not carry a name.
    #[error("invalid action at '{path}': {reason}")]
    InvalidAction {
        /// Key path of the offending entry, e.g. `actions.action[1]`.
        path: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// Any failure of [`crate::normalize`].
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The rule could not be parsed; skip it.
    #[error(transparent)]
    Parse(#[from] RuleParseError),

    /// The rule has no usable actions.
    #[error(transparent)]
    ActionLookup(#[from] ActionLookupError),
}

impl NormalizeError {
    /// Returns true for failures that only affect the rule at hand.
    #[must_use]
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// Result type alias for normalization.
pub type Result<T> = std::result::Result<T, NormalizeError>;
