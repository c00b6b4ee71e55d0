//! Rule normalization.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ActionLookupError, NormalizeError, RuleParseError};
use crate::xml::{ATTRIBUTE_PREFIX, parse_document};

/// Accepted root element names, in lookup order.
pub const ROOT_NAMES: [&str; 2] = ["rule", "Rule"];

const DEFINITION: &str = "definition";
const MALICIOUS_TARGET: &str = "maliciousTarget";
const ACTION: &str = "action";
const ACTIONS: &str = "actions";
const NAME: &str = "name";

/// A rule converted from its XML definition.
///
/// Holds every field of the rule's root element except `definition` and
/// `maliciousTarget`, with `actions` always set to the list of action names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRule {
    fields: Map<String, Value>,
}

impl NormalizedRule {
    /// Action names in document order.
    #[must_use]
    pub fn actions(&self) -> Vec<&str> {
        self.fields
            .get(ACTIONS)
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the value of a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields, in document order.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Converts one XML rule definition into a [`NormalizedRule`].
///
/// # Errors
///
/// - [`RuleParseError`] when the XML is malformed, the root is neither
///   `rule` nor `Rule`, the root has no fields, or `definition` is absent.
/// - [`ActionLookupError`] when no action names can be derived.
pub fn normalize(xml_definition: &str) -> Result<NormalizedRule, NormalizeError> {
    let mut document = parse_document(xml_definition)?;

    let root = ROOT_NAMES
        .into_iter()
        .find(|name| document.contains_key(*name))
        .ok_or_else(|| RuleParseError::MissingRoot {
            found: document.keys().next().cloned().unwrap_or_default(),
        })?;

    let Some(Value::Object(mut fields)) = document.shift_remove(root) else {
        return Err(RuleParseError::InvalidRoot {
            root: root.to_string(),
        }
        .into());
    };

    if fields.shift_remove(DEFINITION).is_none() {
        return Err(RuleParseError::MissingDefinition.into());
    }
    fields.shift_remove(MALICIOUS_TARGET);

    let actions = take_actions(&mut fields)?;
    tracing::trace!(root, actions = ?actions, "normalized rule");

    fields.insert(
        ACTIONS.to_string(),
        Value::Array(actions.into_iter().map(Value::String).collect()),
    );

    Ok(NormalizedRule { fields })
}

/// Derives action names, removing a single `action` field if present.
fn take_actions(fields: &mut Map<String, Value>) -> Result<Vec<String>, ActionLookupError> {
    if let Some(action) = fields.shift_remove(ACTION) {
        return match action {
            Value::String(name) => Ok(vec![name]),
            element => Ok(vec![action_name(&element, ACTION)?]),
        };
    }

    let Some(actions) = fields.get(ACTIONS).and_then(|actions| actions.get(ACTION)) else {
        return Err(ActionLookupError::Missing);
    };

    match actions {
        Value::Array(elements) => elements
            .iter()
            .enumerate()
            .map(|(index, element)| action_name(element, &format!("actions.action[{index}]")))
            .collect(),
        element => Ok(vec![action_name(element, "actions.action")?]),
    }
}

fn action_name(element: &Value, path: &str) -> Result<String, ActionLookupError> {
    let invalid = |reason| ActionLookupError::InvalidAction {
        path: path.to_string(),
        reason,
    };

    let Value::Object(attributes) = element else {
        return Err(invalid("not an element with attributes"));
    };
    match attributes.get(&format!("{ATTRIBUTE_PREFIX}{NAME}")) {
        Some(Value::String(name)) => Ok(name.clone()),
        Some(_) => Err(invalid("'@name' is not a string")),
        None => Err(invalid("missing '@name' attribute")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_plain_action() {
        let rule = normalize("<rule><definition>X</definition><action>foo</action></rule>").unwrap();
        assert!(rule.get("definition").is_none());
        assert!(rule.get("action").is_none());
        assert_eq!(rule.actions(), ["foo"]);
    }

    #[test]
    fn test_single_structured_action() {
        let rule = normalize(
            r#"<rule><definition/><action name="block" level="3"/></rule>"#,
        )
        .unwrap();
        assert_eq!(rule.actions(), ["block"]);
    }

    #[test]
    fn test_action_list() {
        let rule = normalize(
            r#"<rule><definition>d</definition><actions><action name="a1"/><action name="a2"/></actions></rule>"#,
        )
        .unwrap();
        assert_eq!(rule.actions(), ["a1", "a2"]);
    }

    #[test]
    fn test_single_action_in_actions() {
        let rule = normalize(
            r#"<rule><definition>d</definition><actions><action name="only"/></actions></rule>"#,
        )
        .unwrap();
        assert_eq!(rule.actions(), ["only"]);
    }

    #[test]
    fn test_action_takes_priority_over_actions() {
        let rule = normalize(
            r#"<rule><definition>d</definition><actions><action name="a1"/></actions><action>direct</action></rule>"#,
        )
        .unwrap();
        assert_eq!(rule.actions(), ["direct"]);
    }

    #[test]
    fn test_entities_declared_in_doctype() {
        let rule = normalize(
            r#"<!DOCTYPE rule [<!ENTITY e "v">]><rule><definition>&e;</definition><action>x</action></rule>"#,
        )
        .unwrap();
        assert_eq!(rule.actions(), ["x"]);
    }

    #[test]
    fn test_capitalized_root() {
        let lower = normalize("<rule><definition>X</definition><action>foo</action></rule>").unwrap();
        let upper = normalize("<Rule><definition>X</definition><action>foo</action></Rule>").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_removed_and_retained_fields() {
        let rule = normalize(
            r#"<rule id="7"><name>Suspicious</name><definition>d</definition><maliciousTarget>t</maliciousTarget><action>log</action></rule>"#,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({"@id": "7", "name": "Suspicious", "actions": ["log"]})
        );
    }

    #[test]
    fn test_parse_failures() {
        for xml in [
            "<rule><definition>X</definition>",
            "<policy><definition>X</definition><action>a</action></policy>",
            "<rule/>",
            "<rule>text only</rule>",
            "<rule><action>a</action></rule>",
        ] {
            let err = normalize(xml).unwrap_err();
            assert!(err.is_parse_failure(), "{xml}: {err}");
        }
    }

    #[test]
    fn test_action_lookup_failures() {
        for xml in [
            "<rule><definition>X</definition></rule>",
            "<rule><definition>X</definition><actions>none</actions></rule>",
            "<rule><definition>X</definition><action/></rule>",
            "<rule><definition>X</definition><action><name>x</name></action></rule>",
            "<rule><definition>X</definition><action>a</action><action>b</action></rule>",
            r#"<rule><definition>X</definition><actions><action name="a"/><action/></actions></rule>"#,
        ] {
            let err = normalize(xml).unwrap_err();
            assert!(
                matches!(err, NormalizeError::ActionLookup(_)),
                "{xml}: {err}"
            );
        }
    }
}
