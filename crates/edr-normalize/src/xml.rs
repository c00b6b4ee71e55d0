//! Conversion of an XML document into a JSON object tree.
//!
//! Elements map to JSON the usual XML-to-dict way: attributes become
//! `@name` keys, child elements become keys in document order, repeated
//! children collapse into an array, and text of an element that also has
//! attributes or children lands under `#text`. A leaf element maps to its
//! trimmed text, or `null` when empty.
//!
//! Character references, the predefined entities and general entities
//! declared in the internal DTD subset are expanded. Entity values are
//! inserted as text.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape, unescape_with};
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::error::RuleParseError;

/// Key prefix used for attributes.
pub const ATTRIBUTE_PREFIX: &str = "@";

/// Key holding the text of an element that also has attributes or children.
pub const TEXT_KEY: &str = "#text";

/// General entities declared in the document type.
#[derive(Debug, Default)]
struct Entities(HashMap<String, String>);

impl Entities {
    /// Records every internal `<!ENTITY name "value">` declaration in a
    /// DOCTYPE body. Parameter and external entities are skipped; the first
    /// declaration of a name wins.
    fn declare(&mut self, doctype: &str) {
        const MARKER: &str = "<!ENTITY";

        let mut rest = doctype;
        while let Some(start) = rest.find(MARKER) {
            rest = rest[start + MARKER.len()..].trim_start();
            if rest.starts_with('%') {
                continue;
            }

            let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let name = &rest[..name_end];
            rest = rest[name_end..].trim_start();

            let Some(quote) = rest.chars().next().filter(|c| matches!(*c, '"' | '\'')) else {
                continue;
            };
            let Some(end) = rest[1..].find(quote) else {
                break;
            };
            let raw = &rest[1..=end];
            let value = unescape(raw).map_or_else(|_| raw.to_string(), Cow::into_owned);
            self.0.entry(name.to_string()).or_insert(value);
            rest = &rest[end + 2..];
        }
    }

    fn resolve(&self, name: &str) -> Option<&str> {
        if let Some(value) = resolve_predefined_entity(name) {
            return Some(value);
        }
        self.0.get(name).map(String::as_str)
    }

    fn unescape<'a>(&self, raw: &'a str) -> Result<Cow<'a, str>, RuleParseError> {
        unescape_with(raw, |name| self.resolve(name))
            .map_err(|e| RuleParseError::malformed(e.to_string()))
    }
}

/// An element whose end tag has not been seen yet.
struct OpenElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn open(start: &BytesStart<'_>, entities: &Entities) -> Result<Self, RuleParseError> {
        let name = utf8(start.name().as_ref())?.to_string();
        let mut fields = Map::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| RuleParseError::malformed(e.to_string()))?;
            let key = utf8(attribute.key.as_ref())?;
            let value = entities.unescape(utf8(&attribute.value)?)?;
            fields.insert(
                format!("{ATTRIBUTE_PREFIX}{key}"),
                Value::String(value.into_owned()),
            );
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn push_child(&mut self, name: String, value: Value) {
        match self.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }

    fn into_entry(self) -> (String, Value) {
        let Self {
            name,
            mut fields,
            text,
        } = self;
        let text = text.trim();

        let value = if fields.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            }
        } else {
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
            }
            Value::Object(fields)
        };

        (name, value)
    }
}

/// Parses `xml` into a JSON object keyed by the root element name.
///
/// # Errors
///
/// Returns [`RuleParseError::MalformedXml`] when the input is not a
/// well-formed document with exactly one root element.
pub fn parse_document(xml: &str) -> Result<Map<String, Value>, RuleParseError> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<OpenElement> = Vec::new();
    let mut document = Map::new();
    let mut entities = Entities::default();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RuleParseError::malformed(e.to_string()))?;

        match event {
            Event::Start(start) => {
                ensure_single_root(&open, &document)?;
                open.push(OpenElement::open(&start, &entities)?);
            }
            Event::Empty(start) => {
                ensure_single_root(&open, &document)?;
                let element = OpenElement::open(&start, &entities)?;
                close(element, &mut open, &mut document);
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| RuleParseError::malformed("unexpected closing tag"))?;
                close(element, &mut open, &mut document);
            }
            Event::Text(text) => {
                let text = entities.unescape(utf8(&text)?)?;
                append_text(&mut open, &text)?;
            }
            Event::CData(data) => append_text(&mut open, utf8(&data)?)?,
            Event::GeneralRef(reference) => {
                let entity = format!("&{};", utf8(&reference)?);
                let resolved = entities.unescape(&entity)?;
                if open.is_empty() {
                    return Err(RuleParseError::malformed(
                        "entity reference outside the root element",
                    ));
                }
                append_text(&mut open, &resolved)?;
            }
            Event::DocType(doctype) => entities.declare(utf8(&doctype)?),
            Event::Eof => break,
            // Declarations, comments, processing instructions
            _ => {}
        }
    }

    if let Some(element) = open.last() {
        return Err(RuleParseError::malformed(format!(
            "unclosed element '{}'",
            element.name
        )));
    }
    if document.is_empty() {
        return Err(RuleParseError::malformed("no element found"));
    }

    Ok(document)
}

fn ensure_single_root(
    open: &[OpenElement],
    document: &Map<String, Value>,
) -> Result<(), RuleParseError> {
    if open.is_empty() && !document.is_empty() {
        return Err(RuleParseError::malformed("junk after document element"));
    }
    Ok(())
}

fn close(element: OpenElement, open: &mut [OpenElement], document: &mut Map<String, Value>) {
    let (name, value) = element.into_entry();
    match open.last_mut() {
        Some(parent) => parent.push_child(name, value),
        None => {
            document.insert(name, value);
        }
    }
}

fn append_text(open: &mut [OpenElement], text: &str) -> Result<(), RuleParseError> {
    match open.last_mut() {
        Some(element) => {
            element.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(RuleParseError::malformed("text outside the root element")),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, RuleParseError> {
    std::str::from_utf8(bytes).map_err(|e| RuleParseError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(xml: &str) -> Value {
        Value::Object(parse_document(xml).unwrap())
    }

    #[test]
    fn test_leaf_elements() {
        assert_eq!(parse("<a>  hello </a>"), json!({"a": "hello"}));
        assert_eq!(parse("<a></a>"), json!({"a": null}));
        assert_eq!(parse("<a/>"), json!({"a": null}));
    }

    #[test]
    fn test_attributes_and_children_keep_document_order() {
        let value = parse(r#"<a z="1" b="2"><y>first</y><c>second</c></a>"#);
        let keys: Vec<&str> = value["a"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["@z", "@b", "y", "c"]);
    }

    #[test]
    fn test_repeated_children_become_array() {
        let value = parse("<a><b>1</b><c/><b>2</b><b>3</b></a>");
        assert_eq!(value, json!({"a": {"b": ["1", "2", "3"], "c": null}}));
    }

    #[test]
    fn test_mixed_text_goes_under_text_key() {
        let value = parse(r#"<a kind="x"> some <b/> text </a>"#);
        assert_eq!(
            value,
            json!({"a": {"@kind": "x", "b": null, "#text": "some  text"}})
        );
    }

    #[test]
    fn test_entities_and_cdata_are_text() {
        assert_eq!(parse("<a>x &amp; y</a>"), json!({"a": "x & y"}));
        assert_eq!(parse("<a>&#65;&lt;</a>"), json!({"a": "A<"}));
        assert_eq!(parse("<a><![CDATA[<raw>]]></a>"), json!({"a": "<raw>"}));
        assert_eq!(parse(r#"<a n="&quot;q&quot;"/>"#), json!({"a": {"@n": "\"q\""}}));
    }

    #[test]
    fn test_internal_entities_are_resolved() {
        let value = parse(concat!(
            "<!DOCTYPE rule [\n",
            "  <!ENTITY vendor \"Acme &amp; Co\">\n",
            "  <!ENTITY % param \"ignored\">\n",
            "  <!ENTITY ext SYSTEM \"ext.xml\">\n",
            "  <!ENTITY short 'v'>\n",
            "]>",
            r#"<rule by="&short;"><name>&vendor; rule</name></rule>"#,
        ));
        assert_eq!(
            value,
            json!({"rule": {"@by": "v", "name": "Acme & Co rule"}})
        );
    }

    #[test]
    fn test_first_entity_declaration_wins() {
        let value = parse(r#"<!DOCTYPE a [<!ENTITY e "one"><!ENTITY e "two">]><a>&e;</a>"#);
        assert_eq!(value, json!({"a": "one"}));
    }

    #[test]
    fn test_external_entity_reference_is_malformed() {
        let result = parse_document(r#"<!DOCTYPE a [<!ENTITY ext SYSTEM "x.xml">]><a>&ext;</a>"#);
        assert!(matches!(result, Err(RuleParseError::MalformedXml { .. })));
    }

    #[test]
    fn test_prolog_and_comments_are_ignored() {
        let value = parse("<?xml version=\"1.0\"?>\n<!-- note -->\n<a><!-- inner -->v</a>\n");
        assert_eq!(value, json!({"a": "v"}));
    }

    #[test]
    fn test_malformed_documents() {
        for xml in [
            "",
            "   ",
            "<a>",
            "<a><b></a>",
            "<a></b>",
            "<a/><b/>",
            "text<a/>",
            "<a>&undefined;</a>",
            "<a",
        ] {
            let result = parse_document(xml);
            assert!(
                matches!(result, Err(RuleParseError::MalformedXml { .. })),
                "expected malformed error for {xml:?}, got {result:?}"
            );
        }
    }
}
