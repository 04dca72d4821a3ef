//! YAML front matter extraction.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// `---` block at the very start of a document.
static FRONT_MATTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)")
        .expect("invalid front matter regex")
});

/// A document split into attributes and body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FrontMatter {
    pub attributes: Map<String, Value>,
    pub body: String,
}

/// Front matter block that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid front matter: {0}")]
pub(crate) struct FrontMatterError(String);

/// Split a document into front matter attributes and body.
///
/// A leading UTF-8 BOM is ignored. Documents without a block yield empty
/// attributes and the whole text as body.
pub(crate) fn parse(contents: &str) -> Result<FrontMatter, FrontMatterError> {
    let text = contents.strip_prefix('\u{feff}').unwrap_or(contents);

    let Some(captures) = FRONT_MATTER.captures(text) else {
        return Ok(FrontMatter {
            attributes: Map::new(),
            body: text.to_owned(),
        });
    };

    let block = captures.get(1).map_or("", |m| m.as_str());
    let body = text[captures.get(0).map_or(0, |m| m.end())..].to_owned();

    if block.trim().is_empty() {
        return Ok(FrontMatter {
            attributes: Map::new(),
            body,
        });
    }

    match serde_yaml::from_str::<Value>(block) {
        Ok(Value::Object(attributes)) => Ok(FrontMatter { attributes, body }),
        Ok(Value::Null) => Ok(FrontMatter {
            attributes: Map::new(),
            body,
        }),
        Ok(other) => Err(FrontMatterError(format!(
            "expected a mapping, found {}",
            value_kind(&other)
        ))),
        Err(e) => Err(FrontMatterError(e.to_string())),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_no_front_matter() {
        let parsed = parse("<p>Hello</p>").unwrap();
        assert!(parsed.attributes.is_empty());
        assert_eq!(parsed.body, "<p>Hello</p>");
    }

    #[test]
    fn test_attributes_and_body() {
        let parsed = parse("---\nlayout: post\ntitle: Hi\n---\n<p>Body</p>\n").unwrap();
        assert_eq!(Value::Object(parsed.attributes), json!({"layout": "post", "title": "Hi"}));
        assert_eq!(parsed.body, "<p>Body</p>\n");
    }

    #[test]
    fn test_crlf_and_bom() {
        let parsed = parse("\u{feff}---\r\ntitle: Hi\r\n---\r\nBody").unwrap();
        assert_eq!(parsed.attributes["title"], json!("Hi"));
        assert_eq!(parsed.body, "Body");
    }

    #[test]
    fn test_empty_block() {
        let parsed = parse("---\n---\nBody").unwrap();
        assert!(parsed.attributes.is_empty());
        assert_eq!(parsed.body, "Body");

        let parsed = parse("---\n   \n---\nBody").unwrap();
        assert!(parsed.attributes.is_empty());
    }

    #[test]
    fn test_block_without_body() {
        let parsed = parse("---\ntitle: Only\n---").unwrap();
        assert_eq!(parsed.attributes["title"], json!("Only"));
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn test_dashes_later_in_document_are_body() {
        let parsed = parse("Intro\n---\ntitle: no\n---\n").unwrap();
        assert!(parsed.attributes.is_empty());
        assert_eq!(parsed.body, "Intro\n---\ntitle: no\n---\n");
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse("---\ntitle: [unclosed\n---\nBody").unwrap_err();
        assert!(err.to_string().starts_with("Invalid front matter"));
    }

    #[test]
    fn test_non_mapping_block() {
        let err = parse("---\n- a\n- b\n---\nBody").unwrap_err();
        assert_eq!(err.to_string(), "Invalid front matter: expected a mapping, found a sequence");
    }
}
