//! Human-readable metadata merged into generated schemas.
//!
//! Parsed from reST-style docstrings:
//! - title: first non-empty line
//! - description: text between the title and the first directive
//! - `:param name: text` (may continue on following lines)
//! - `:example: {json}` (invalid JSON is skipped)
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PARAM_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:param\s+(\w+):\s*(.*)$").expect("static regex"));
static EXAMPLE_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:example:\s*(.*)$").expect("static regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub field_descriptions: IndexMap<String, String>,
    pub examples: Vec<serde_json::Value>,
}

impl DocMeta {
    pub fn parse(docstring: &str) -> Self {
        let mut lines = docstring.trim().lines().map(str::trim);
        let Some(title) = lines.by_ref().find(|l| !l.is_empty()) else {
            return Self::default();
        };

        let mut out = Self { title: Some(title.to_string()), ..Self::default() };
        let mut description: Vec<&str> = Vec::new();
        let mut in_description = true;
        let mut param: Option<(String, Vec<String>)> = None;

        for line in lines {
            if let Some(caps) = PARAM_RX.captures(line) {
                flush(&mut param, &mut out);
                in_description = false;
                let text = caps[2].trim();
                let mut acc = Vec::new();
                if !text.is_empty() {
                    acc.push(text.to_string());
                }
                param = Some((caps[1].to_string(), acc));
                continue;
            }
            if let Some(caps) = EXAMPLE_RX.captures(line) {
                flush(&mut param, &mut out);
                in_description = false;
                if let Ok(example) = serde_json::from_str::<serde_json::Value>(caps[1].trim()) {
                    out.examples.push(example);
                }
                continue;
            }
            if line.starts_with(':') {
                flush(&mut param, &mut out);
                in_description = false;
                continue;
            }
            if let Some((_, acc)) = param.as_mut() {
                if !line.is_empty() {
                    acc.push(line.to_string());
                }
                continue;
            }
            if in_description && !line.is_empty() {
                description.push(line);
            }
        }
        flush(&mut param, &mut out);

        if !description.is_empty() {
            out.description = Some(description.join(" "));
        }
        out
    }
}

fn flush(param: &mut Option<(String, Vec<String>)>, out: &mut DocMeta) {
    if let Some((name, text)) = param.take() {
        if !text.is_empty() {
            out.field_descriptions.insert(name, text.join(" ").trim().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_docstring_has_no_metadata() {
        assert_eq!(DocMeta::parse(""), DocMeta::default());
        assert_eq!(DocMeta::parse("   \n  "), DocMeta::default());
    }

    #[test]
    fn title_and_multiline_description() {
        let doc = DocMeta::parse(
            "
            Short title.

            This is a longer description that
            spans multiple lines.
            ",
        );
        assert_eq!(doc.title.as_deref(), Some("Short title."));
        assert_eq!(doc.description.as_deref(), Some("This is a longer description that spans multiple lines."));
    }

    #[test]
    fn params_and_continuations() {
        let doc = DocMeta::parse(
            "Model.

            :param name: The user's full name.
            :param field: This is a long description
                that continues on the next line.
            ",
        );
        assert_eq!(doc.field_descriptions["name"], "The user's full name.");
        assert_eq!(doc.field_descriptions["field"], "This is a long description that continues on the next line.");
        assert_eq!(doc.description, None);
    }

    #[test]
    fn examples_skip_invalid_json() {
        let doc = DocMeta::parse(
            "Model.
            :example: {\"a\": 1}
            :example: {invalid json}
            :example: {\"a\": 2, \"b\": 3}",
        );
        assert_eq!(doc.examples, vec![json!({"a": 1}), json!({"a": 2, "b": 3})]);
    }
}
