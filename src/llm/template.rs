// ABOUTME: Prompt template safety layer escaping untrusted text before placeholder substitution
// ABOUTME: Only the binding builder can produce escaped text, so call sites cannot skip escaping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Prompt Template Safety
//!
//! Templates use `{name}` placeholders. Free text coming from users or stores
//! regularly contains braces (JSON snippets, set notation), and rendered prompts
//! are often fed into a second placeholder pass. Text bindings therefore have
//! every `{` and `}` doubled before substitution.
//!
//! ```rust
//! use sales_assistant::llm::template::{safe_format, Bindings};
//!
//! let rendered = safe_format("Result: {x}", &Bindings::new().text("x", "a {b} c")).unwrap();
//! assert_eq!(rendered, "Result: a {{b}} c");
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use thiserror::Error;

/// Template substitution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template references a placeholder with no binding
    #[error("template references missing binding '{0}'")]
    MissingBinding(String),
}

/// Double every brace so the text is inert inside a placeholder template
///
/// Not idempotent: escaping already-escaped text doubles the braces again.
#[must_use]
pub fn escape_braces(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '{' => escaped.push_str("{{"),
            '}' => escaped.push_str("}}"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Text that has passed through [`escape_braces`] exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapedText(String);

impl EscapedText {
    fn escape(raw: &str) -> Self {
        Self(escape_braces(raw))
    }

    /// Escaped content
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
enum BindingValue {
    Text(EscapedText),
    Display(String),
}

impl BindingValue {
    fn as_str(&self) -> &str {
        match self {
            Self::Text(escaped) => escaped.as_str(),
            Self::Display(value) => value,
        }
    }
}

/// Named values for [`safe_format`]
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, BindingValue>,
}

impl Bindings {
    /// Create an empty binding set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind free text; it is escaped before substitution
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.values.insert(
            name.into(),
            BindingValue::Text(EscapedText::escape(value.as_ref())),
        );
        self
    }

    /// Bind a non-text value (number, boolean); substituted as its display string
    #[must_use]
    pub fn value<T: Display>(mut self, name: impl Into<String>, value: T) -> Self {
        self.values
            .insert(name.into(), BindingValue::Display(value.to_string()));
        self
    }

    /// Escaped form of a text binding, if one exists under `name`
    #[must_use]
    pub fn escaped(&self, name: &str) -> Option<&EscapedText> {
        match self.values.get(name) {
            Some(BindingValue::Text(escaped)) => Some(escaped),
            _ => None,
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(BindingValue::as_str)
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substitute `{name}` placeholders in `template` with their bindings
///
/// Doubled braces (`{{`, `}}`) and brace groups that are not identifiers
/// (`{"a": 1}`, `{ }`) are template structure and are copied untouched.
pub fn safe_format(template: &str, bindings: &Bindings) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let tail = &rest[open..];

        if tail.starts_with("{{") {
            output.push_str("{{");
            rest = &tail[2..];
            continue;
        }

        match tail[1..].find('}') {
            Some(close) if is_placeholder_name(&tail[1..=close]) => {
                let name = &tail[1..=close];
                let value = bindings
                    .get(name)
                    .ok_or_else(|| TemplateError::MissingBinding(name.to_owned()))?;
                output.push_str(value);
                rest = &tail[close + 2..];
            }
            _ => {
                output.push('{');
                rest = &tail[1..];
            }
        }
    }

    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_doubles_braces() {
        assert_eq!(escape_braces("a {b} c"), "a {{b}} c");
        assert_eq!(escape_braces("}{"), "}}{{");
        assert_eq!(escape_braces("plain"), "plain");
    }

    #[test]
    fn test_escape_is_not_idempotent() {
        let once = escape_braces("{x}");
        let twice = escape_braces(&once);
        assert_eq!(once, "{{x}}");
        assert_eq!(twice, "{{{{x}}}}");
    }

    #[test]
    fn test_escaped_text_has_no_lone_braces() {
        let inputs = ["{", "}", "{{}", "json: {\"a\": {\"b\": 1}}", "}}}{"];
        for input in inputs {
            let escaped = escape_braces(input);
            let opens = escaped.matches('{').count();
            let closes = escaped.matches('}').count();
            assert_eq!(opens % 2, 0, "odd '{{' run in {escaped}");
            assert_eq!(closes % 2, 0, "odd '}}' run in {escaped}");
        }
    }

    #[test]
    fn test_safe_format_escapes_text_bindings() {
        let rendered = safe_format("Result: {x}", &Bindings::new().text("x", "a {b} c")).unwrap();
        assert_eq!(rendered, "Result: a {{b}} c");
    }

    #[test]
    fn test_safe_format_display_values_are_not_escaped() {
        let bindings = Bindings::new().value("count", 5).value("enabled", true);
        let rendered = safe_format("{count} items, enabled={enabled}", &bindings).unwrap();
        assert_eq!(rendered, "5 items, enabled=true");
    }

    #[test]
    fn test_safe_format_missing_binding() {
        let err = safe_format("Hello {name}", &Bindings::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingBinding("name".to_owned()));
    }

    #[test]
    fn test_safe_format_leaves_structural_braces() {
        let template = "Reply as JSON {\"label\": \"X\"} for {{query}} = {query}";
        let rendered = safe_format(template, &Bindings::new().text("query", "q")).unwrap();
        assert_eq!(
            rendered,
            "Reply as JSON {\"label\": \"X\"} for {{query}} = q"
        );
    }

    #[test]
    fn test_safe_format_adversarial_text() {
        let hostile = "{query} {0} {{}} {";
        let rendered = safe_format("Q: {query}", &Bindings::new().text("query", hostile)).unwrap();
        assert_eq!(rendered, format!("Q: {}", escape_braces(hostile)));
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        let rendered = safe_format("open { brace", &Bindings::new()).unwrap();
        assert_eq!(rendered, "open { brace");
    }

    #[test]
    fn test_bindings_expose_escaped_text() {
        let bindings = Bindings::new().text("q", "{x}").value("n", 1);
        assert_eq!(bindings.escaped("q").map(EscapedText::as_str), Some("{{x}}"));
        assert!(bindings.escaped("n").is_none());
    }
}
