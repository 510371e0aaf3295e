//! `{name}` placeholder templates
//!
//! Syntax mirrors the familiar `str.format` subset users already write in
//! their bar configs: `{field}` is substituted, `{{` and `}}` are literal
//! braces. Format specs and positional fields are not supported.

use std::collections::HashMap;

use crate::error::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed, syntactically valid template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let syntax = |message: &str| TemplateError::Syntax {
            template: source.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(syntax("unclosed '{'")),
                            Some(ch) => name.push(ch),
                        }
                    }
                    if name.is_empty() {
                        return Err(syntax("empty placeholder '{}'"));
                    }
                    if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
                        return Err(syntax(&format!("invalid placeholder name {:?}", name)));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(syntax("single '}' encountered")),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Placeholder names in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder. All names are checked before any output
    /// is produced.
    pub fn render(&self, values: &HashMap<String, String>) -> Result<String, TemplateError> {
        if let Some(missing) = self.placeholders().find(|name| !values.contains_key(*name)) {
            return Err(TemplateError::UnknownPlaceholder {
                template: self.source.clone(),
                name: missing.to_string(),
            });
        }

        let mut output = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = values.get(name) {
                        output.push_str(value);
                    }
                }
            }
        }
        Ok(output)
    }
}
