use std::collections::HashMap;

use serde_json::Value;

use crate::error::NotificationError;

/// Message templates with `{{variable}}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    templates: HashMap<String, Template>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub body: String,
}

impl Template {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }
}

/// A piece of a template body.
enum Segment<'a> {
    Text(&'a str),
    Variable(&'a str),
}

/// Splits `body` into literal text and placeholder names. An unterminated
/// `{{` is kept as text.
fn segments(body: &str) -> impl Iterator<Item = Segment<'_>> {
    let mut rest = body;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find("{{") {
            Some(0) => match rest[2..].find("}}") {
                Some(len) => {
                    let name = rest[2..2 + len].trim();
                    rest = &rest[len + 4..];
                    Some(Segment::Variable(name))
                }
                None => {
                    let text = rest;
                    rest = "";
                    Some(Segment::Text(text))
                }
            },
            Some(start) => {
                let (text, tail) = rest.split_at(start);
                rest = tail;
                Some(Segment::Text(text))
            }
            None => {
                let text = rest;
                rest = "";
                Some(Segment::Text(text))
            }
        }
    })
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    #[must_use]
    pub fn with(mut self, id: &str, body: &str) -> Self {
        self.register(Template::new(id, body));
        self
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Renders template `id`, failing if any placeholder has no value.
    ///
    /// Substituted values are not scanned for further placeholders.
    pub fn render(
        &self,
        id: &str,
        data: &HashMap<String, Value>,
    ) -> Result<String, NotificationError> {
        let template = self
            .get(id)
            .ok_or_else(|| NotificationError::TemplateNotFound(id.to_string()))?;

        let mut out = String::with_capacity(template.body.len());
        for segment in segments(&template.body) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = data.get(name).ok_or_else(|| NotificationError::MissingVariable {
                        template: id.to_string(),
                        variable: name.to_string(),
                    })?;
                    out.push_str(&display(value));
                }
            }
        }
        Ok(out)
    }
}
