//! Template rendering for step configuration using Tera
//!
//! Node configuration strings (API URLs, email subjects and bodies) may
//! reference earlier results, e.g. `{{ a.data.id }}` reads the `data.id`
//! field of node `a`'s payload. The whole context is also reachable as
//! `context`, which is how node ids that are not valid identifiers are
//! addressed: `{{ context["node-1"].status }}`.

use serde_json::Value;
use tera::{Context, Tera};

use crate::{Error, Result};

/// Whether `template` contains any Tera syntax at all.
pub fn is_template(template: &str) -> bool {
    template.contains("{{") || template.contains("{%")
}

/// Render a template string with the given context
pub fn render_template(template: &str, context: &Value) -> Result<String> {
    if !is_template(template) {
        return Ok(template.to_string());
    }

    let mut tera = Tera::default();
    tera.add_raw_template("template", template)
        .map_err(|e| Error::Validation(format!("Failed to parse template: {}", describe(&e))))?;

    let mut tera_context = Context::new();
    if let Value::Object(map) = context {
        for (key, value) in map {
            tera_context.insert(key.as_str(), value);
        }
    }
    tera_context.insert("context", context);

    tera.render("template", &tera_context)
        .map_err(|e| Error::Validation(format!("Failed to render template: {}", describe(&e))))
}

/// Tera reports the cause (e.g. the missing variable) in the source chain,
/// not in the top-level message.
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
