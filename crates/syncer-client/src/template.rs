//! Upstream-creation templates
//!
//! Templates carry `{{.Name}}` and `{{.Nodes}}` placeholders that are filled
//! with the upstream name and the JSON-encoded member map.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.(?P<field>Name|Nodes)\s*\}\}").expect("placeholder pattern is valid")
});

/// Fill the placeholders of `template`
pub fn render(template: &str, name: &str, nodes: &str) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match &caps["field"] {
            "Name" => name.to_string(),
            _ => nodes.to_string(),
        })
        .into_owned()
}
