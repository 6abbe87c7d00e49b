//! JSON-LD blocks embedded in product pages.

use scraper::{Html, Selector};
use serde_json::Value;

/// Types whose `name`/`description` describe something other than the page.
const IGNORED_TYPES: &[&str] = &["Organization", "WebSite", "BreadcrumbList", "SearchAction", "SiteNavigationElement"];

fn has_type(node: &Value, wanted: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t == wanted,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(wanted)),
        _ => false,
    }
}

fn flatten(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| flatten(item, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten(graph, out);
            }
            if !map.is_empty() {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// Parse every `application/ld+json` script into a flat list of nodes.
///
/// `Product` nodes come first; site-level nodes are dropped. Blocks that are
/// not valid JSON are ignored.
pub fn collect_nodes(doc: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return Vec::new();
    };

    let mut nodes = Vec::new();
    for script in doc.select(&selector) {
        let text = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
            flatten(value, &mut nodes);
        }
    }

    nodes.retain(|node| !IGNORED_TYPES.iter().any(|t| has_type(node, t)));
    nodes.sort_by_key(|node| !has_type(node, "Product"));
    nodes
}

/// Render a JSON-LD value as display text.
///
/// Objects yield their `name`, `url` or `@value`; arrays their first usable
/// entry; numbers their decimal form.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["name", "url", "@value", "contentUrl"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(value_text),
        Value::Array(items) => items.iter().find_map(value_text),
        _ => None,
    }
}

/// Follow `path` through `node`, descending into the first array element
/// that carries the next key.
pub fn lookup<'a>(node: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = node;
    for key in path {
        current = match current {
            Value::Array(items) => items.iter().find_map(|item| item.get(key))?,
            other => other.get(key)?,
        };
    }
    Some(current)
}
