//! Reads the JSON-LD shapes the repository returns for containment and
//! inbound-reference requests.

use crate::crawler::NodeDescription;
use pass_model::{IncomingLinks, Url};
use serde_json::{Map, Value};
use tracing::debug;

const CONTAINS_KEYS: &[&str] = &["contains", "ldp:contains", "http://www.w3.org/ns/ldp#contains"];

/// Groups every `@graph` node other than `self_id` by the fields it holds.
///
/// A node `{"@id": "a", "submission": ..., "grant": ...}` records `a` under both
/// `submission` and `grant`. Nodes without a usable `@id` are ignored.
pub(crate) fn incoming_links(self_id: &Url, document: &Value) -> IncomingLinks {
    let mut links = IncomingLinks::new();
    let Some(graph) = document.get("@graph").and_then(Value::as_array) else {
        return links;
    };

    for node in graph.iter().filter_map(Value::as_object) {
        let Some(id) = node.get("@id").and_then(Value::as_str) else {
            continue;
        };
        if id == self_id.as_str() {
            continue;
        }
        let source = match Url::parse(id) {
            Ok(source) => source,
            Err(e) => {
                debug!("Ignoring graph node with invalid @id {}: {}", id, e);
                continue;
            }
        };

        for field in node.keys().filter(|k| k.as_str() != "@id") {
            links
                .entry(field.clone())
                .or_default()
                .insert(source.clone());
        }
    }
    links
}

/// Extracts the types and contained children of the node `uri`.
///
/// The node may be the document itself or one of its `@graph` entries.
pub(crate) fn node_description(uri: &Url, document: &Value) -> NodeDescription {
    let Some(node) = find_node(uri, document) else {
        return NodeDescription::default();
    };

    let types = match node.get("@type") {
        Some(Value::String(t)) => vec![t.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    let mut children = Vec::new();
    for key in CONTAINS_KEYS {
        match node.get(*key) {
            Some(Value::Array(items)) => children.extend(items.iter().filter_map(child_uri)),
            Some(value) => children.extend(child_uri(value)),
            None => {}
        }
    }

    NodeDescription { types, children }
}

fn find_node<'a>(uri: &Url, document: &'a Value) -> Option<&'a Map<String, Value>> {
    if let Some(graph) = document.get("@graph").and_then(Value::as_array) {
        let nodes: Vec<&Map<String, Value>> = graph.iter().filter_map(Value::as_object).collect();
        return nodes
            .iter()
            .find(|n| n.get("@id").and_then(Value::as_str) == Some(uri.as_str()))
            .or_else(|| nodes.iter().find(|n| n.contains_key("@type")))
            .copied();
    }
    document.as_object()
}

fn child_uri(value: &Value) -> Option<Url> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(o) => o.get("@id").and_then(Value::as_str)?,
        _ => return None,
    };
    Url::parse(raw).ok()
}
