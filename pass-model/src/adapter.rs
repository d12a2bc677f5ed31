//! Conversion between [`Entity`] and the repository's wire document.

use crate::entity::Entity;
use crate::error::{ModelError, ModelResult};
use serde_json::{Map, Value};

/// Key prefixes of triples the repository computes itself.
const SERVER_MANAGED_PREFIXES: &[&str] = &[
    "fedora:",
    "ldp:",
    "premis:",
    "http://fedora.info/definitions/",
    "http://www.w3.org/ns/ldp#",
    "http://www.loc.gov/premis/rdf/v1#",
];

/// Compacted names of server-managed properties.
const SERVER_MANAGED_KEYS: &[&str] = &["created", "createdBy", "lastModified", "lastModifiedBy"];

/// Returns true if `key` names a property the repository manages. Such keys
/// must never appear in a client-submitted body.
pub fn is_server_managed(key: &str) -> bool {
    SERVER_MANAGED_KEYS.contains(&key)
        || SERVER_MANAGED_PREFIXES
            .iter()
            .any(|prefix| key.starts_with(prefix))
}

pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// The two-way contract between an entity and its wire document.
///
/// One adapter is bound per entity type in the
/// [`TypeRegistry`](crate::TypeRegistry).
pub trait FormatAdapter: Send + Sync {
    /// Writes the entity as a request body, omitting empty values and
    /// server-managed fields.
    fn encode(&self, entity: &Entity) -> ModelResult<Vec<u8>>;

    /// Reads a response body into an entity.
    fn decode(&self, document: &[u8]) -> ModelResult<Entity>;

    /// Reads the response body fetched from `id`. When the document
    /// describes several nodes, the node for `id` is decoded.
    fn decode_resource(&self, document: &[u8], id: &str) -> ModelResult<Entity> {
        let _ = id;
        self.decode(document)
    }
}

/// Compacted JSON-LD codec.
#[derive(Debug, Clone, Default)]
pub struct JsonLdAdapter {
    context: Option<String>,
}

impl JsonLdAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter that writes `@context` on every document whose entity carries
    /// no context of its own.
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
        }
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Builds the JSON object for `entity` without serializing it.
    pub fn to_document(&self, entity: &Entity) -> ModelResult<Map<String, Value>> {
        if entity.entity_type.is_empty() {
            return Err(ModelError::Encode("entity has no type".to_string()));
        }

        let mut document = Map::new();
        match (&entity.context, &self.context) {
            (Some(own), _) if !is_empty_value(own) => {
                document.insert("@context".to_string(), own.clone());
            }
            (_, Some(default)) => {
                document.insert("@context".to_string(), Value::String(default.clone()));
            }
            _ => {}
        }
        if let Some(id) = &entity.id {
            document.insert("@id".to_string(), Value::String(id.to_string()));
        }
        document.insert(
            "@type".to_string(),
            Value::String(entity.entity_type.clone()),
        );

        for (key, value) in &entity.attributes {
            if key.starts_with('@') || is_server_managed(key) || is_empty_value(value) {
                continue;
            }
            document.insert(key.clone(), value.clone());
        }
        Ok(document)
    }
}

impl FormatAdapter for JsonLdAdapter {
    fn encode(&self, entity: &Entity) -> ModelResult<Vec<u8>> {
        let document = self.to_document(entity)?;
        serde_json::to_vec(&Value::Object(document)).map_err(|e| ModelError::Encode(e.to_string()))
    }

    fn decode(&self, document: &[u8]) -> ModelResult<Entity> {
        self.decode_node(document, None)
    }

    fn decode_resource(&self, document: &[u8], id: &str) -> ModelResult<Entity> {
        self.decode_node(document, Some(id))
    }
}

impl JsonLdAdapter {
    /// Decodes the node for `subject`, which defaults to the document's own
    /// `@id`. Without a matching `@graph` node the first typed one is used.
    fn decode_node(&self, document: &[u8], subject: Option<&str>) -> ModelResult<Entity> {
        let raw: Value =
            serde_json::from_slice(document).map_err(|e| ModelError::Decode(e.to_string()))?;
        let Value::Object(mut root) = raw else {
            return Err(ModelError::Decode("document is not a JSON object".to_string()));
        };

        let mut node = match root.remove("@graph") {
            Some(Value::Array(nodes)) => {
                let context = root.remove("@context");
                let subject = subject
                    .map(str::to_string)
                    .or_else(|| root.get("@id").and_then(Value::as_str).map(str::to_string));
                let mut typed: Vec<Map<String, Value>> = nodes
                    .into_iter()
                    .filter_map(|n| match n {
                        Value::Object(map) if map.contains_key("@type") => Some(map),
                        _ => None,
                    })
                    .collect();
                let position = subject
                    .and_then(|s| {
                        typed
                            .iter()
                            .position(|n| n.get("@id").and_then(Value::as_str) == Some(s.as_str()))
                    })
                    .unwrap_or(0);
                if typed.is_empty() {
                    return Err(ModelError::Decode("@graph has no typed node".to_string()));
                }
                let mut node = typed.swap_remove(position);
                if let Some(context) = context {
                    node.entry("@context").or_insert(context);
                }
                node
            }
            _ => root,
        };

        let entity_type = match node.remove("@type") {
            Some(Value::String(t)) => t,
            Some(Value::Array(types)) => pick_entity_type(&types)
                .ok_or_else(|| ModelError::Decode("@type array has no string".to_string()))?,
            _ => return Err(ModelError::Decode("document has no @type".to_string())),
        };
        node.insert("@type".to_string(), Value::String(entity_type));

        serde_json::from_value(Value::Object(node)).map_err(|e| ModelError::Decode(e.to_string()))
    }
}

/// Prefers a compact (non-namespaced) type over repository types.
fn pick_entity_type(types: &[Value]) -> Option<String> {
    let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
    names
        .iter()
        .find(|t| !t.contains(':'))
        .or_else(|| names.first())
        .map(|t| t.to_string())
}
