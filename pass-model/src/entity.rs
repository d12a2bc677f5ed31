use crate::adapter::{is_empty_value, is_server_managed};
use crate::error::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use url::Url;

/// Relationship field name -> URIs of the resources referencing an entity
/// through that field.
pub type IncomingLinks = HashMap<String, HashSet<Url>>;

/// A resource held in the repository.
///
/// `id` is `None` until the entity has been created; the repository assigns it
/// and it never changes afterwards. `version_tag` is the concurrency token from
/// the last read and is never part of the wire document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Url>,
    #[serde(rename = "@type")]
    pub entity_type: String,
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip)]
    pub version_tag: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// Creates an unpersisted entity of the given type with no attributes.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            id: None,
            entity_type: entity_type.into(),
            context: None,
            version_tag: None,
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.attributes.insert(field.to_string(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.attributes.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Extract a string attribute.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(Value::as_str)
    }

    /// Extract a single URI attribute. Returns `None` if absent or not a URI.
    pub fn get_uri(&self, field: &str) -> Option<Url> {
        self.get_str(field).and_then(|s| Url::parse(s).ok())
    }

    /// Extract a multi-valued URI attribute. A single string value is treated
    /// as a one-element list; entries that do not parse are dropped.
    pub fn get_uris(&self, field: &str) -> Vec<Url> {
        match self.attributes.get(field) {
            Some(Value::String(s)) => Url::parse(s).into_iter().collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| Url::parse(s).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Converts a typed record into an entity. An `@id` key in the serialized
    /// record becomes the entity id; `@type` and `@context` keys are dropped in
    /// favour of `entity_type`.
    pub fn from_record<T: Serialize>(entity_type: &str, record: &T) -> ModelResult<Self> {
        let value = serde_json::to_value(record).map_err(|e| ModelError::Encode(e.to_string()))?;
        let Value::Object(mut attributes) = value else {
            return Err(ModelError::Encode(format!(
                "{entity_type} record did not serialize to a JSON object"
            )));
        };

        let id = match attributes.remove("@id") {
            Some(Value::String(s)) => {
                Some(Url::parse(&s).map_err(|e| ModelError::Encode(format!("bad @id {s}: {e}")))?)
            }
            _ => None,
        };
        attributes.remove("@type");
        let context = attributes.remove("@context").filter(|v| !v.is_null());

        Ok(Self {
            id,
            entity_type: entity_type.to_string(),
            context,
            version_tag: None,
            attributes,
        })
    }

    /// Converts the entity into a typed record. The record sees `@id` and
    /// `@type` alongside the attributes.
    pub fn to_record<T: DeserializeOwned>(&self) -> ModelResult<T> {
        let mut object = self.attributes.clone();
        if let Some(id) = &self.id {
            object.insert("@id".to_string(), Value::String(id.to_string()));
        }
        object.insert("@type".to_string(), Value::String(self.entity_type.clone()));
        serde_json::from_value(Value::Object(object)).map_err(|e| ModelError::Decode(e.to_string()))
    }

    /// Compares the caller-settable content of two entities: type, id and
    /// attributes. Empty values and server-managed keys are ignored, and
    /// multi-valued attributes compare without regard to order.
    pub fn same_fields(&self, other: &Entity) -> bool {
        self.entity_type == other.entity_type
            && self.id == other.id
            && settable_fields(&self.attributes) == settable_fields(&other.attributes)
    }
}

fn settable_fields(attributes: &Map<String, Value>) -> HashMap<&str, Value> {
    attributes
        .iter()
        .filter(|(key, value)| !is_server_managed(key) && !is_empty_value(value))
        .map(|(key, value)| (key.as_str(), unordered(value)))
        .collect()
}

fn unordered(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(unordered).collect();
            items.sort_by_key(|item| item.to_string());
            Value::Array(items)
        }
        other => other.clone(),
    }
}
