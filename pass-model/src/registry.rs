//! Explicit per-type dispatch: type tag -> container and codec.

use crate::adapter::{FormatAdapter, JsonLdAdapter};
use crate::error::{ModelError, ModelResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Type tag of the abstract base entity. It names no concrete resource and can
/// be neither registered nor searched.
pub const BASE_ENTITY_TYPE: &str = "PassEntity";

/// The standard PASS entity types.
pub const PASS_ENTITY_TYPES: &[&str] = &[
    "Contributor",
    "Deposit",
    "File",
    "Funder",
    "Grant",
    "Journal",
    "Policy",
    "Publication",
    "Publisher",
    "Repository",
    "RepositoryCopy",
    "Submission",
    "SubmissionEvent",
    "User",
];

/// Default container segment for a type: lower camel case, pluralized.
///
/// `Grant` -> `grants`, `Policy` -> `policies`, `RepositoryCopy` -> `repositoryCopies`.
pub fn container_name(entity_type: &str) -> String {
    let mut chars = entity_type.chars();
    let mut name = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => return String::new(),
    };

    let consonant_y = name.ends_with('y')
        && name
            .chars()
            .rev()
            .nth(1)
            .is_some_and(|c| !"aeiouAEIOU".contains(c));
    if consonant_y {
        name.pop();
        name.push_str("ies");
    } else if name.ends_with('s') || name.ends_with('x') || name.ends_with("ch") {
        name.push_str("es");
    } else {
        name.push('s');
    }
    name
}

/// Where entities of one type live and how they are encoded.
#[derive(Clone)]
pub struct TypeBinding {
    pub container: Url,
    pub codec: Arc<dyn FormatAdapter>,
}

impl fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinding")
            .field("container", &self.container.as_str())
            .finish_non_exhaustive()
    }
}

/// Maps type tags to their [`TypeBinding`].
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    bindings: HashMap<String, TypeBinding>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `entity_type` with the default [`JsonLdAdapter`].
    pub fn register(&mut self, entity_type: &str, container: Url) -> ModelResult<()> {
        self.register_with_codec(entity_type, container, Arc::new(JsonLdAdapter::new()))
    }

    /// Registers `entity_type` with an explicit codec. Re-registering a type
    /// replaces its binding.
    pub fn register_with_codec(
        &mut self,
        entity_type: &str,
        container: Url,
        codec: Arc<dyn FormatAdapter>,
    ) -> ModelResult<()> {
        check_type(entity_type)?;
        self.bindings
            .insert(entity_type.to_string(), TypeBinding { container, codec });
        Ok(())
    }

    pub fn binding(&self, entity_type: &str) -> ModelResult<&TypeBinding> {
        check_type(entity_type)?;
        self.bindings
            .get(entity_type)
            .ok_or_else(|| ModelError::UnknownType(entity_type.to_string()))
    }

    pub fn container(&self, entity_type: &str) -> ModelResult<&Url> {
        self.binding(entity_type).map(|b| &b.container)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.bindings.contains_key(entity_type)
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn check_type(entity_type: &str) -> ModelResult<()> {
    if entity_type.trim().is_empty() {
        return Err(ModelError::InvalidType("type cannot be empty".to_string()));
    }
    if entity_type == BASE_ENTITY_TYPE {
        return Err(ModelError::InvalidType(format!(
            "type cannot be the abstract {BASE_ENTITY_TYPE}"
        )));
    }
    Ok(())
}
