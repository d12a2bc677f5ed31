//! Core entity model for the PASS data client.
//!
//! Defines the types the CRUD, crawler and search clients depend on:
//! - [`Entity`]: the generic record (id, type, version tag, JSON attributes)
//! - [`TypeRegistry`]: maps a type tag to its container and codec
//! - [`FormatAdapter`]: the encode/decode pair between an entity and the wire
//!   document; [`JsonLdAdapter`] is the default compacted JSON-LD codec
//!
//! Typed domain records (a `Grant` struct, say) convert to and from [`Entity`]
//! through serde with [`Entity::from_record`] and [`Entity::to_record`].

mod adapter;
mod entity;
mod error;
mod registry;

pub use adapter::{FormatAdapter, JsonLdAdapter, is_server_managed};
pub use entity::{Entity, IncomingLinks};
pub use error::{ModelError, ModelResult};
pub use registry::{
    BASE_ENTITY_TYPE, PASS_ENTITY_TYPES, TypeBinding, TypeRegistry, container_name,
};

/// Re-exported so callers do not need a direct `url` dependency.
pub use url::Url;
