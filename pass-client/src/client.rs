//! The [`PassClient`] facade: one handle for repository and index access.

use crate::config::ClientConfig;
use crate::crawler::Visitor;
use crate::crud::{ResourceCrudClient, UpdateMode, UploadParams};
use crate::error::ClientResult;
use crate::index::{IndexClient, SearchCriteria, SearchValue};
use pass_model::{Entity, IncomingLinks, PASS_ENTITY_TYPES, TypeRegistry, Url};
use std::collections::HashSet;
use tracing::debug;

/// Repository and search client.
///
/// The update mode is fixed when the client is built, from
/// [`ClientConfig::overwrite_on_update`].
#[derive(Debug, Clone)]
pub struct PassClient {
    crud: ResourceCrudClient,
    index: IndexClient,
}

impl PassClient {
    pub fn new(config: &ClientConfig, registry: TypeRegistry) -> ClientResult<Self> {
        let mode = if config.overwrite_on_update {
            UpdateMode::Overwrite
        } else {
            UpdateMode::Patch
        };
        debug!(
            "Building client for {} with {:?} updates",
            config.repository.base_url, mode
        );
        Ok(Self {
            crud: ResourceCrudClient::new(&config.repository, registry, mode)?,
            index: IndexClient::new(&config.index)?,
        })
    }

    /// Client for every PASS entity type, configured from the environment.
    pub fn from_env() -> ClientResult<Self> {
        let config = ClientConfig::from_env();
        let registry = config.repository.registry(PASS_ENTITY_TYPES)?;
        Self::new(&config, registry)
    }

    pub fn crud(&self) -> &ResourceCrudClient {
        &self.crud
    }

    pub fn index(&self) -> &IndexClient {
        &self.index
    }

    pub async fn create_resource(&self, entity: &Entity) -> ClientResult<Url> {
        self.crud.create(entity).await
    }

    pub async fn create_and_read_resource(&self, entity: &Entity) -> ClientResult<Entity> {
        self.crud.create_and_read(entity).await
    }

    pub async fn read_resource(&self, id: &Url, entity_type: &str) -> ClientResult<Entity> {
        self.crud.read(id, entity_type).await
    }

    pub async fn update_resource(&self, entity: &Entity) -> ClientResult<()> {
        self.crud.update(entity).await
    }

    pub async fn update_and_read_resource(&self, entity: &Entity) -> ClientResult<Entity> {
        self.crud.update_and_read(entity).await
    }

    pub async fn delete_resource(&self, id: &Url) -> ClientResult<()> {
        self.crud.delete(id).await
    }

    pub async fn get_incoming(&self, id: &Url) -> ClientResult<IncomingLinks> {
        self.crud.get_incoming(id).await
    }

    pub async fn upload(
        &self,
        id: &Url,
        content: Vec<u8>,
        params: &UploadParams,
    ) -> ClientResult<Url> {
        self.crud.upload(id, content, params).await
    }

    pub async fn find_by_attribute(
        &self,
        entity_type: &str,
        attribute: &str,
        value: impl Into<SearchValue>,
    ) -> ClientResult<Option<Url>> {
        self.index.find_one(entity_type, attribute, value).await
    }

    pub async fn find_all_by_attribute(
        &self,
        entity_type: &str,
        attribute: &str,
        value: impl Into<SearchValue>,
    ) -> ClientResult<HashSet<Url>> {
        self.index
            .find_all(entity_type, attribute, value, None, None)
            .await
    }

    pub async fn find_all_by_attribute_paged(
        &self,
        entity_type: &str,
        attribute: &str,
        value: impl Into<SearchValue>,
        limit: usize,
        offset: usize,
    ) -> ClientResult<HashSet<Url>> {
        self.index
            .find_all(entity_type, attribute, value, Some(limit), Some(offset))
            .await
    }

    pub async fn find_all_by_attributes(
        &self,
        entity_type: &str,
        criteria: &SearchCriteria,
    ) -> ClientResult<HashSet<Url>> {
        self.index.find_all_by_attributes(entity_type, criteria).await
    }

    pub async fn find_all_by_attributes_paged(
        &self,
        entity_type: &str,
        criteria: &SearchCriteria,
        limit: usize,
        offset: usize,
    ) -> ClientResult<HashSet<Url>> {
        let criteria = criteria.clone().with_limit(limit).with_offset(offset);
        self.index
            .find_all_by_attributes(entity_type, &criteria)
            .await
    }

    pub async fn process_all_entities<V>(
        &self,
        visitor: &mut V,
        entity_type: Option<&str>,
    ) -> ClientResult<usize>
    where
        V: Visitor + ?Sized,
    {
        self.crud.process_all_entities(visitor, entity_type).await
    }
}
