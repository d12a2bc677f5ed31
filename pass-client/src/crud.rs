//! Create, read, update and delete against the resource store.
//!
//! Entities are exchanged as compacted JSON-LD. Every read records the
//! response `ETag` as the entity's version tag, and every update sends it back
//! as `If-Match`, so a write based on a stale read fails with
//! [`ClientError::Conflict`] instead of silently replacing newer data.

use crate::config::RepositoryConfig;
use crate::crawler::{
    ContainerSource, CrawlRule, NodeDescription, RepositoryCrawler, Visitor, acls, depth,
    pure_containers,
};
use crate::error::{ClientError, ClientResult};
use crate::graph;
use async_trait::async_trait;
use pass_model::{Entity, IncomingLinks, ModelError, TypeBinding, TypeRegistry, Url};
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_MATCH, LOCATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

const JSONLD_CONTENT_TYPE: &str = "application/ld+json; charset=utf-8";
const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json; charset=utf-8";
const COMPACTED_ACCEPT: &str = "application/ld+json";
const OCTET_STREAM: &str = "application/octet-stream";
const SERVER_MANAGED: &str = "http://fedora.info/definitions/v4/repository#ServerManaged";
const INBOUND_REFERENCES: &str = "http://fedora.info/definitions/v4/repository#InboundReferences";
const PREFER_CONTAINMENT: &str = "http://www.w3.org/ns/ldp#PreferContainment";
const PREFER_LENIENT: &str = "handling=lenient; received=\"minimal\"";
const PREFER: &str = "Prefer";
const SLUG: &str = "Slug";
const DIGEST: &str = "Digest";
const WEAK_ETAG_PREFIX: &str = "W/";
const DEFAULT_USER_AGENT: &str = concat!("pass-client/", env!("CARGO_PKG_VERSION"));

fn prefer_omit_server_managed() -> String {
    format!("return=representation; omit=\"{SERVER_MANAGED}\"")
}

/// Strips every weak-validator marker so tags compare equal whether or not
/// the store marks them weak.
pub fn normalize_etag(raw: &str) -> String {
    raw.replace(WEAK_ETAG_PREFIX, "")
}

/// How [`ResourceCrudClient::update`] writes an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Merge-patch: fields absent from the entity keep their stored values.
    #[default]
    Patch,
    /// Full replacement: fields absent from the entity are removed.
    Overwrite,
}

/// Fixity value sent with an upload as a `Digest` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentDigest {
    Sha256(String),
    Sha1(String),
    Md5(String),
}

impl ContentDigest {
    /// Hex sha-256 of `content`.
    pub fn sha256_of(content: &[u8]) -> Self {
        ContentDigest::Sha256(hex::encode(Sha256::digest(content)))
    }

    pub fn header_value(&self) -> String {
        match self {
            ContentDigest::Sha256(v) => format!("sha256={v}"),
            ContentDigest::Sha1(v) => format!("sha1={v}"),
            ContentDigest::Md5(v) => format!("md5={v}"),
        }
    }
}

/// Optional headers for [`ResourceCrudClient::upload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadParams {
    /// Defaults to `application/octet-stream`.
    pub content_type: Option<String>,
    /// Suggested name for the new resource.
    pub slug: Option<String>,
    pub digest: Option<ContentDigest>,
    pub filename: Option<String>,
}

/// Resource store client.
///
/// Cheap to clone: clones share the connection pool and type registry.
#[derive(Debug, Clone)]
pub struct ResourceCrudClient {
    client: Client,
    registry: Arc<TypeRegistry>,
    base_url: Url,
    credentials: Option<(String, Option<String>)>,
    mode: UpdateMode,
}

impl ResourceCrudClient {
    pub fn new(
        config: &RepositoryConfig,
        registry: TypeRegistry,
        mode: UpdateMode,
    ) -> ClientResult<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .user_agent(user_agent)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            registry: Arc::new(registry),
            base_url: config.base_url()?,
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
            mode,
        })
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let builder = self.client.request(method, url.clone());
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_ref()),
            None => builder,
        }
    }

    fn binding(&self, entity_type: &str) -> ClientResult<&TypeBinding> {
        self.registry.binding(entity_type).map_err(|e| match e {
            ModelError::UnknownType(t) => {
                ClientError::Validation(format!("{t} is not a registered entity type"))
            }
            ModelError::InvalidType(msg) => ClientError::Validation(msg),
            other => other.into(),
        })
    }

    /// Creates `entity` in its type's container and returns the new id.
    pub async fn create(&self, entity: &Entity) -> ClientResult<Url> {
        let created = self.create_internal(entity).await?;
        created.id.ok_or_else(|| ClientError::Request {
            status: None,
            message: "create response carried no resource id".to_string(),
        })
    }

    /// Creates `entity` and returns it as stored, with id and version tag.
    pub async fn create_and_read(&self, entity: &Entity) -> ClientResult<Entity> {
        self.create_internal(entity).await
    }

    async fn create_internal(&self, entity: &Entity) -> ClientResult<Entity> {
        if let Some(id) = &entity.id {
            return Err(ClientError::Validation(format!(
                "cannot create an entity that already has an id ({id})"
            )));
        }
        let binding = self.binding(&entity.entity_type)?;
        let body = binding.codec.encode(entity)?;

        debug!("Creating {} in {}", entity.entity_type, binding.container);
        let response = self
            .request(Method::POST, &binding.container)
            .header(CONTENT_TYPE, JSONLD_CONTENT_TYPE)
            .header(ACCEPT, COMPACTED_ACCEPT)
            .header(PREFER, prefer_omit_server_managed())
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::transport("create request failed", e))?;
        let response = check_status(response, "create").await?;

        let status = response.status();
        let location = header_url(&response, LOCATION.as_str());
        let version_tag = response_etag(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport("failed to read create response", e))?;

        let mut created = if bytes.iter().all(u8::is_ascii_whitespace) {
            entity.clone()
        } else {
            binding.codec.decode(&bytes)?
        };
        if created.id.is_none() {
            created.id = location;
        }
        created.version_tag = version_tag;

        info!(
            "Creation status and location: {}: {}",
            status.as_u16(),
            created.id.as_ref().map(Url::as_str).unwrap_or("<none>")
        );
        Ok(created)
    }

    /// Reads the entity at `id`, decoding it with `entity_type`'s codec.
    pub async fn read(&self, id: &Url, entity_type: &str) -> ClientResult<Entity> {
        let binding = self.binding(entity_type)?;
        let response = self
            .request(Method::GET, id)
            .header(ACCEPT, COMPACTED_ACCEPT)
            .header(PREFER, prefer_omit_server_managed())
            .send()
            .await
            .map_err(|e| ClientError::transport("read request failed", e))?;

        info!("Resource read status for {}: {}", id, response.status().as_u16());
        if is_missing(response.status()) {
            return Err(ClientError::NotFound(id.to_string()));
        }
        let response = check_status(response, "read").await?;

        let version_tag = response_etag(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport("failed to read resource body", e))?;
        let mut entity = binding.codec.decode_resource(&bytes, id.as_str())?;
        if entity.id.is_none() {
            entity.id = Some(id.clone());
        }
        entity.version_tag = version_tag;
        Ok(entity)
    }

    /// Writes `entity` back to the store.
    ///
    /// Sends the version tag as `If-Match` when the entity has one. A tag that
    /// no longer matches yields [`ClientError::Conflict`].
    pub async fn update(&self, entity: &Entity) -> ClientResult<()> {
        let Some(id) = &entity.id else {
            return Err(ClientError::Validation(
                "cannot update an entity without an id".to_string(),
            ));
        };
        let binding = self.binding(&entity.entity_type)?;
        let body = binding.codec.encode(entity)?;

        let mut request = match self.mode {
            UpdateMode::Patch => self
                .request(Method::PATCH, id)
                .header(CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE),
            UpdateMode::Overwrite => self
                .request(Method::PUT, id)
                .header(CONTENT_TYPE, JSONLD_CONTENT_TYPE)
                .header(PREFER, PREFER_LENIENT),
        };
        match &entity.version_tag {
            Some(tag) => request = request.header(IF_MATCH, tag.as_str()),
            None => warn!(
                "No version tag on {}, the update may overwrite newer changes",
                id
            ),
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::transport("update request failed", e))?;
        let status = response.status();
        info!("Resource update status for {}: {}", id, status.as_u16());

        if status == StatusCode::PRECONDITION_FAILED {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Conflict {
                id: id.to_string(),
                message: if message.is_empty() {
                    "version tag does not match the stored resource".to_string()
                } else {
                    message
                },
            });
        }
        check_status(response, "update").await?;
        Ok(())
    }

    /// Updates `entity`, then reads it back.
    pub async fn update_and_read(&self, entity: &Entity) -> ClientResult<Entity> {
        self.update(entity).await?;
        match &entity.id {
            Some(id) => self.read(id, &entity.entity_type).await,
            None => Err(ClientError::Validation(
                "cannot update an entity without an id".to_string(),
            )),
        }
    }

    pub async fn delete(&self, id: &Url) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, id)
            .send()
            .await
            .map_err(|e| ClientError::transport("delete request failed", e))?;
        info!("Resource deletion status for {}: {}", id, response.status().as_u16());
        check_status(response, "delete").await?;
        Ok(())
    }

    /// Resources that reference `id`, grouped by the referencing field.
    pub async fn get_incoming(&self, id: &Url) -> ClientResult<IncomingLinks> {
        let prefer = format!(
            "return=representation; include=\"{INBOUND_REFERENCES}\"; omit=\"{SERVER_MANAGED}\""
        );
        let response = self
            .request(Method::GET, id)
            .header(ACCEPT, COMPACTED_ACCEPT)
            .header(PREFER, prefer)
            .send()
            .await
            .map_err(|e| ClientError::transport("incoming links request failed", e))?;
        info!("Resource read status for {}: {}", id, response.status().as_u16());
        let response = check_status(response, "read incoming links").await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport("failed to read incoming links", e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(IncomingLinks::new());
        }
        let document: serde_json::Value = serde_json::from_slice(&bytes)?;
        Ok(graph::incoming_links(id, &document))
    }

    /// Posts binary content as a child of `id` and returns its location.
    pub async fn upload(
        &self,
        id: &Url,
        content: Vec<u8>,
        params: &UploadParams,
    ) -> ClientResult<Url> {
        let content_type = params.content_type.as_deref().unwrap_or(OCTET_STREAM);
        let mut request = self
            .request(Method::POST, id)
            .header(CONTENT_TYPE, content_type);
        if let Some(slug) = &params.slug {
            request = request.header(SLUG, slug.as_str());
        }
        if let Some(digest) = &params.digest {
            request = request.header(DIGEST, digest.header_value());
        }
        if let Some(filename) = &params.filename {
            request = request.header(
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            );
        }

        debug!("Uploading {} bytes to {}", content.len(), id);
        let response = request
            .body(content)
            .send()
            .await
            .map_err(|e| ClientError::transport("upload request failed", e))?;
        let response = check_status(response, "upload").await?;
        let status = response.status().as_u16();

        header_url(&response, LOCATION.as_str()).ok_or_else(|| {
            ClientError::status(status, format!("upload to {id} returned no Location header"))
        })
    }

    /// Visits every entity in the repository, or only those in the container
    /// of `entity_type`. Returns the number visited.
    pub async fn process_all_entities<V>(
        &self,
        visitor: &mut V,
        entity_type: Option<&str>,
    ) -> ClientResult<usize>
    where
        V: Visitor + ?Sized,
    {
        let (root, max_depth) = match entity_type {
            Some(t) => (self.binding(t)?.container.clone(), 1),
            None => (self.base_url.clone(), 2),
        };
        let rules = [
            CrawlRule::Ignore(pure_containers()),
            CrawlRule::Skip(depth(max_depth).or(acls())),
        ];

        let crawler = RepositoryCrawler::new(self.clone());
        let count = crawler.visit(&root, visitor, &rules).await?;
        info!("Processed {} entities under {}", count, root);
        Ok(count)
    }
}

#[async_trait]
impl ContainerSource for ResourceCrudClient {
    async fn describe(&self, uri: &Url) -> ClientResult<NodeDescription> {
        let prefer = format!("return=representation; include=\"{PREFER_CONTAINMENT}\"");
        let response = self
            .request(Method::GET, uri)
            .header(ACCEPT, COMPACTED_ACCEPT)
            .header(PREFER, prefer)
            .send()
            .await
            .map_err(|e| ClientError::transport("containment request failed", e))?;
        if is_missing(response.status()) {
            return Err(ClientError::NotFound(uri.to_string()));
        }
        let response = check_status(response, "read containment").await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport("failed to read containment", e))?;
        let document: serde_json::Value = serde_json::from_slice(&bytes)?;
        Ok(graph::node_description(uri, &document))
    }
}

fn is_missing(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

async fn check_status(response: Response, operation: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::status(
        status.as_u16(),
        format!("{operation} failed: {body}"),
    ))
}

fn response_etag(response: &Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(normalize_etag)
}

fn header_url(response: &Response, name: &str) -> Option<Url> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Url::parse(v).or_else(|_| response.url().join(v)).ok())
}
