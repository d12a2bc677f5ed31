//! Client configuration.
//!
//! Every setting has a default and can be overridden from the environment with
//! the `from_env` constructors. Blank environment values are ignored.

use crate::error::{ClientError, ClientResult};
use pass_model::{JsonLdAdapter, TypeRegistry, Url, container_name};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_FEDORA_BASE_URL: &str = "http://localhost:8080/fcrepo/rest/";
pub const DEFAULT_JSONLD_CONTEXT: &str =
    "https://oa-pass.github.io/pass-data-model/src/main/resources/context-3.4.jsonld";
pub const DEFAULT_INDEX_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX_NAME: &str = "pass";
pub const DEFAULT_INDEX_LIMIT: usize = 200;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const ENV_FEDORA_BASE_URL: &str = "PASS_FEDORA_BASEURL";
pub const ENV_FEDORA_USER: &str = "PASS_FEDORA_USER";
pub const ENV_FEDORA_PASSWORD: &str = "PASS_FEDORA_PASSWORD";
pub const ENV_JSONLD_CONTEXT: &str = "PASS_JSONLD_CONTEXT";
pub const ENV_HTTP_AGENT: &str = "HTTP_AGENT";
pub const ENV_INDEX_URL: &str = "PASS_ELASTICSEARCH_URL";
pub const ENV_INDEX_NAMES: &str = "PASS_ELASTICSEARCH_INDICES";
pub const ENV_INDEX_LIMIT: &str = "PASS_ELASTICSEARCH_LIMIT";
pub const ENV_OVERWRITE_ON_UPDATE: &str = "PASS_CLIENT_OVERWRITE";

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resource store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository root, e.g. `http://localhost:8080/fcrepo/rest/`.
    pub base_url: String,
    /// Basic auth user. No `Authorization` header is sent when unset.
    pub username: Option<String>,
    pub password: Option<String>,
    /// `@context` written on every encoded entity.
    pub jsonld_context: Option<String>,
    /// Replaces the default `User-Agent`.
    pub user_agent: Option<String>,
    /// Per-request timeout. `0` disables it.
    pub request_timeout_secs: u64,
    /// Per-type container overrides: an absolute URL, or a path relative to
    /// `base_url`.
    pub containers: HashMap<String, String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEDORA_BASE_URL.to_string(),
            username: None,
            password: None,
            jsonld_context: Some(DEFAULT_JSONLD_CONTEXT.to_string()),
            user_agent: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            containers: HashMap::new(),
        }
    }
}

impl RepositoryConfig {
    /// Defaults overridden by the `PASS_FEDORA_*`, `PASS_JSONLD_CONTEXT` and
    /// `HTTP_AGENT` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_value(ENV_FEDORA_BASE_URL).unwrap_or(defaults.base_url),
            username: env_value(ENV_FEDORA_USER),
            password: env_value(ENV_FEDORA_PASSWORD),
            jsonld_context: env_value(ENV_JSONLD_CONTEXT).or(defaults.jsonld_context),
            user_agent: env_value(ENV_HTTP_AGENT),
            ..defaults
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        request_timeout(self.request_timeout_secs)
    }

    /// The repository root, always ending in `/`.
    pub fn base_url(&self) -> ClientResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw)
            .map_err(|e| ClientError::Config(format!("invalid base url {raw}: {e}")))
    }

    /// The container URI for `entity_type`.
    pub fn container_for(&self, entity_type: &str) -> ClientResult<Url> {
        let base = self.base_url()?;
        let path = self
            .containers
            .get(entity_type)
            .cloned()
            .unwrap_or_else(|| container_name(entity_type));
        base.join(&path).map_err(|e| {
            ClientError::Config(format!("invalid container {path} for {entity_type}: {e}"))
        })
    }

    /// Builds a registry binding each type to its container and a
    /// [`JsonLdAdapter`] carrying the configured context.
    pub fn registry(&self, entity_types: &[&str]) -> ClientResult<TypeRegistry> {
        let adapter = Arc::new(match &self.jsonld_context {
            Some(context) => JsonLdAdapter::with_context(context.clone()),
            None => JsonLdAdapter::new(),
        });

        let mut registry = TypeRegistry::new();
        for entity_type in entity_types {
            let container = self.container_for(entity_type)?;
            debug!("Container for {}: {}", entity_type, container);
            registry.register_with_codec(entity_type, container, adapter.clone())?;
        }
        Ok(registry)
    }
}

/// Search index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index hosts, tried in order.
    pub hosts: Vec<String>,
    /// Indices searched by every query.
    pub indices: Vec<String>,
    /// Result limit used when the caller gives none.
    pub default_limit: usize,
    /// Per-request timeout. `0` disables it.
    pub request_timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            hosts: vec![DEFAULT_INDEX_URL.to_string()],
            indices: vec![DEFAULT_INDEX_NAME.to_string()],
            default_limit: DEFAULT_INDEX_LIMIT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl IndexConfig {
    /// Defaults overridden by the `PASS_ELASTICSEARCH_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let hosts = env_value(ENV_INDEX_URL)
            .map(|v| split_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.hosts);
        let indices = env_value(ENV_INDEX_NAMES)
            .map(|v| split_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.indices);
        let default_limit = env_value(ENV_INDEX_LIMIT)
            .map(|v| parse_limit(&v))
            .unwrap_or(defaults.default_limit);

        Self {
            hosts,
            indices,
            default_limit,
            ..defaults
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        request_timeout(self.request_timeout_secs)
    }

    /// Parsed host URLs.
    pub fn host_urls(&self) -> ClientResult<Vec<Url>> {
        if self.hosts.is_empty() {
            return Err(ClientError::Config("no index hosts configured".to_string()));
        }
        self.hosts
            .iter()
            .map(|host| {
                Url::parse(host)
                    .map_err(|e| ClientError::Config(format!("invalid index host {host}: {e}")))
            })
            .collect()
    }
}

fn request_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Parses a result limit, falling back to the default for negative or
/// non-numeric input.
pub fn parse_limit(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(limit) if limit >= 0 => limit as usize,
        Ok(limit) => {
            warn!(
                "Index limit {} is negative, using default limit of {}",
                limit, DEFAULT_INDEX_LIMIT
            );
            DEFAULT_INDEX_LIMIT
        }
        Err(e) => {
            warn!(
                "Index limit '{}' is not an integer ({}), using default limit of {}",
                raw, e, DEFAULT_INDEX_LIMIT
            );
            DEFAULT_INDEX_LIMIT
        }
    }
}

/// Settings for the [`PassClient`](crate::PassClient) facade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub repository: RepositoryConfig,
    pub index: IndexConfig,
    /// Use full-replacement PUT instead of merge-patch PATCH for every update.
    /// Fixed for the lifetime of the client.
    pub overwrite_on_update: bool,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let overwrite_on_update = env_value(ENV_OVERWRITE_ON_UPDATE)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        Self {
            repository: RepositoryConfig::from_env(),
            index: IndexConfig::from_env(),
            overwrite_on_update,
        }
    }
}
