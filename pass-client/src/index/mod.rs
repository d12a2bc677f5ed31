//! Attribute search against the Elasticsearch index.
//!
//! Every search is an exact, case-insensitive match on one or more attributes
//! within a single entity type, and returns entity ids only.
//!
//! The index is fed from the repository asynchronously, so a resource
//! written a moment ago may not be found yet. Callers that need
//! read-your-writes must poll; the client never retries on empty results.

mod query;

pub use query::{SearchCriteria, SearchValue};

use crate::config::IndexConfig;
use crate::error::{ClientError, ClientResult};
use pass_model::Url;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    total: Option<Value>,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

impl SearchHits {
    /// Total matches as reported by the index, falling back to the page size.
    fn total(&self) -> usize {
        let reported = match &self.total {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::Object(o)) => o.get("value").and_then(Value::as_u64),
            _ => None,
        };
        reported
            .map(|n| n as usize)
            .unwrap_or(self.hits.len())
            .max(self.hits.len())
    }
}

/// Search index client.
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: Client,
    hosts: Vec<Url>,
    indices: Vec<String>,
    default_limit: usize,
}

impl IndexClient {
    pub fn new(config: &IndexConfig) -> ClientResult<Self> {
        if config.indices.is_empty() {
            return Err(ClientError::Config("no index names configured".to_string()));
        }
        let hosts = config
            .host_urls()?
            .into_iter()
            .map(|mut host| {
                if !host.path().ends_with('/') {
                    let path = format!("{}/", host.path());
                    host.set_path(&path);
                }
                host
            })
            .collect();
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            hosts,
            indices: config.indices.clone(),
            default_limit: config.default_limit,
        })
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// The id of the single `entity_type` whose `attribute` equals `value`.
    ///
    /// Returns `None` when nothing matches and
    /// [`ClientError::MultipleMatches`] when more than one document does.
    pub async fn find_one(
        &self,
        entity_type: &str,
        attribute: &str,
        value: impl Into<SearchValue>,
    ) -> ClientResult<Option<Url>> {
        let value = value.into();
        let criteria = SearchCriteria::new().with(attribute, value.clone());
        let body = query::build_query(entity_type, &criteria, 0, 2)?;
        debug!(
            "Searching for {} where {} is {}",
            entity_type,
            attribute,
            value.as_value()
        );

        let hits = self.search(&body).await?;
        let count = hits.total();
        if count > 1 {
            return Err(ClientError::MultipleMatches {
                entity_type: entity_type.to_string(),
                attribute: attribute.to_string(),
                count,
            });
        }
        Ok(hit_ids(hits).into_iter().next())
    }

    /// Ids of every `entity_type` whose `attribute` equals `value`.
    pub async fn find_all(
        &self,
        entity_type: &str,
        attribute: &str,
        value: impl Into<SearchValue>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> ClientResult<HashSet<Url>> {
        let mut criteria = SearchCriteria::new().with(attribute, value);
        if let Some(limit) = limit {
            criteria = criteria.with_limit(limit);
        }
        if let Some(offset) = offset {
            criteria = criteria.with_offset(offset);
        }
        self.find_all_by_attributes(entity_type, &criteria).await
    }

    /// Ids of every `entity_type` matching all of `criteria`.
    pub async fn find_all_by_attributes(
        &self,
        entity_type: &str,
        criteria: &SearchCriteria,
    ) -> ClientResult<HashSet<Url>> {
        let size = criteria.limit().unwrap_or(self.default_limit);
        let from = criteria.offset().unwrap_or(0);
        let body = query::build_query(entity_type, criteria, from, size)?;
        debug!("Searching for {} matching {}", entity_type, body["query"]);

        let hits = self.search(&body).await?;
        Ok(hit_ids(hits).into_iter().collect())
    }

    async fn search(&self, body: &Value) -> ClientResult<SearchHits> {
        let path = format!("{}/_search", self.indices.join(","));
        let mut last_error = None;

        for host in &self.hosts {
            let url = host
                .join(&path)
                .map_err(|e| ClientError::Config(format!("invalid search url on {host}: {e}")))?;
            let response = match self
                .client
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .json(body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    info!("Index host {} unreachable: {}", host, e);
                    last_error = Some(ClientError::transport("search request failed", e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(ClientError::status(
                    status.as_u16(),
                    format!("search on {url} failed: {message}"),
                ));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ClientError::transport("failed to read search response", e))?;
            let parsed: SearchResponse = serde_json::from_slice(&bytes)?;
            debug!("Search on {} returned {} hits", url, parsed.hits.hits.len());
            return Ok(parsed.hits);
        }

        Err(last_error
            .unwrap_or_else(|| ClientError::Config("no index hosts configured".to_string())))
    }
}

fn hit_ids(hits: SearchHits) -> Vec<Url> {
    hits.hits
        .into_iter()
        .filter_map(|hit| {
            let id = hit.source.get("@id").and_then(Value::as_str)?;
            match Url::parse(id) {
                Ok(url) => Some(url),
                Err(e) => {
                    debug!("Ignoring hit with invalid @id {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}
