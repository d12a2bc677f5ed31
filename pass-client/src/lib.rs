//! Client for the PASS repository and its search index.
//!
//! - [`ResourceCrudClient`]: create, read, update, delete with optimistic
//!   concurrency on the resource store
//! - [`RepositoryCrawler`]: depth-first traversal with skip and ignore rules
//! - [`IndexClient`]: exact-match attribute search
//! - [`PassClient`]: facade over the CRUD and index clients
//!
//! All operations are async and complete their request before returning.

pub mod config;
pub mod crawler;
pub mod crud;
pub mod error;
pub mod index;

mod client;
mod graph;

pub use client::PassClient;
pub use config::{ClientConfig, IndexConfig, RepositoryConfig};
pub use crawler::{
    ContainerSource, CrawlNode, CrawlRule, NodeDescription, NodePredicate, RepositoryCrawler,
    Visitor,
};
pub use crud::{ContentDigest, ResourceCrudClient, UpdateMode, UploadParams, normalize_etag};
pub use error::{ClientError, ClientResult};
pub use index::{IndexClient, SearchCriteria, SearchValue};

pub use pass_model::{Entity, IncomingLinks, TypeRegistry, Url};
