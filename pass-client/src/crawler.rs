//! Depth-first repository traversal.
//!
//! The crawler walks containment links from a root URI and hands every
//! matching resource to a [`Visitor`]. Which nodes are visited is controlled
//! by [`CrawlRule`]s:
//!
//! - `Skip(p)`: a node matching `p` is neither visited nor descended into.
//! - `Ignore(p)`: a node matching `p` is not visited, but its children are.
//!
//! Skip rules are checked before ignore rules, and the root is treated like
//! any other node. Structural skip rules (depth, URI) are checked before a
//! node is fetched, so a skipped node is never requested from the source.

use crate::error::ClientResult;
use async_trait::async_trait;
use pass_model::Url;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const CONTAINER_TYPES: &[&str] = &[
    "ldp:Container",
    "ldp:BasicContainer",
    "ldp:DirectContainer",
    "ldp:IndirectContainer",
    "ldp:RDFSource",
    "fedora:Container",
    "fedora:Resource",
    "http://www.w3.org/ns/ldp#Container",
    "http://www.w3.org/ns/ldp#BasicContainer",
    "http://www.w3.org/ns/ldp#DirectContainer",
    "http://www.w3.org/ns/ldp#IndirectContainer",
    "http://www.w3.org/ns/ldp#RDFSource",
    "http://fedora.info/definitions/v4/repository#Container",
    "http://fedora.info/definitions/v4/repository#Resource",
];

/// A node as reported by a [`ContainerSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDescription {
    /// Every `@type` of the node, as written by the store.
    pub types: Vec<String>,
    /// Contained resources, in document order.
    pub children: Vec<Url>,
}

/// Supplies node types and containment for the crawler.
#[async_trait]
pub trait ContainerSource: Send + Sync {
    async fn describe(&self, uri: &Url) -> ClientResult<NodeDescription>;
}

/// A node under evaluation. The root has depth 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlNode {
    pub uri: Url,
    pub depth: usize,
    pub types: Vec<String>,
}

/// A composable node test.
///
/// Predicates built with [`NodePredicate::structural`] look only at a node's
/// URI and depth, so they can be decided before the node is fetched.
#[derive(Clone)]
pub struct NodePredicate {
    test: Arc<dyn Fn(&CrawlNode) -> bool + Send + Sync>,
    needs_types: bool,
}

impl NodePredicate {
    /// A predicate that may inspect the node's types.
    pub fn new(test: impl Fn(&CrawlNode) -> bool + Send + Sync + 'static) -> Self {
        Self {
            test: Arc::new(test),
            needs_types: true,
        }
    }

    /// A predicate that never reads `types`.
    pub fn structural(test: impl Fn(&CrawlNode) -> bool + Send + Sync + 'static) -> Self {
        Self {
            test: Arc::new(test),
            needs_types: false,
        }
    }

    pub fn matches(&self, node: &CrawlNode) -> bool {
        (self.test)(node)
    }

    pub fn needs_types(&self) -> bool {
        self.needs_types
    }

    /// Matches when either predicate matches.
    pub fn or(self, other: NodePredicate) -> Self {
        let needs_types = self.needs_types || other.needs_types;
        Self {
            test: Arc::new(move |node| self.matches(node) || other.matches(node)),
            needs_types,
        }
    }
}

impl fmt::Debug for NodePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePredicate")
            .field("needs_types", &self.needs_types)
            .finish_non_exhaustive()
    }
}

/// Matches nodes deeper than `max`.
pub fn depth(max: usize) -> NodePredicate {
    NodePredicate::structural(move |node| node.depth > max)
}

/// Matches access-control resources.
pub fn acls() -> NodePredicate {
    NodePredicate::structural(|node| {
        node.uri
            .path_segments()
            .map(|mut segments| segments.any(|s| s == "acls" || s == "fcr:acl"))
            .unwrap_or(false)
    })
}

/// Matches structural containers: every type is a prefixed or absolute
/// repository type and at least one is a container type. Entities carry a
/// bare type name (`Grant`) and never match.
pub fn pure_containers() -> NodePredicate {
    NodePredicate::new(|node| {
        !node.types.is_empty()
            && node.types.iter().all(|t| t.contains(':'))
            && node
                .types
                .iter()
                .any(|t| CONTAINER_TYPES.contains(&t.as_str()))
    })
}

#[derive(Debug, Clone)]
pub enum CrawlRule {
    /// Do not visit, but descend.
    Ignore(NodePredicate),
    /// Neither visit nor descend.
    Skip(NodePredicate),
}

/// Receives every visited resource URI. An error aborts the crawl.
pub trait Visitor {
    fn visit(&mut self, uri: &Url) -> ClientResult<()>;
}

impl<F> Visitor for F
where
    F: FnMut(&Url) -> ClientResult<()>,
{
    fn visit(&mut self, uri: &Url) -> ClientResult<()> {
        self(uri)
    }
}

/// Sequential depth-first crawler over a [`ContainerSource`].
#[derive(Debug, Clone)]
pub struct RepositoryCrawler<S> {
    source: S,
}

impl<S: ContainerSource> RepositoryCrawler<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Walks from `root` and returns the number of visited resources.
    ///
    /// Children are processed in the order the source lists them. A URI
    /// reached twice in one crawl is processed only the first time.
    pub async fn visit<V>(
        &self,
        root: &Url,
        visitor: &mut V,
        rules: &[CrawlRule],
    ) -> ClientResult<usize>
    where
        V: Visitor + ?Sized,
    {
        let mut seen: HashSet<Url> = HashSet::new();
        let mut stack: Vec<(Url, usize)> = vec![(root.clone(), 0)];
        let mut count = 0;

        while let Some((uri, depth)) = stack.pop() {
            if !seen.insert(uri.clone()) {
                debug!("Already crawled {}, skipping", uri);
                continue;
            }

            let mut node = CrawlNode {
                uri,
                depth,
                types: Vec::new(),
            };
            if skipped(rules, &node, false) {
                debug!("Skipping {} at depth {}", node.uri, node.depth);
                continue;
            }

            let description = self.source.describe(&node.uri).await?;
            node.types = description.types;
            if skipped(rules, &node, true) {
                debug!("Skipping {} at depth {}", node.uri, node.depth);
                continue;
            }

            let ignored = rules
                .iter()
                .any(|r| matches!(r, CrawlRule::Ignore(p) if p.matches(&node)));
            if ignored {
                debug!("Ignoring {} at depth {}", node.uri, node.depth);
            } else {
                visitor.visit(&node.uri)?;
                count += 1;
            }

            for child in description.children.into_iter().rev() {
                if !seen.contains(&child) {
                    stack.push((child, depth + 1));
                }
            }
        }

        Ok(count)
    }
}

/// Checks the skip rules that can be decided with or without the node's
/// types.
fn skipped(rules: &[CrawlRule], node: &CrawlNode, with_types: bool) -> bool {
    rules.iter().any(|rule| match rule {
        CrawlRule::Skip(p) => p.needs_types() == with_types && p.matches(node),
        CrawlRule::Ignore(_) => false,
    })
}
