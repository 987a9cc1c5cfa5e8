//! Case paths relate an action enum to one of its cases.

use std::fmt;
use std::sync::Arc;

use super::PathId;

type Extract<Root, Case> = dyn Fn(Root) -> Option<Case> + Send + Sync;
type Embed<Case, Root> = dyn Fn(Case) -> Root + Send + Sync;

/// A path from a `Root` enum to one `Case` payload.
///
/// `extract` pulls the payload out of a root value if it is that case,
/// `embed` wraps a payload back into the root enum.
pub struct CasePath<Root, Case> {
    id: PathId,
    extract: Arc<Extract<Root, Case>>,
    embed: Arc<Embed<Case, Root>>,
}

impl<Root: 'static, Case: 'static> CasePath<Root, Case> {
    /// Create an anonymous case path.
    pub fn new<E, B>(extract: E, embed: B) -> Self
    where
        E: Fn(Root) -> Option<Case> + Send + Sync + 'static,
        B: Fn(Case) -> Root + Send + Sync + 'static,
    {
        Self {
            id: PathId::unique(),
            extract: Arc::new(extract),
            embed: Arc::new(embed),
        }
    }

    /// Create a named case path. Case paths with the same name and types
    /// share an id.
    pub fn named<E, B>(name: &str, extract: E, embed: B) -> Self
    where
        E: Fn(Root) -> Option<Case> + Send + Sync + 'static,
        B: Fn(Case) -> Root + Send + Sync + 'static,
    {
        Self {
            id: PathId::named::<Root, Case>(name),
            extract: Arc::new(extract),
            embed: Arc::new(embed),
        }
    }

    /// Compose with a case path into this case's payload.
    pub fn then<Sub: 'static>(&self, next: &CasePath<Case, Sub>) -> CasePath<Root, Sub> {
        let (outer_extract, inner_extract) = (Arc::clone(&self.extract), Arc::clone(&next.extract));
        let (outer_embed, inner_embed) = (Arc::clone(&self.embed), Arc::clone(&next.embed));

        CasePath {
            id: self.id.join(&next.id),
            extract: Arc::new(move |root: Root| outer_extract(root).and_then(|case| inner_extract(case))),
            embed: Arc::new(move |sub: Sub| outer_embed(inner_embed(sub))),
        }
    }
}

impl<Root: 'static> CasePath<Root, Root> {
    /// The case path that matches every value.
    pub fn identity() -> Self {
        Self::named("self", Some, |root| root)
    }
}

impl<Root, Case> CasePath<Root, Case> {
    pub fn id(&self) -> &PathId {
        &self.id
    }

    pub fn extract(&self, root: Root) -> Option<Case> {
        (self.extract)(root)
    }

    pub fn embed(&self, case: Case) -> Root {
        (self.embed)(case)
    }

    pub(crate) fn embedder(&self) -> Arc<Embed<Case, Root>> {
        Arc::clone(&self.embed)
    }
}

impl<Root, Case> Clone for CasePath<Root, Case> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            extract: Arc::clone(&self.extract),
            embed: Arc::clone(&self.embed),
        }
    }
}

impl<Root, Case> fmt::Debug for CasePath<Root, Case> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CasePath").field("id", &self.id).finish()
    }
}
