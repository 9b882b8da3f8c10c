//! Scope tags and component lifetime policies.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::scope::LifetimeScope;

static NEXT_ANONYMOUS_TAG: AtomicU64 = AtomicU64::new(0);

/// An opaque, equatable marker identifying a scope within its ancestry.
///
/// Anonymous tags are minted from a process-wide counter so that no two
/// anonymous scopes ever compare equal; named tags compare by value.
///
/// # Examples
///
/// ```rust
/// use canopy_di::ScopeTag;
///
/// assert_eq!(ScopeTag::named("request"), ScopeTag::named("request"));
/// assert_ne!(ScopeTag::anonymous(), ScopeTag::anonymous());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeTag {
    /// An identity tag minted for an untagged scope.
    Anonymous(u64),
    /// A caller-supplied tag, compared by value.
    Named(Cow<'static, str>),
}

impl ScopeTag {
    /// Mints a fresh anonymous tag, distinct from every other tag.
    pub fn anonymous() -> Self {
        ScopeTag::Anonymous(NEXT_ANONYMOUS_TAG.fetch_add(1, Ordering::Relaxed))
    }

    /// A named tag.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        ScopeTag::Named(name.into())
    }

    /// True for caller-supplied tags that participate in duplicate
    /// checking and matching-scope lookup.
    pub fn is_named(&self) -> bool {
        matches!(self, ScopeTag::Named(_))
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeTag::Anonymous(n) => write!(f, "anonymous#{n}"),
            ScopeTag::Named(name) => f.write_str(name),
        }
    }
}

impl From<&'static str> for ScopeTag {
    fn from(name: &'static str) -> Self {
        ScopeTag::named(name)
    }
}

impl From<String> for ScopeTag {
    fn from(name: String) -> Self {
        ScopeTag::named(name)
    }
}

/// Locates the scope that owns a component's shared instance, starting
/// from the most nested scope visible to the resolve request.
///
/// # Examples
///
/// ```rust
/// use canopy_di::{ComponentLifetime, LifetimeScope};
///
/// let root = LifetimeScope::root(|_| {});
/// let child = root.begin_child().unwrap();
///
/// let here = ComponentLifetime::CurrentScope.find_scope(&child).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&here, &child));
///
/// let top = ComponentLifetime::RootScope.find_scope(&child).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&top, &root));
/// ```
#[derive(Debug, Clone)]
pub enum ComponentLifetime {
    /// The starting scope owns the instance.
    CurrentScope,
    /// The root of the scope tree owns the instance.
    RootScope,
    /// The nearest ancestor (or the starting scope itself) carrying one
    /// of the listed tags owns the instance.
    MatchingScope(Vec<ScopeTag>),
}

impl ComponentLifetime {
    /// A matching-scope lifetime over the given tags.
    pub fn matching(tags: impl IntoIterator<Item = impl Into<ScopeTag>>) -> Self {
        ComponentLifetime::MatchingScope(tags.into_iter().map(Into::into).collect())
    }

    /// Finds the owning scope, failing with
    /// [`DiError::MatchingScopeNotFound`] when no ancestor matches.
    pub fn find_scope(&self, most_nested: &Arc<LifetimeScope>) -> DiResult<Arc<LifetimeScope>> {
        match self {
            ComponentLifetime::CurrentScope => Ok(most_nested.clone()),
            ComponentLifetime::RootScope => Ok(most_nested.root_scope()),
            ComponentLifetime::MatchingScope(tags) => {
                self.try_find_scope(most_nested)
                    .ok_or_else(|| DiError::MatchingScopeNotFound {
                        searched: tags
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    }

    /// As [`find_scope`](Self::find_scope), but absence is `None`
    /// instead of an error. Used for non-required requests.
    pub fn try_find_scope(&self, most_nested: &Arc<LifetimeScope>) -> Option<Arc<LifetimeScope>> {
        match self {
            ComponentLifetime::CurrentScope => Some(most_nested.clone()),
            ComponentLifetime::RootScope => Some(most_nested.root_scope()),
            ComponentLifetime::MatchingScope(tags) => {
                let mut current = Some(most_nested.clone());
                while let Some(scope) = current {
                    if tags.iter().any(|t| t == scope.tag()) {
                        return Some(scope);
                    }
                    current = scope.parent().cloned();
                }
                None
            }
        }
    }
}
