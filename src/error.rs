//! Error types for the resolution engine.

use thiserror::Error;

/// Errors raised while building scopes, resolving components, or tearing
/// a scope down.
///
/// All operational failures funnel through [`DiError::ResolutionFailed`]
/// at the resolve-operation boundary; errors raised deeper in the
/// pipeline keep their concrete variant and are reachable through
/// [`DiError::root_cause`].
///
/// # Examples
///
/// ```rust
/// use canopy_di::{DiError, LifetimeScope, Service};
///
/// let root = LifetimeScope::root(|_| {});
/// match root.resolve_service(&Service::of::<String>()) {
///     Err(DiError::NotRegistered { service }) => {
///         assert_eq!(service, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// Umbrella failure produced at the resolve-operation boundary.
    #[error("an error occurred while resolving {context}: {source}")]
    ResolutionFailed {
        /// Human description of what was being resolved.
        context: String,
        /// The underlying failure.
        #[source]
        source: Box<DiError>,
    },

    /// The requested service has no registration in the scope hierarchy.
    #[error("service not registered: {service}")]
    NotRegistered {
        /// Display name of the requested service.
        service: &'static str,
    },

    /// A typed helper could not downcast the resolved instance.
    #[error("type mismatch for resolved service: {service}")]
    TypeMismatch {
        /// Display name of the requested service.
        service: &'static str,
    },

    /// An activator found no usable way to construct the target.
    #[error("no constructors found for {type_name}")]
    NoConstructorsFound {
        /// The type the activator was asked to build.
        type_name: &'static str,
    },

    /// A matching-scope lifetime walked the ancestry without finding a
    /// scope carrying any of its tags.
    #[error("no lifetime scope matching the tags [{searched}] is visible from the resolution scope")]
    MatchingScopeNotFound {
        /// Comma-joined list of the tags that were searched for.
        searched: String,
    },

    /// The requested registration is already in progress in the current
    /// segment of the request stack.
    #[error("circular dependency detected: {}", .path.join(" -> "))]
    CircularDependency {
        /// Display names of the in-progress requests, oldest first,
        /// ending with the request that closed the cycle.
        path: Vec<String>,
    },

    /// A required request ran its pipeline to completion without any
    /// middleware producing an instance.
    #[error("the resolve pipeline for {service} completed without producing an instance")]
    PipelineCompletedWithNoInstance {
        /// Display name of the requested service.
        service: &'static str,
    },

    /// A shared component's activator resolved the component itself
    /// while it was still being constructed.
    #[error("component {component} attempted to resolve itself during its own construction")]
    SelfConstructingDependency {
        /// Description of the self-constructing component.
        component: String,
    },

    /// The resolve operation already ended and cannot be reused.
    #[error("the resolve operation has already ended")]
    OperationDisposed,

    /// The lifetime scope (or one of its ancestors) has been disposed.
    #[error("the lifetime scope has already been disposed")]
    ScopeDisposed,

    /// A child scope was given a tag already carried by an ancestor.
    #[error("the tag {tag:?} is already present on an ancestor lifetime scope")]
    DuplicateScopeTag {
        /// The offending tag, rendered for display.
        tag: String,
    },

    /// The nested-resolve depth guard tripped.
    #[error("maximum resolve depth {0} exceeded")]
    DepthExceeded(usize),

    /// A resource registered for asynchronous release was reached on the
    /// synchronous disposal path.
    #[error("a resource requires asynchronous disposal; use dispose_async")]
    RequiresAsyncDisposal,

    /// An activator reported a failure of its own.
    #[error("activator {activator} failed: {message}")]
    ActivatorFailed {
        /// Description of the failing activator.
        activator: String,
        /// The activator's own account of the failure.
        message: String,
    },
}

impl DiError {
    /// Shorthand for an [`DiError::ActivatorFailed`] raised from inside a
    /// delegate activator.
    pub fn activation(activator: impl Into<String>, message: impl Into<String>) -> Self {
        DiError::ActivatorFailed {
            activator: activator.into(),
            message: message.into(),
        }
    }

    /// Follows [`DiError::ResolutionFailed`] wrappers down to the
    /// innermost failure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy_di::DiError;
    ///
    /// let wrapped = DiError::ResolutionFailed {
    ///     context: "MyService".to_string(),
    ///     source: Box::new(DiError::OperationDisposed),
    /// };
    /// assert!(matches!(wrapped.root_cause(), DiError::OperationDisposed));
    /// ```
    pub fn root_cause(&self) -> &DiError {
        let mut current = self;
        while let DiError::ResolutionFailed { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Result type for resolution-engine operations.
pub type DiResult<T> = Result<T, DiError>;
