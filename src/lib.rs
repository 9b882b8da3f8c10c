//! # canopy-di
//!
//! Hierarchical lifetime-scope dependency injection with a staged,
//! extensible resolve pipeline.
//!
//! ## Features
//!
//! - **Lifetime-scope hierarchy**: a tree of scopes, each with a private
//!   registry and shared-instance cache; parents visible to children,
//!   siblings isolated
//! - **Sharing policies**: per-dependency, per-lifetime-scope,
//!   per-matching-scope (by tag), and single-instance components
//! - **Resolve pipeline**: every request flows through phase-ordered
//!   middleware (scope selection, decoration, sharing, activation) that
//!   integrations can extend
//! - **Cycle detection**: exact, segment-aware detection of circular
//!   dependencies with the full request path in the error
//! - **Deterministic disposal**: scope-owned instances released in
//!   reverse registration order, synchronously or asynchronously
//! - **Decorators**: wrap a service in layers applied in registration
//!   order, tracked in a decorator context
//!
//! ## Quick start
//!
//! ```rust
//! use canopy_di::{LifetimeScope, Registration};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let root = LifetimeScope::root(|r| {
//!     r.register(
//!         Registration::for_type::<Database>()
//!             .activate_with(|_| Ok(Database { url: "postgres://localhost".into() }))
//!             .single_instance()
//!             .build(),
//!     );
//!     r.register(
//!         Registration::for_type::<UserService>()
//!             .activate_with(|ctx| Ok(UserService { db: ctx.resolve::<Database>()? }))
//!             .build(),
//!     );
//! });
//!
//! let users = root.resolve_typed::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Scopes and sharing
//!
//! ```rust
//! use canopy_di::{LifetimeScope, Registration};
//!
//! struct RequestState(u32);
//!
//! let root = LifetimeScope::root(|r| {
//!     r.register(
//!         Registration::for_type::<RequestState>()
//!             .activate_with(|_| Ok(RequestState(7)))
//!             .instance_per_lifetime_scope()
//!             .build(),
//!     );
//! });
//!
//! let request = root.begin_child().unwrap();
//! let a = request.resolve_typed::<RequestState>().unwrap();
//! let b = request.resolve_typed::<RequestState>().unwrap();
//! assert!(std::sync::Arc::ptr_eq(&a, &b)); // shared within the scope
//!
//! let other = root.begin_child().unwrap();
//! let c = other.resolve_typed::<RequestState>().unwrap();
//! assert!(!std::sync::Arc::ptr_eq(&a, &c)); // siblings isolated
//! ```
//!
//! ## Matching scopes
//!
//! Components can bind to the nearest ancestor scope carrying a tag,
//! giving the unit-of-work pattern:
//!
//! ```rust
//! use canopy_di::{LifetimeScope, Registration};
//!
//! struct UnitOfWork;
//!
//! let root = LifetimeScope::root(|r| {
//!     r.register(
//!         Registration::for_type::<UnitOfWork>()
//!             .activate_with(|_| Ok(UnitOfWork))
//!             .instance_per_matching_scope(["unit"])
//!             .build(),
//!     );
//! });
//!
//! let unit = root.begin_child_tagged("unit").unwrap();
//! let inner = unit.begin_child().unwrap();
//!
//! let from_unit = unit.resolve_typed::<UnitOfWork>().unwrap();
//! let from_inner = inner.resolve_typed::<UnitOfWork>().unwrap();
//! assert!(std::sync::Arc::ptr_eq(&from_unit, &from_inner));
//! ```

mod activator;
mod diagnostics;
mod error;
mod events;
mod internal;
mod lifetime;
mod parameter;
mod registration;
mod registry;
mod resolve;
mod scope;
mod service;
mod traits;

pub use activator::{ActivationContext, Activator, DelegateActivator, ProvidedInstanceActivator};
pub use diagnostics::DiagnosticSink;
#[cfg(feature = "logging")]
pub use diagnostics::TracingDiagnosticSink;
pub use error::{DiError, DiResult};
pub use lifetime::{ComponentLifetime, ScopeTag};
pub use parameter::{named_parameter, typed_parameter, Parameter};
pub use registration::{
    Instance, Ownership, Registration, RegistrationBuilder, RegistrationId, Sharing,
};
pub use registry::{ComponentRegistry, RegistrationSource};
pub use resolve::{
    ActivationMiddleware, DecorationMiddleware, DecoratorContext, DependencySegment, Middleware,
    PipelineCursor, PipelinePhase, RequestContext, ResolveOperation, ResolvePipeline,
    ResolvePipelineBuilder, ResolveRequest, ScopeSelectionMiddleware, SharingMiddleware,
};
pub use scope::LifetimeScope;
pub use service::Service;
pub use traits::{AsyncDispose, Dispose};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ComponentLifetime, ComponentRegistry, DiError, DiResult, Dispose, LifetimeScope,
        Parameter, Registration, ResolveRequest, ScopeTag, Service,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Database {
        url: String,
    }

    #[test]
    fn resolves_a_registered_component() {
        let root = LifetimeScope::root(|r| {
            r.register(
                Registration::for_type::<Database>()
                    .activate_with(|_| Ok(Database { url: "test".into() }))
                    .build(),
            );
        });
        let db = root.resolve_typed::<Database>().unwrap();
        assert_eq!(db.url, "test");
    }

    #[test]
    fn shared_components_return_the_same_instance() {
        let root = LifetimeScope::root(|r| {
            r.register(
                Registration::for_type::<Database>()
                    .activate_with(|_| Ok(Database { url: "test".into() }))
                    .single_instance()
                    .build(),
            );
        });
        let a = root.resolve_typed::<Database>().unwrap();
        let b = root.resolve_typed::<Database>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn per_dependency_components_are_fresh_each_resolve() {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        struct Counter(u32);

        let root = LifetimeScope::root(|r| {
            r.register(
                Registration::for_type::<Counter>()
                    .activate_with(|_| Ok(Counter(COUNTER.fetch_add(1, Ordering::SeqCst))))
                    .build(),
            );
        });
        let a = root.resolve_typed::<Counter>().unwrap();
        let b = root.resolve_typed::<Counter>().unwrap();
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn unregistered_service_is_an_error() {
        let root = LifetimeScope::root(|_| {});
        let result = root.resolve_typed::<Database>();
        assert!(matches!(result, Err(DiError::NotRegistered { .. })));
    }

    #[test]
    fn child_overlays_override_parent_registrations() {
        let root = LifetimeScope::root(|r| {
            r.register(
                Registration::for_type::<Database>()
                    .activate_with(|_| Ok(Database { url: "production".into() }))
                    .build(),
            );
        });
        let child = root
            .begin_child_with(None, |r| {
                r.register(
                    Registration::for_type::<Database>()
                        .activate_with(|_| Ok(Database { url: "test".into() }))
                        .build(),
                );
            })
            .unwrap();

        assert_eq!(root.resolve_typed::<Database>().unwrap().url, "production");
        assert_eq!(child.resolve_typed::<Database>().unwrap().url, "test");
    }

    #[test]
    fn keyed_registrations_resolve_by_key() {
        let root = LifetimeScope::root(|r| {
            r.register(
                Registration::for_type::<u32>()
                    .named("http-port")
                    .activate_with(|_| Ok(8080))
                    .build(),
            );
            r.register(
                Registration::for_type::<u32>()
                    .named("admin-port")
                    .activate_with(|_| Ok(9090))
                    .build(),
            );
        });
        assert_eq!(*root.resolve_keyed::<u32>("http-port").unwrap(), 8080);
        assert_eq!(*root.resolve_keyed::<u32>("admin-port").unwrap(), 9090);
    }
}
