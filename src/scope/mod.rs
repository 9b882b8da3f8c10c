//! Hierarchical lifetime scopes.

mod sharing;

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use once_cell::sync::Lazy;

use crate::activator::{ActivationContext, Activator};
use crate::diagnostics::{DiagnosticSink, Diagnostics};
use crate::error::{DiError, DiResult};
use crate::events::Callbacks;
use crate::internal::{disposer, Disposer};
use crate::lifetime::ScopeTag;
use crate::registration::{DisposalBinding, Instance, Registration, RegistrationId};
use crate::registry::ComponentRegistry;
use crate::resolve::{ResolveOperation, ResolveRequest};
use crate::service::Service;

use sharing::SharedInstanceStore;

// Every scope resolves `LifetimeScope` to itself through this
// registration. The activator hands back the activation scope, so the
// scope's own shared-instance map never holds an owning self-reference.
static SELF_REGISTRATION: Lazy<Arc<Registration>> = Lazy::new(|| {
    Registration::for_type::<LifetimeScope>()
        .with_activator(Arc::new(ScopeSelfActivator))
        .externally_owned()
        .build()
});

struct ScopeSelfActivator;

impl Activator for ScopeSelfActivator {
    fn activate(&self, ctx: &ActivationContext<'_>) -> DiResult<Instance> {
        let scope: Arc<LifetimeScope> = ctx.scope();
        let instance: Instance = scope;
        Ok(instance)
    }

    fn description(&self) -> &str {
        "lifetime scope self-registration"
    }
}

/// A node in the scope tree: a private component registry, a
/// shared-instance store, a disposer, and a tag, with the parent chain
/// visible to resolves and siblings isolated from one another.
///
/// Scopes are created from a parent (or as the root), resolve components
/// through per-call [`ResolveOperation`]s, and are destroyed exactly
/// once by [`dispose`](Self::dispose) or
/// [`dispose_async`](Self::dispose_async).
///
/// # Examples
///
/// ```rust
/// use canopy_di::{LifetimeScope, Registration};
///
/// struct Config {
///     name: String,
/// }
///
/// let root = LifetimeScope::root(|r| {
///     r.register(
///         Registration::for_type::<Config>()
///             .activate_with(|_| Ok(Config { name: "app".into() }))
///             .single_instance()
///             .build(),
///     );
/// });
///
/// let child = root.begin_child().unwrap();
/// let config = child.resolve_typed::<Config>().unwrap();
/// assert_eq!(config.name, "app");
///
/// // Scopes resolve themselves.
/// let me = child.resolve_typed::<LifetimeScope>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&me, &child));
/// ```
pub struct LifetimeScope {
    tag: ScopeTag,
    parent: Option<Arc<LifetimeScope>>,
    root: Weak<LifetimeScope>,
    self_weak: Weak<LifetimeScope>,
    registry: Arc<ComponentRegistry>,
    store: SharedInstanceStore,
    disposer: Mutex<Disposer>,
    diagnostics: Arc<Diagnostics>,
    child_beginning: Callbacks<Arc<LifetimeScope>>,
    scope_ending: Callbacks<LifetimeScope>,
    operation_beginning: Callbacks<ResolveOperation>,
    disposing: AtomicBool,
    disposed: AtomicBool,
}

impl LifetimeScope {
    /// Builds the root scope of a new container, configuring its
    /// registry through `configure`.
    pub fn root(configure: impl FnOnce(&mut ComponentRegistry)) -> Arc<LifetimeScope> {
        let mut registry = ComponentRegistry::new();
        registry.register(SELF_REGISTRATION.clone());
        configure(&mut registry);

        #[cfg(feature = "logging")]
        tracing::debug!(target: "canopy_di", "creating root lifetime scope");

        Arc::new_cyclic(|weak| LifetimeScope {
            tag: ScopeTag::named("root"),
            parent: None,
            root: weak.clone(),
            self_weak: weak.clone(),
            registry: Arc::new(registry),
            store: SharedInstanceStore::default(),
            disposer: Mutex::new(Disposer::default()),
            diagnostics: Arc::new(Diagnostics::default()),
            child_beginning: Callbacks::default(),
            scope_ending: Callbacks::default(),
            operation_beginning: Callbacks::default(),
            disposing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// The scope's tag.
    pub fn tag(&self) -> &ScopeTag {
        &self.tag
    }

    /// The parent scope, `None` for the root.
    pub fn parent(&self) -> Option<&Arc<LifetimeScope>> {
        self.parent.as_ref()
    }

    /// The topmost ancestor of this scope.
    pub fn root_scope(&self) -> Arc<LifetimeScope> {
        self.root
            .upgrade()
            .expect("the root scope outlives every descendant scope")
    }

    /// The scope's component registry.
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// True once the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn diagnostics(&self) -> Arc<Diagnostics> {
        self.diagnostics.clone()
    }

    // Scopes only ever live behind an Arc handed out by root() or
    // begin_child*, so the upgrade cannot fail while &self is alive.
    fn self_arc(&self) -> Arc<LifetimeScope> {
        self.self_weak
            .upgrade()
            .expect("a borrowed scope is still alive")
    }

    fn check_not_disposed(&self) -> DiResult<()> {
        let mut current = Some(self);
        while let Some(scope) = current {
            if scope.disposed.load(Ordering::SeqCst) {
                return Err(DiError::ScopeDisposed);
            }
            current = scope.parent.as_deref();
        }
        Ok(())
    }

    // ===== Children =====

    /// Begins an anonymous child scope.
    pub fn begin_child(&self) -> DiResult<Arc<LifetimeScope>> {
        self.begin_child_with(None, |_| {})
    }

    /// Begins a child scope carrying `tag`. Fails when a non-anonymous
    /// ancestor already carries the same tag.
    pub fn begin_child_tagged(&self, tag: impl Into<ScopeTag>) -> DiResult<Arc<LifetimeScope>> {
        self.begin_child_with(Some(tag.into()), |_| {})
    }

    /// Begins a child scope, optionally tagged, overlaying the
    /// registrations added by `configure` on the inherited registry.
    pub fn begin_child_with(
        &self,
        tag: Option<ScopeTag>,
        configure: impl FnOnce(&mut ComponentRegistry),
    ) -> DiResult<Arc<LifetimeScope>> {
        self.begin_child_inner(tag, configure, false)
    }

    /// As [`begin_child_with`](Self::begin_child_with), but the child's
    /// registry is built in isolated mode: only registration sources
    /// that adapt individual components are inherited.
    pub fn begin_isolated_child_with(
        &self,
        tag: Option<ScopeTag>,
        configure: impl FnOnce(&mut ComponentRegistry),
    ) -> DiResult<Arc<LifetimeScope>> {
        self.begin_child_inner(tag, configure, true)
    }

    fn begin_child_inner(
        &self,
        tag: Option<ScopeTag>,
        configure: impl FnOnce(&mut ComponentRegistry),
        isolated: bool,
    ) -> DiResult<Arc<LifetimeScope>> {
        self.check_not_disposed()?;
        let tag = tag.unwrap_or_else(ScopeTag::anonymous);

        // Non-anonymous tags must be unique along the root-to-leaf path.
        if tag.is_named() {
            let mut current = Some(self.self_arc());
            while let Some(scope) = current {
                if scope.tag == tag {
                    return Err(DiError::DuplicateScopeTag {
                        tag: tag.to_string(),
                    });
                }
                current = scope.parent.clone();
            }
        }

        let mut registry = ComponentRegistry::child_of(&self.registry, isolated);
        configure(&mut registry);

        #[cfg(feature = "logging")]
        tracing::debug!(
            target: "canopy_di",
            tag = %tag,
            isolated,
            "beginning child lifetime scope"
        );

        let child = Arc::new_cyclic(|weak| LifetimeScope {
            tag,
            parent: Some(self.self_arc()),
            root: self.root.clone(),
            self_weak: weak.clone(),
            registry: Arc::new(registry),
            store: SharedInstanceStore::default(),
            disposer: Mutex::new(Disposer::default()),
            diagnostics: self.diagnostics.clone(),
            child_beginning: Callbacks::default(),
            scope_ending: Callbacks::default(),
            operation_beginning: Callbacks::default(),
            disposing: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });
        self.child_beginning.fire(&child);
        Ok(child)
    }

    // ===== Resolution =====

    /// Resolves a fully-specified request through a fresh operation
    /// bound to this scope.
    pub fn resolve(&self, request: ResolveRequest) -> DiResult<Instance> {
        self.check_not_disposed()?;
        let operation = ResolveOperation::new(&self.self_arc());
        self.operation_beginning.fire(&operation);
        operation.execute(request)
    }

    /// As [`resolve`](Self::resolve), but a lifetime policy that finds
    /// no owning scope yields `None` instead of failing.
    pub fn try_resolve(&self, request: ResolveRequest) -> DiResult<Option<Instance>> {
        self.check_not_disposed()?;
        let operation = ResolveOperation::new(&self.self_arc());
        self.operation_beginning.fire(&operation);
        operation.try_execute(request)
    }

    /// Resolves `service` through its default registration.
    pub fn resolve_service(&self, service: &Service) -> DiResult<Instance> {
        let registration = self
            .registry
            .default_registration_for(service)
            .ok_or(DiError::NotRegistered {
                service: service.display_name(),
            })?;
        self.resolve(ResolveRequest::new(service.clone(), registration))
    }

    /// As [`resolve_service`](Self::resolve_service), but an unknown
    /// service or an unmatched lifetime yields `None`.
    pub fn try_resolve_service(&self, service: &Service) -> DiResult<Option<Instance>> {
        match self.registry.default_registration_for(service) {
            Some(registration) => {
                self.try_resolve(ResolveRequest::new(service.clone(), registration))
            }
            None => Ok(None),
        }
    }

    /// Resolves the component registered for type `T`.
    pub fn resolve_typed<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let service = Service::of::<T>();
        self.resolve_service(&service)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch {
                service: service.display_name(),
            })
    }

    /// As [`resolve_typed`](Self::resolve_typed), yielding `None` for
    /// unknown or unmatched components.
    pub fn try_resolve_typed<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let service = Service::of::<T>();
        match self.try_resolve_service(&service)? {
            Some(instance) => instance
                .downcast::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch {
                    service: service.display_name(),
                }),
            None => Ok(None),
        }
    }

    /// Resolves the component registered for type `T` under `key`.
    pub fn resolve_keyed<T: Send + Sync + 'static>(
        &self,
        key: impl Into<Cow<'static, str>>,
    ) -> DiResult<Arc<T>> {
        let service = Service::keyed::<T>(key);
        self.resolve_service(&service)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch {
                service: service.display_name(),
            })
    }

    // ===== Shared instances =====

    /// Returns the shared instance cached for `(id, qualifier)` or runs
    /// `creator` to populate it. See the store's double-checked
    /// contract on [`DiError::SelfConstructingDependency`].
    pub fn create_shared_instance(
        &self,
        id: RegistrationId,
        qualifier: Option<RegistrationId>,
        creator: impl FnOnce() -> DiResult<Option<Instance>>,
    ) -> DiResult<Option<Instance>> {
        self.check_not_disposed()?;
        self.store.get_or_create(id, qualifier, creator)
    }

    /// Lock-free lookup of a cached shared instance.
    pub fn try_get_shared_instance(
        &self,
        id: RegistrationId,
        qualifier: Option<RegistrationId>,
    ) -> Option<Instance> {
        self.store.try_get_qualified(id, qualifier)
    }

    pub(crate) fn track_for_disposal(
        &self,
        binding: &DisposalBinding,
        instance: &Instance,
    ) -> DiResult<()> {
        let mut disposer = self.disposer.lock().unwrap();
        match binding {
            DisposalBinding::Sync(bind) => {
                if let Some(hook) = bind(instance) {
                    disposer.add_sync(hook)?;
                }
            }
            DisposalBinding::Async(bind) => {
                if let Some(hook) = bind(instance) {
                    disposer.add_async(hook)?;
                }
            }
        }
        Ok(())
    }

    // ===== Disposal =====

    /// Destroys the scope: raises `scope_ending`, releases owned
    /// instances in reverse registration order, clears the
    /// shared-instance maps, and marks the scope disposed. Idempotent.
    ///
    /// Instances registered for asynchronous release surface
    /// [`DiError::RequiresAsyncDisposal`]; use
    /// [`dispose_async`](Self::dispose_async) for those.
    pub fn dispose(&self) -> DiResult<()> {
        if self.disposing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        #[cfg(feature = "logging")]
        tracing::debug!(target: "canopy_di", tag = %self.tag, "disposing lifetime scope");

        self.scope_ending.fire(self);
        let result = self.disposer.lock().unwrap().dispose_sync();
        self.store.clear();
        self.disposed.store(true, Ordering::SeqCst);
        result
    }

    /// As [`dispose`](Self::dispose), awaiting asynchronous release
    /// hooks. Idempotent.
    pub async fn dispose_async(&self) -> DiResult<()> {
        if self.disposing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        #[cfg(feature = "logging")]
        tracing::debug!(target: "canopy_di", tag = %self.tag, "disposing lifetime scope (async)");

        self.scope_ending.fire(self);
        let hooks = self.disposer.lock().unwrap().take_for_async_drain();
        disposer::release_all(hooks).await;
        self.store.clear();
        self.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }

    // ===== Events =====

    /// Fired with each child scope as it is created.
    pub fn on_child_scope_beginning(
        &self,
        handler: impl Fn(&Arc<LifetimeScope>) + Send + Sync + 'static,
    ) {
        self.child_beginning.subscribe(handler);
    }

    /// Fired once when this scope begins disposal, before the disposer
    /// drains.
    pub fn on_scope_ending(&self, handler: impl Fn(&LifetimeScope) + Send + Sync + 'static) {
        self.scope_ending.subscribe(handler);
    }

    /// Fired with each resolve operation started from this scope,
    /// before its initiating request runs.
    pub fn on_resolve_operation_beginning(
        &self,
        handler: impl Fn(&ResolveOperation) + Send + Sync + 'static,
    ) {
        self.operation_beginning.subscribe(handler);
    }

    /// Registers a diagnostic sink observing every operation in this
    /// scope tree. Sinks live on the root scope.
    pub fn register_diagnostic_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        self.diagnostics.register(sink);
    }
}

impl Drop for LifetimeScope {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            if let Ok(disposer) = self.disposer.try_lock() {
                if disposer.len() > 0 {
                    eprintln!(
                        "[canopy-di] LifetimeScope dropped with unreleased resources. \
                         Call dispose() or dispose_async() before dropping."
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("tag", &self.tag)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
