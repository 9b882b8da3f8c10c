//! Component registrations and their builder.

use std::any::Any;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::activator::{Activator, ActivationContext, DelegateActivator, ProvidedInstanceActivator};
use crate::error::{DiError, DiResult};
use crate::internal::BoxFutureUnit;
use crate::lifetime::{ComponentLifetime, ScopeTag};
use crate::resolve::middleware::{
    ActivationMiddleware, DecorationMiddleware, ScopeSelectionMiddleware, SharingMiddleware,
};
use crate::resolve::{Middleware, ResolvePipeline, ResolvePipelineBuilder};
use crate::service::Service;
use crate::traits::{AsyncDispose, Dispose};

/// Type-erased component instance shared through the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(0);

/// Stable, process-unique identity of a registration.
///
/// Shared-instance caches key on this id, and cycle detection compares
/// it to recognize a request already in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub(crate) fn next() -> Self {
        RegistrationId(NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether repeated resolves within the owning scope yield one instance
/// or a fresh one each time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// A fresh instance per resolve.
    None,
    /// One instance per owning scope, cached in its shared-instance
    /// store.
    Shared,
}

/// Who releases instances produced by a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The caller manages the instance; the scope never releases it.
    ExternallyOwned,
    /// The owning scope releases the instance when it is disposed.
    OwnedByLifetimeScope,
}

/// How an owned instance is handed to the scope's disposer.
///
/// There is no runtime trait query over `dyn Any`, so the registration
/// declares its release path at build time; the binder downcasts the
/// activated instance and produces the release hook.
#[derive(Clone)]
pub(crate) enum DisposalBinding {
    Sync(Arc<dyn Fn(&Instance) -> Option<Box<dyn FnOnce() + Send>> + Send + Sync>),
    Async(Arc<dyn Fn(&Instance) -> Option<Box<dyn FnOnce() -> BoxFutureUnit + Send>> + Send + Sync>),
}

/// An immutable binding of services to an activator, lifetime, sharing
/// policy, and resolve pipeline.
///
/// Registrations are built once with [`Registration::for_type`] or
/// [`Registration::provided_instance`] and then added to a
/// [`ComponentRegistry`](crate::ComponentRegistry).
///
/// # Examples
///
/// ```rust
/// use canopy_di::{LifetimeScope, Registration};
/// use std::sync::Arc;
///
/// struct Database {
///     url: String,
/// }
///
/// struct Repository {
///     db: Arc<Database>,
/// }
///
/// let root = LifetimeScope::root(|r| {
///     r.register(
///         Registration::for_type::<Database>()
///             .activate_with(|_| Ok(Database { url: "postgres://localhost".into() }))
///             .single_instance()
///             .build(),
///     );
///     r.register(
///         Registration::for_type::<Repository>()
///             .activate_with(|ctx| Ok(Repository { db: ctx.resolve::<Database>()? }))
///             .build(),
///     );
/// });
///
/// let repo = root.resolve_typed::<Repository>().unwrap();
/// assert_eq!(repo.db.url, "postgres://localhost");
/// ```
pub struct Registration {
    id: RegistrationId,
    services: Vec<Service>,
    activator: Arc<dyn Activator>,
    lifetime: ComponentLifetime,
    sharing: Sharing,
    ownership: Ownership,
    pipeline: ResolvePipeline,
    disposal: Option<DisposalBinding>,
}

impl Registration {
    /// Starts a registration for the concrete type `T`, provided by a
    /// factory set with [`RegistrationBuilder::activate_with`].
    pub fn for_type<T: Send + Sync + 'static>() -> RegistrationBuilder<T> {
        RegistrationBuilder::new()
    }

    /// Starts a registration handing out an existing instance: shared at
    /// the root scope and externally owned unless configured otherwise.
    pub fn provided_instance<T: Send + Sync + 'static>(value: T) -> RegistrationBuilder<T> {
        let mut builder = RegistrationBuilder::new();
        builder.activator = Some(Arc::new(ProvidedInstanceActivator::new(value)));
        builder.lifetime = ComponentLifetime::RootScope;
        builder.sharing = Sharing::Shared;
        builder.ownership = Ownership::ExternallyOwned;
        builder
    }

    /// The registration's stable identity.
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// The services this registration provides.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// True when this registration provides `service`.
    pub fn provides(&self, service: &Service) -> bool {
        self.services.iter().any(|s| s == service)
    }

    /// The registration's activator.
    pub fn activator(&self) -> &Arc<dyn Activator> {
        &self.activator
    }

    /// The lifetime policy picking the owning scope.
    pub fn lifetime(&self) -> &ComponentLifetime {
        &self.lifetime
    }

    /// The sharing mode.
    pub fn sharing(&self) -> Sharing {
        self.sharing
    }

    /// The ownership mode.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The precomposed resolve pipeline.
    pub fn pipeline(&self) -> &ResolvePipeline {
        &self.pipeline
    }

    pub(crate) fn disposal_binding(&self) -> Option<&DisposalBinding> {
        self.disposal.as_ref()
    }

    /// Human description: the activator plus the provided services.
    pub fn description(&self) -> String {
        let services = self
            .services
            .iter()
            .map(Service::description)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} providing [{}]", self.activator.description(), services)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("services", &self.services)
            .field("lifetime", &self.lifetime)
            .field("sharing", &self.sharing)
            .field("ownership", &self.ownership)
            .finish()
    }
}

// Activator standing in when a registration never received one; fails
// the way a reflection activator does when it finds nothing callable.
struct NoConstructorActivator {
    type_name: &'static str,
    description: String,
}

impl Activator for NoConstructorActivator {
    fn activate(&self, _ctx: &ActivationContext<'_>) -> DiResult<Instance> {
        Err(DiError::NoConstructorsFound {
            type_name: self.type_name,
        })
    }

    fn description(&self) -> &str {
        &self.description
    }
}

static SCOPE_SELECTION: Lazy<Arc<dyn Middleware>> =
    Lazy::new(|| Arc::new(ScopeSelectionMiddleware));
static DECORATION: Lazy<Arc<dyn Middleware>> = Lazy::new(|| Arc::new(DecorationMiddleware));
static SHARING: Lazy<Arc<dyn Middleware>> = Lazy::new(|| Arc::new(SharingMiddleware));
static ACTIVATION: Lazy<Arc<dyn Middleware>> = Lazy::new(|| Arc::new(ActivationMiddleware));

/// Fluent builder for [`Registration`].
pub struct RegistrationBuilder<T> {
    services: Vec<Service>,
    activator: Option<Arc<dyn Activator>>,
    lifetime: ComponentLifetime,
    sharing: Sharing,
    ownership: Ownership,
    middleware: Vec<Arc<dyn Middleware>>,
    pipeline_override: Option<ResolvePipeline>,
    disposal: Option<DisposalBinding>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> RegistrationBuilder<T> {
    fn new() -> Self {
        Self {
            services: vec![Service::of::<T>()],
            activator: None,
            lifetime: ComponentLifetime::CurrentScope,
            sharing: Sharing::None,
            ownership: Ownership::OwnedByLifetimeScope,
            middleware: Vec::new(),
            pipeline_override: None,
            disposal: None,
            _marker: PhantomData,
        }
    }

    /// Supplies the factory producing `T`.
    pub fn activate_with(
        mut self,
        factory: impl Fn(&ActivationContext<'_>) -> DiResult<T> + Send + Sync + 'static,
    ) -> Self {
        self.activator = Some(Arc::new(DelegateActivator::new(factory)));
        self
    }

    /// Supplies a custom [`Activator`] implementation instead of a
    /// factory closure.
    pub fn with_activator(mut self, activator: Arc<dyn Activator>) -> Self {
        self.activator = Some(activator);
        self
    }

    /// Registers under a string key instead of the bare type.
    pub fn named(mut self, key: impl Into<Cow<'static, str>>) -> Self {
        self.services[0] = Service::keyed::<T>(key);
        self
    }

    /// Provides an additional service besides the default one.
    pub fn as_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// A fresh instance per resolve, owned where it was resolved. The
    /// default.
    pub fn instance_per_dependency(mut self) -> Self {
        self.lifetime = ComponentLifetime::CurrentScope;
        self.sharing = Sharing::None;
        self
    }

    /// One shared instance for the whole scope tree, owned by the root.
    pub fn single_instance(mut self) -> Self {
        self.lifetime = ComponentLifetime::RootScope;
        self.sharing = Sharing::Shared;
        self
    }

    /// One shared instance per lifetime scope.
    pub fn instance_per_lifetime_scope(mut self) -> Self {
        self.lifetime = ComponentLifetime::CurrentScope;
        self.sharing = Sharing::Shared;
        self
    }

    /// One shared instance per nearest ancestor scope tagged with one of
    /// `tags`.
    pub fn instance_per_matching_scope(
        mut self,
        tags: impl IntoIterator<Item = impl Into<ScopeTag>>,
    ) -> Self {
        self.lifetime = ComponentLifetime::matching(tags);
        self.sharing = Sharing::Shared;
        self
    }

    /// The caller keeps responsibility for releasing instances.
    pub fn externally_owned(mut self) -> Self {
        self.ownership = Ownership::ExternallyOwned;
        self
    }

    /// The owning scope releases instances on disposal. The default.
    pub fn owned_by_lifetime_scope(mut self) -> Self {
        self.ownership = Ownership::OwnedByLifetimeScope;
        self
    }

    /// Releases owned instances through [`Dispose`] when the owning
    /// scope is disposed.
    pub fn dispose_with_scope(mut self) -> Self
    where
        T: Dispose,
    {
        self.disposal = Some(DisposalBinding::Sync(Arc::new(|instance: &Instance| {
            let concrete = instance.clone().downcast::<T>().ok()?;
            Some(Box::new(move || concrete.dispose()) as Box<dyn FnOnce() + Send>)
        })));
        self
    }

    /// Releases owned instances through [`AsyncDispose`] during
    /// `dispose_async` of the owning scope.
    pub fn dispose_async_with_scope(mut self) -> Self
    where
        T: AsyncDispose,
    {
        self.disposal = Some(DisposalBinding::Async(Arc::new(|instance: &Instance| {
            let concrete = instance.clone().downcast::<T>().ok()?;
            Some(Box::new(move || -> BoxFutureUnit {
                Box::pin(async move { concrete.dispose().await })
            }) as Box<dyn FnOnce() -> BoxFutureUnit + Send>)
        })));
        self
    }

    /// Adds middleware to the registration's pipeline; it is slotted by
    /// its declared phase.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Replaces the default pipeline entirely. Intended for tests and
    /// advanced integrations; the default stages are not re-added.
    pub fn with_pipeline(mut self, pipeline: ResolvePipeline) -> Self {
        self.pipeline_override = Some(pipeline);
        self
    }

    /// Finalizes the registration.
    pub fn build(self) -> Arc<Registration> {
        let activator = self.activator.unwrap_or_else(|| {
            Arc::new(NoConstructorActivator {
                type_name: std::any::type_name::<T>(),
                description: format!("activator for {}", std::any::type_name::<T>()),
            })
        });

        let pipeline = match self.pipeline_override {
            Some(pipeline) => pipeline,
            None => {
                let mut builder = ResolvePipelineBuilder::new();
                builder.add(SCOPE_SELECTION.clone());
                builder.add(DECORATION.clone());
                builder.add(SHARING.clone());
                builder.add(ACTIVATION.clone());
                for m in self.middleware {
                    builder.add(m);
                }
                builder.build()
            }
        };

        Arc::new(Registration {
            id: RegistrationId::next(),
            services: self.services,
            activator,
            lifetime: self.lifetime,
            sharing: self.sharing,
            ownership: self.ownership,
            pipeline,
            disposal: self.disposal,
        })
    }
}
