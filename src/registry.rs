//! Per-scope component registries.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::registration::{Instance, Registration, RegistrationId};
use crate::resolve::{Middleware, ResolvePipeline, ResolvePipelineBuilder};
use crate::service::Service;

/// A dynamic provider of registrations, consulted when a service has no
/// directly registered component.
///
/// Sources are cloned into child registries when a scope begins a child;
/// isolated children inherit only sources that adapt individual
/// components.
pub trait RegistrationSource: Send + Sync {
    /// Registrations this source can provide for `service`. The
    /// `accessor` exposes the registrations already present in the
    /// registry chain so adapter sources can wrap them.
    fn registrations_for(
        &self,
        service: &Service,
        accessor: &dyn Fn(&Service) -> Vec<Arc<Registration>>,
    ) -> Vec<Arc<Registration>>;

    /// True when the source adapts individual component registrations
    /// (and is therefore safe to inherit into isolated child scopes).
    fn is_adapter_for_individual_components(&self) -> bool {
        false
    }

    /// True when the source keeps per-scope state and must not be shared
    /// across sibling scopes.
    fn is_per_scope(&self) -> bool {
        false
    }

    /// Human description for diagnostics.
    fn description(&self) -> &str {
        "registration source"
    }
}

/// Holds a scope's local registrations, decorators, sources, service
/// middleware and properties, chained to the nearest ancestor registry
/// that has local components of its own.
///
/// A registry is mutated only while its scope is being configured; once
/// the owning scope exists the registry is frozen behind an `Arc` and is
/// safe for concurrent reads.
pub struct ComponentRegistry {
    registrations: HashMap<Service, Vec<Arc<Registration>>>,
    decorators: HashMap<Service, Vec<Arc<Registration>>>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    service_middleware: HashMap<Service, Vec<Arc<dyn Middleware>>>,
    properties: HashMap<Cow<'static, str>, Instance>,
    parent: Option<Arc<ComponentRegistry>>,
    merged_pipelines: RwLock<HashMap<(Service, RegistrationId), ResolvePipeline>>,
}

impl ComponentRegistry {
    /// An empty root registry.
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            decorators: HashMap::new(),
            sources: Vec::new(),
            service_middleware: HashMap::new(),
            properties: HashMap::new(),
            parent: None,
            merged_pipelines: RwLock::new(HashMap::new()),
        }
    }

    /// A child registry chained to `parent`'s nearest ancestor (or
    /// `parent` itself) that carries local components. Deeper ancestors
    /// are reached transitively through that link, so adapter sources
    /// are never visited twice.
    pub(crate) fn child_of(parent: &Arc<ComponentRegistry>, isolated: bool) -> Self {
        let parent_link = if parent.has_local_components() {
            Some(parent.clone())
        } else {
            parent.parent.clone()
        };
        let sources = parent
            .sources
            .iter()
            .filter(|s| !isolated || s.is_adapter_for_individual_components())
            .cloned()
            .collect();
        Self {
            registrations: HashMap::new(),
            decorators: HashMap::new(),
            sources,
            service_middleware: HashMap::new(),
            properties: HashMap::new(),
            parent: parent_link,
            merged_pipelines: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a registration under every service it provides.
    pub fn register(&mut self, registration: Arc<Registration>) {
        for service in registration.services() {
            self.registrations
                .entry(service.clone())
                .or_default()
                .push(registration.clone());
        }
    }

    /// Adds a decorator for `service`. Decorators apply in registration
    /// order, innermost first.
    pub fn register_decorator(&mut self, service: Service, registration: Arc<Registration>) {
        self.decorators
            .entry(service)
            .or_default()
            .push(registration);
    }

    /// Adds a dynamic registration source.
    pub fn register_source(&mut self, source: Arc<dyn RegistrationSource>) {
        self.sources.push(source);
    }

    /// Adds middleware applied to every resolve of `service`, merged by
    /// phase with the registration's own pipeline.
    pub fn register_service_middleware(
        &mut self,
        service: Service,
        middleware: Arc<dyn Middleware>,
    ) {
        self.service_middleware
            .entry(service)
            .or_default()
            .push(middleware);
    }

    /// Sets a property visible from this scope and its children; child
    /// values override ancestors.
    pub fn set_property<T: Send + Sync + 'static>(
        &mut self,
        key: impl Into<Cow<'static, str>>,
        value: T,
    ) {
        self.properties.insert(key.into(), Arc::new(value));
    }

    /// Looks a property up, falling back through the ancestor chain.
    pub fn property<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        if let Some(value) = self.properties.get(key) {
            return value.clone().downcast::<T>().ok();
        }
        self.parent.as_ref().and_then(|p| p.property::<T>(key))
    }

    pub(crate) fn has_local_components(&self) -> bool {
        !self.registrations.is_empty()
            || !self.decorators.is_empty()
            || !self.sources.is_empty()
            || !self.service_middleware.is_empty()
            || !self.properties.is_empty()
    }

    fn chained_local_registrations(&self, service: &Service, out: &mut Vec<Arc<Registration>>) {
        if let Some(parent) = &self.parent {
            parent.chained_local_registrations(service, out);
        }
        if let Some(local) = self.registrations.get(service) {
            out.extend(local.iter().cloned());
        }
    }

    /// Every registration providing `service`, ancestors first, locals
    /// next, source-provided last. The final entry is the default.
    pub fn registrations_for(&self, service: &Service) -> Vec<Arc<Registration>> {
        let mut out = Vec::new();
        self.chained_local_registrations(service, &mut out);
        let accessor = |s: &Service| {
            let mut v = Vec::new();
            self.chained_local_registrations(s, &mut v);
            v
        };
        for source in &self.sources {
            out.extend(source.registrations_for(service, &accessor));
        }
        out
    }

    /// The registration a bare `resolve` of `service` uses: the most
    /// recently added local one, or the nearest ancestor's, or the last
    /// source-provided one.
    pub fn default_registration_for(&self, service: &Service) -> Option<Arc<Registration>> {
        let mut locals = Vec::new();
        self.chained_local_registrations(service, &mut locals);
        if let Some(found) = locals.last() {
            return Some(found.clone());
        }
        let accessor = |s: &Service| {
            let mut v = Vec::new();
            self.chained_local_registrations(s, &mut v);
            v
        };
        let mut provided = Vec::new();
        for source in &self.sources {
            provided.extend(source.registrations_for(service, &accessor));
        }
        provided.last().cloned()
    }

    /// Decorators applicable to `service`, in registration order across
    /// the ancestor chain.
    pub fn decorators_for(&self, service: &Service) -> Vec<Arc<Registration>> {
        let mut out = Vec::new();
        self.chained_decorators(service, &mut out);
        out
    }

    fn chained_decorators(&self, service: &Service, out: &mut Vec<Arc<Registration>>) {
        if let Some(parent) = &self.parent {
            parent.chained_decorators(service, out);
        }
        if let Some(local) = self.decorators.get(service) {
            out.extend(local.iter().cloned());
        }
    }

    fn chained_service_middleware(&self, service: &Service, out: &mut Vec<Arc<dyn Middleware>>) {
        if let Some(parent) = &self.parent {
            parent.chained_service_middleware(service, out);
        }
        if let Some(local) = self.service_middleware.get(service) {
            out.extend(local.iter().cloned());
        }
    }

    /// The effective pipeline for resolving `service` through
    /// `registration`: the registration's precomposed pipeline, merged
    /// (stable, by phase) with any service middleware and cached.
    pub(crate) fn pipeline_for(
        &self,
        service: &Service,
        registration: &Registration,
    ) -> ResolvePipeline {
        let mut service_middleware = Vec::new();
        self.chained_service_middleware(service, &mut service_middleware);
        if service_middleware.is_empty() {
            return registration.pipeline().clone();
        }

        let cache_key = (service.clone(), registration.id());
        if let Some(found) = self.merged_pipelines.read().unwrap().get(&cache_key) {
            return found.clone();
        }

        let mut builder = ResolvePipelineBuilder::new();
        for stage in registration.pipeline().stages() {
            builder.add(stage.clone());
        }
        for stage in service_middleware {
            builder.add(stage);
        }
        let merged = builder.build();
        self.merged_pipelines
            .write()
            .unwrap()
            .insert(cache_key, merged.clone());
        merged
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
