//! Per-scope shared-instance cache.

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;

use crate::error::{DiError, DiResult};
use crate::registration::{Instance, RegistrationId};

/// Concurrency-safe singleton store keyed by registration id with an
/// optional qualifier.
///
/// Reads are lock-free and never block writers. Creation is
/// double-checked: a miss takes the store's reentrant mutex, re-reads,
/// and runs the creator under the lock. The lock is reentrant because
/// the creator legitimately resolves other shared components of the
/// same scope on the same thread. An occupied slot at insertion time means the creator
/// recursively resolved the very component being constructed, which
/// fails with [`DiError::SelfConstructingDependency`].
pub(crate) struct SharedInstanceStore {
    by_id: DashMap<RegistrationId, Instance, RandomState>,
    by_qualified: DashMap<(RegistrationId, RegistrationId), Instance, RandomState>,
    create_lock: ReentrantMutex<()>,
}

impl Default for SharedInstanceStore {
    fn default() -> Self {
        Self {
            by_id: DashMap::with_hasher(RandomState::new()),
            by_qualified: DashMap::with_hasher(RandomState::new()),
            create_lock: ReentrantMutex::new(()),
        }
    }
}

impl SharedInstanceStore {
    /// Lock-free lookup by registration id.
    pub(crate) fn try_get(&self, id: RegistrationId) -> Option<Instance> {
        self.by_id.get(&id).map(|entry| entry.value().clone())
    }

    /// Lock-free lookup; an absent qualifier delegates to the single-key
    /// variant.
    pub(crate) fn try_get_qualified(
        &self,
        id: RegistrationId,
        qualifier: Option<RegistrationId>,
    ) -> Option<Instance> {
        match qualifier {
            None => self.try_get(id),
            Some(qualifier) => self
                .by_qualified
                .get(&(id, qualifier))
                .map(|entry| entry.value().clone()),
        }
    }

    /// Returns the cached instance or runs `creator` to populate the
    /// slot. A creator yielding `None` records nothing.
    pub(crate) fn get_or_create(
        &self,
        id: RegistrationId,
        qualifier: Option<RegistrationId>,
        creator: impl FnOnce() -> DiResult<Option<Instance>>,
    ) -> DiResult<Option<Instance>> {
        if let Some(found) = self.try_get_qualified(id, qualifier) {
            return Ok(Some(found));
        }

        let _guard = self.create_lock.lock();
        if let Some(found) = self.try_get_qualified(id, qualifier) {
            return Ok(Some(found));
        }

        let created = match creator()? {
            Some(instance) => instance,
            None => return Ok(None),
        };

        match qualifier {
            None => match self.by_id.entry(id) {
                Entry::Occupied(_) => Err(DiError::SelfConstructingDependency {
                    component: format!("registration {id:?}"),
                }),
                Entry::Vacant(slot) => {
                    slot.insert(created.clone());
                    Ok(Some(created))
                }
            },
            Some(qualifier) => match self.by_qualified.entry((id, qualifier)) {
                Entry::Occupied(_) => Err(DiError::SelfConstructingDependency {
                    component: format!("registration {id:?}"),
                }),
                Entry::Vacant(slot) => {
                    slot.insert(created.clone());
                    Ok(Some(created))
                }
            },
        }
    }

    /// Drops every cached instance. Called by scope disposal.
    pub(crate) fn clear(&self) {
        self.by_id.clear();
        self.by_qualified.clear();
    }
}
