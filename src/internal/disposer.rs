//! Ordered release of scope-owned resources.

use std::future::Future;
use std::pin::Pin;

use crate::error::{DiError, DiResult};

/// Future type for asynchronous release hooks.
pub(crate) type BoxFutureUnit = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A single queued release action.
pub(crate) enum ReleaseHook {
    Sync(Box<dyn FnOnce() + Send>),
    Async(Box<dyn FnOnce() -> BoxFutureUnit + Send>),
}

/// Ordered collection of release hooks owned by a lifetime scope.
///
/// Hooks are released in reverse insertion order. The synchronous path
/// never bridges to the asynchronous one: an async hook reached during
/// `dispose_sync` surfaces [`DiError::RequiresAsyncDisposal`] while the
/// remaining hooks still attempt release. After disposal further adds
/// fail with [`DiError::ScopeDisposed`].
#[derive(Default)]
pub(crate) struct Disposer {
    entries: Vec<ReleaseHook>,
    disposed: bool,
}

impl Disposer {
    /// Queues a synchronous release hook.
    pub(crate) fn add_sync(&mut self, f: Box<dyn FnOnce() + Send>) -> DiResult<()> {
        if self.disposed {
            return Err(DiError::ScopeDisposed);
        }
        self.entries.push(ReleaseHook::Sync(f));
        Ok(())
    }

    /// Queues an asynchronous release hook.
    pub(crate) fn add_async(
        &mut self,
        f: Box<dyn FnOnce() -> BoxFutureUnit + Send>,
    ) -> DiResult<()> {
        if self.disposed {
            return Err(DiError::ScopeDisposed);
        }
        self.entries.push(ReleaseHook::Async(f));
        Ok(())
    }

    /// Number of hooks still queued.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Releases every hook in reverse insertion order without awaiting.
    ///
    /// The first failure is remembered and returned once all remaining
    /// hooks have attempted release.
    pub(crate) fn dispose_sync(&mut self) -> DiResult<()> {
        self.disposed = true;
        let mut first_error = None;
        while let Some(hook) = self.entries.pop() {
            match hook {
                ReleaseHook::Sync(f) => f(),
                ReleaseHook::Async(_) => {
                    first_error.get_or_insert(DiError::RequiresAsyncDisposal);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Marks the disposer disposed and hands the queued hooks to the
    /// caller for an async drain (the scope's mutex must not be held
    /// across awaits).
    pub(crate) fn take_for_async_drain(&mut self) -> Vec<ReleaseHook> {
        self.disposed = true;
        std::mem::take(&mut self.entries)
    }
}

/// Releases hooks taken by [`Disposer::take_for_async_drain`] in reverse
/// insertion order, awaiting each asynchronous hook.
pub(crate) async fn release_all(mut entries: Vec<ReleaseHook>) {
    while let Some(hook) = entries.pop() {
        match hook {
            ReleaseHook::Sync(f) => f(),
            ReleaseHook::Async(f) => f().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn sync_release_runs_in_reverse_insertion_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut disposer = Disposer::default();
        for name in ["first", "second", "third"] {
            let order = order.clone();
            disposer
                .add_sync(Box::new(move || order.lock().unwrap().push(name)))
                .unwrap();
        }
        disposer.dispose_sync().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[test]
    fn add_after_disposal_fails() {
        let mut disposer = Disposer::default();
        disposer.dispose_sync().unwrap();
        let result = disposer.add_sync(Box::new(|| {}));
        assert!(matches!(result, Err(DiError::ScopeDisposed)));
    }

    #[test]
    fn async_hook_on_sync_path_surfaces_but_does_not_stop_release() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut disposer = Disposer::default();
        {
            let order = order.clone();
            disposer
                .add_sync(Box::new(move || order.lock().unwrap().push("sync-early")))
                .unwrap();
        }
        disposer
            .add_async(Box::new(|| Box::pin(async {})))
            .unwrap();
        {
            let order = order.clone();
            disposer
                .add_sync(Box::new(move || order.lock().unwrap().push("sync-late")))
                .unwrap();
        }
        let result = disposer.dispose_sync();
        assert!(matches!(result, Err(DiError::RequiresAsyncDisposal)));
        assert_eq!(*order.lock().unwrap(), vec!["sync-late", "sync-early"]);
    }
}
