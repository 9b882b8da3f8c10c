//! Disposal traits for resource cleanup.

/// Trait for synchronous resource release.
///
/// Components owned by their lifetime scope and registered with
/// `dispose_with_scope()` are released through this trait when the scope
/// is disposed, in reverse registration order.
///
/// # Examples
///
/// ```
/// use canopy_di::Dispose;
///
/// struct Connection {
///     url: String,
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         println!("closing {}", self.url);
///     }
/// }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Trait for asynchronous resource release.
///
/// Components registered with `dispose_async_with_scope()` are awaited
/// one at a time during `LifetimeScope::dispose_async`. They are never
/// released on the synchronous disposal path.
///
/// # Examples
///
/// ```
/// use canopy_di::AsyncDispose;
/// use async_trait::async_trait;
///
/// struct Client {
///     session: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for Client {
///     async fn dispose(&self) {
///         // graceful shutdown
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self);
}
