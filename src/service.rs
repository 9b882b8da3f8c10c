//! Service identity for registration and lookup.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;

/// Identifies what a registration provides and what a resolve request
/// asks for.
///
/// A service is either a plain type or a type qualified by a string key,
/// for cases where several components of the same type need separate
/// registrations. Services compare by value and are cheap to clone.
///
/// # Examples
///
/// ```rust
/// use canopy_di::Service;
///
/// let plain = Service::of::<u32>();
/// let keyed = Service::keyed::<u32>("http-port");
///
/// assert_eq!(plain, Service::of::<u32>());
/// assert_ne!(plain, keyed);
/// assert_eq!(keyed.key(), Some("http-port"));
/// ```
#[derive(Debug, Clone)]
pub enum Service {
    /// A concrete type, carrying its `TypeId` and type name for display.
    Typed(TypeId, &'static str),
    /// A concrete type qualified by a string key.
    Keyed(TypeId, &'static str, Cow<'static, str>),
}

impl Service {
    /// Service identity for the type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Service::Typed(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Service identity for the type `T` under the given key.
    pub fn keyed<T: ?Sized + 'static>(key: impl Into<Cow<'static, str>>) -> Self {
        Service::Keyed(TypeId::of::<T>(), std::any::type_name::<T>(), key.into())
    }

    /// The type name backing this service.
    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Typed(_, name) => name,
            Service::Keyed(_, name, _) => name,
        }
    }

    /// The key for keyed services, `None` otherwise.
    pub fn key(&self) -> Option<&str> {
        match self {
            Service::Typed(_, _) => None,
            Service::Keyed(_, _, key) => Some(key),
        }
    }

    /// Human description used in error messages and diagnostics.
    pub fn description(&self) -> String {
        match self {
            Service::Typed(_, name) => (*name).to_string(),
            Service::Keyed(_, name, key) => format!("{name} (key {key:?})"),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Typed(_, name) => f.write_str(name),
            Service::Keyed(_, name, key) => write!(f, "{name} (key {key:?})"),
        }
    }
}

// Equality and hashing compare TypeId (plus key); the display name is
// implied by the TypeId and excluded.
impl PartialEq for Service {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Service::Typed(a, _), Service::Typed(b, _)) => a == b,
            (Service::Keyed(a, _, ka), Service::Keyed(b, _, kb)) => a == b && ka == kb,
            _ => false,
        }
    }
}

impl Eq for Service {}

impl std::hash::Hash for Service {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Service::Typed(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            Service::Keyed(id, _, key) => {
                1u8.hash(state);
                id.hash(state);
                key.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn typed_services_compare_by_type() {
        assert_eq!(Service::of::<String>(), Service::of::<String>());
        assert_ne!(Service::of::<String>(), Service::of::<u32>());
    }

    #[test]
    fn keyed_services_compare_by_type_and_key() {
        assert_eq!(Service::keyed::<u32>("a"), Service::keyed::<u32>("a"));
        assert_ne!(Service::keyed::<u32>("a"), Service::keyed::<u32>("b"));
        assert_ne!(Service::keyed::<u32>("a"), Service::of::<u32>());
    }

    #[test]
    fn services_are_usable_as_map_keys() {
        let mut map = HashMap::new();
        map.insert(Service::of::<String>(), 1);
        map.insert(Service::keyed::<String>("other"), 2);
        assert_eq!(map.get(&Service::of::<String>()), Some(&1));
        assert_eq!(map.get(&Service::keyed::<String>("other")), Some(&2));
    }
}
