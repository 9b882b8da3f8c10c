//! Resolve-request parameters.

use std::any::TypeId;
use std::borrow::Cow;
use std::sync::Arc;

use crate::registration::Instance;

/// A tagged value supplied alongside a resolve request.
///
/// Parameters are carried through the pipeline as an opaque ordered
/// sequence; only activators interpret them, matching by name or by type
/// against their own inputs.
///
/// # Examples
///
/// ```rust
/// use canopy_di::Parameter;
///
/// let by_name = Parameter::named("connection_string", "postgres://localhost".to_string());
/// let by_type = Parameter::typed(8080u16);
///
/// assert_eq!(by_name.name(), Some("connection_string"));
/// assert_eq!(*by_type.get::<u16>().unwrap(), 8080);
/// assert!(by_type.get::<u32>().is_none());
/// ```
#[derive(Clone)]
pub struct Parameter {
    name: Option<Cow<'static, str>>,
    type_id: TypeId,
    type_name: &'static str,
    value: Instance,
}

impl Parameter {
    /// A parameter matched by name.
    pub fn named<T: Send + Sync + 'static>(
        name: impl Into<Cow<'static, str>>,
        value: T,
    ) -> Self {
        Self {
            name: Some(name.into()),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// A parameter matched by its value type alone.
    pub fn typed<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            name: None,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// The parameter's name, if it was registered by name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The type name of the carried value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The carried value if it is a `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        if self.type_id == TypeId::of::<T>() {
            self.value.clone().downcast::<T>().ok()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

/// Finds the first parameter named `name` carrying a `T`.
pub fn named_parameter<T: Send + Sync + 'static>(
    parameters: &[Parameter],
    name: &str,
) -> Option<Arc<T>> {
    parameters
        .iter()
        .filter(|p| p.name() == Some(name))
        .find_map(|p| p.get::<T>())
}

/// Finds the first parameter carrying a `T`, regardless of name.
pub fn typed_parameter<T: Send + Sync + 'static>(parameters: &[Parameter]) -> Option<Arc<T>> {
    parameters.iter().find_map(|p| p.get::<T>())
}
