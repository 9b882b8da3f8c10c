//! Internal implementation details.

pub(crate) mod disposer;

pub(crate) use disposer::{BoxFutureUnit, Disposer};
