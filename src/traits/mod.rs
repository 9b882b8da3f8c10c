//! Public traits implemented by user components.

mod dispose;

pub use dispose::{AsyncDispose, Dispose};
