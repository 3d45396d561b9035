//! Built-in document providers.

mod local;

pub use local::{LocalProvider, LOCAL_AUTHORITY};
