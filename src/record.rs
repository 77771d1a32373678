//! The trait a type implements to be mapped to table rows.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A typed record mapped to one table row.
///
/// The serde shape of the implementing type defines which properties exist;
/// attribute declarations in the registered schema add store name and type
/// overrides on top. Lifecycle hooks default to no-ops; they are invoked
/// with no arguments and mutate the record in place.
///
/// ```rust
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Deserialize, Serialize)]
/// struct Project {
///     name: String,
///     version: String,
///     revision: u32,
///     date: u64,
/// }
///
/// impl dynamodb_mapper::record::Record for Project {}
/// ```
pub trait Record: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Invoked on a record before it is written by `put`.
    fn pre_put(&mut self) {}

    /// Invoked on the resolved record before an update expression is built.
    fn pre_update(&mut self) {}

    /// Invoked on a record after it is loaded from the store.
    fn post_load(&mut self) {}
}
