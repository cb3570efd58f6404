//! Schema snapshot: catalog introspection rendered for the SQL prompt.

pub mod snapshot;

pub use snapshot::{SchemaDescription, SchemaSnapshotter, TableDescription};
