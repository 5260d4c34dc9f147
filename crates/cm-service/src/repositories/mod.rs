//! Repository layer for change metadata.

pub mod metadata_store;

pub use metadata_store::{FileMetadataStore, MetadataStore, StoreLocation};
