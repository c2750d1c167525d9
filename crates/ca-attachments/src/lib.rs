//! # ca-attachments
//!
//! Attachment records and their lifecycle.
//!
//! ## Features
//!
//! - Pending uploads keyed by a temp hash, associated with content later
//! - Pluggable per-content-type handlers (container lookup, view permission, links)
//! - Reference counting on the shared file data row
//! - In-memory store for tests and embedding
//!
//! ## Example
//!
//! ```rust,ignore
//! use ca_attachments::{AttachmentService, HandlerRegistry, MemoryAttachmentStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryAttachmentStore::new());
//! let registry = Arc::new(HandlerRegistry::new().with_handler(Arc::new(PostHandler)));
//! let service = AttachmentService::new(store.clone(), store, registry, Default::default());
//!
//! // Upload while the post is still being written
//! let mut upload = service.new_pending(data_id, generate_temp_hash());
//! service.save(&mut upload).await?;
//!
//! // Post saved: claim the uploads
//! service.associate_pending(&upload.temp_hash, "post", post_id).await?;
//! ```

pub mod error;
pub mod handler;
pub mod model;
pub mod registry;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AttachmentError, AttachmentResult};
pub use handler::{Container, ContainerLink, ContainerRef, ContentTypeHandler, ViewDecision};
pub use model::{
    generate_temp_hash, Attachment, AttachmentData, MAX_CONTENT_TYPE_LEN, MAX_TEMP_HASH_LEN,
};
pub use registry::HandlerRegistry;
pub use service::AttachmentService;
pub use store::{AttachmentDataStore, AttachmentStore, MemoryAttachmentStore};
