//! # ca-db
//!
//! PostgreSQL storage for content attachments, using SQLx.
//!
//! - Connection pool management
//! - Schema bootstrap for `attachments` and `attachment_data`
//! - [`AttachmentRepository`], implementing the attachment store contracts
//!   with atomic counter updates
//!
//! ## Example
//!
//! ```ignore
//! use ca_core::config::AppConfig;
//! use ca_db::{schema, AttachmentRepository, Database};
//!
//! let config = AppConfig::from_env()?;
//! let db = Database::connect(&config.database).await?;
//! schema::ensure_schema(db.pool()).await?;
//!
//! let repo = Arc::new(AttachmentRepository::new(db.pool().clone()));
//! let service = AttachmentService::new(repo.clone(), repo, registry, config.attachments);
//! ```

pub mod attachments;
pub mod pool;
pub mod repository;
pub mod schema;

pub use attachments::{AttachmentRepository, AttachmentRow};
pub use pool::{Database, PoolStats};
pub use repository::{RepositoryError, RepositoryResult};
