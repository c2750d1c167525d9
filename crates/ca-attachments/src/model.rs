//! Attachment Model
//!
//! An [`Attachment`] ties one stored file ([`AttachmentData`]) to a piece of
//! content. Until that content exists the attachment is *pending*: it carries
//! a temp hash instead of a content id.

use std::sync::Arc;

use ca_core::{Id, Identifiable, UserContext, ValidationErrors};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::{AttachmentError, AttachmentResult};
use crate::handler::{ContainerLink, ContainerRef, ContentTypeHandler, ViewDecision};
use crate::registry::HandlerRegistry;

/// Column limit for `content_type`
pub const MAX_CONTENT_TYPE_LEN: usize = 25;
/// Column limit for `temp_hash`
pub const MAX_TEMP_HASH_LEN: usize = 32;

/// Fresh 32 character temp hash for an upload session
pub fn generate_temp_hash() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Physical file metadata, shared by every attachment of the same file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentData {
    pub data_id: Id,
    /// Uploader
    pub user_id: Id,
    pub filename: String,
    /// Size in bytes
    pub file_size: i64,
    /// Content hash, also part of the thumbnail path
    pub file_hash: String,
    pub width: i32,
    pub height: i32,
    pub thumbnail_width: i32,
    pub thumbnail_height: i32,
    /// Unix timestamp
    pub upload_date: i64,
    /// Number of attachments referencing this row
    pub attach_count: i64,
}

impl AttachmentData {
    pub fn new(data_id: Id, filename: impl Into<String>, file_size: i64) -> Self {
        Self {
            data_id,
            user_id: 0,
            filename: filename.into(),
            file_size,
            file_hash: String::new(),
            width: 0,
            height: 0,
            thumbnail_width: 0,
            thumbnail_height: 0,
            upload_date: 0,
            attach_count: 0,
        }
    }

    /// Lowercased text after the last dot, empty when there is none
    pub fn extension(&self) -> String {
        match self.filename.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        }
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_width > 0
    }

    /// `{base}/{bucket}/{data_id}-{file_hash}.jpg`, bucketed by thousands
    pub fn thumbnail_url(&self, base_url: &str) -> String {
        if !self.has_thumbnail() {
            return String::new();
        }
        format!(
            "{}/{}/{}-{}.jpg",
            base_url.trim_end_matches('/'),
            self.data_id / 1000,
            self.data_id,
            self.file_hash
        )
    }
}

/// An attachment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Assigned on first save
    pub attachment_id: Option<Id>,
    pub data_id: Id,
    /// Handler key; empty until attached
    pub content_type: String,
    /// 0 while pending
    pub content_id: Id,
    /// Unix timestamp
    pub attach_date: i64,
    /// Set only while pending
    pub temp_hash: String,
    /// Mirrors `content_id == 0` after every save
    pub unassociated: bool,
    pub view_count: i64,
    /// Eagerly loaded data row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AttachmentData>,
    #[serde(skip)]
    container: OnceCell<Option<ContainerRef>>,
}

impl Attachment {
    /// A pending upload, not yet tied to content
    pub fn pending(data_id: Id, temp_hash: impl Into<String>, attach_date: i64) -> Self {
        Self {
            attachment_id: None,
            data_id,
            content_type: String::new(),
            content_id: 0,
            attach_date,
            temp_hash: temp_hash.into(),
            unassociated: true,
            view_count: 0,
            data: None,
            container: OnceCell::new(),
        }
    }

    /// An attachment created directly against existing content
    pub fn for_content(
        data_id: Id,
        content_type: impl Into<String>,
        content_id: Id,
        attach_date: i64,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            content_id,
            unassociated: content_id == 0,
            ..Self::pending(data_id, String::new(), attach_date)
        }
    }

    pub fn with_data(mut self, data: AttachmentData) -> Self {
        self.data = Some(data);
        self
    }

    /// Still waiting for its content
    pub fn is_pending(&self) -> bool {
        !self.temp_hash.is_empty()
    }

    /// Copy of the persisted columns only, without relation or cached container
    pub fn columns(&self) -> Self {
        Self {
            data: None,
            container: OnceCell::new(),
            content_type: self.content_type.clone(),
            temp_hash: self.temp_hash.clone(),
            ..*self
        }
    }

    // ------------------------------------------------------------------
    // Derived from the data row
    // ------------------------------------------------------------------

    pub fn filename(&self) -> &str {
        self.data.as_ref().map(|d| d.filename.as_str()).unwrap_or("")
    }

    pub fn extension(&self) -> String {
        self.data.as_ref().map(AttachmentData::extension).unwrap_or_default()
    }

    pub fn file_size(&self) -> i64 {
        self.data.as_ref().map(|d| d.file_size).unwrap_or(0)
    }

    pub fn has_thumbnail(&self) -> bool {
        self.data.as_ref().map(AttachmentData::has_thumbnail).unwrap_or(false)
    }

    pub fn thumbnail_url(&self, base_url: &str) -> String {
        self.data
            .as_ref()
            .map(|d| d.thumbnail_url(base_url))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Handler-backed behaviour
    // ------------------------------------------------------------------

    /// Handler for this attachment's content type, looked up fresh each call
    pub fn handler(&self, registry: &HandlerRegistry) -> Option<Arc<dyn ContentTypeHandler>> {
        registry.handler_for(&self.content_type)
    }

    /// The container, resolved once and then served from the cache
    pub async fn container(
        &self,
        registry: &HandlerRegistry,
    ) -> AttachmentResult<Option<ContainerRef>> {
        let container = self
            .container
            .get_or_try_init(|| async {
                match self.handler(registry) {
                    Some(handler) => handler.container_entity(self.content_id).await,
                    None => Ok(None),
                }
            })
            .await?;
        Ok(container.clone())
    }

    /// Prime the container cache with an already loaded entity
    pub fn set_container(&mut self, container: Option<ContainerRef>) {
        self.container = OnceCell::new_with(Some(container));
    }

    pub async fn can_view(
        &self,
        viewer: &dyn UserContext,
        registry: &HandlerRegistry,
    ) -> AttachmentResult<ViewDecision> {
        if self.is_pending() || self.content_type.is_empty() {
            return Ok(ViewDecision::deny());
        }

        let Some(handler) = self.handler(registry) else {
            return Ok(ViewDecision::deny());
        };

        let Some(container) = self.container(registry).await? else {
            return Ok(ViewDecision::deny());
        };

        handler.can_view(self, &container, viewer).await
    }

    pub async fn container_link(
        &self,
        registry: &HandlerRegistry,
    ) -> AttachmentResult<Option<ContainerLink>> {
        let Some(container) = self.container(registry).await? else {
            return Ok(None);
        };
        Ok(self
            .handler(registry)
            .map(|handler| handler.container_link(&container)))
    }

    pub fn content_type_phrase(&self, registry: &HandlerRegistry) -> Option<String> {
        self.handler(registry)
            .map(|handler| handler.content_type_phrase())
    }

    // ------------------------------------------------------------------
    // Save preparation
    // ------------------------------------------------------------------

    /// Column checks
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.data_id <= 0 {
            errors.add("data_id", "is required");
        }
        if self.content_id < 0 {
            errors.add("content_id", "must not be negative");
        }
        if self.content_type.chars().count() > MAX_CONTENT_TYPE_LEN {
            errors.add(
                "content_type",
                format!("is too long (maximum is {} characters)", MAX_CONTENT_TYPE_LEN),
            );
        }
        if self.temp_hash.chars().count() > MAX_TEMP_HASH_LEN {
            errors.add(
                "temp_hash",
                format!("is too long (maximum is {} characters)", MAX_TEMP_HASH_LEN),
            );
        }
        if self.attach_date < 0 {
            errors.add("attach_date", "must not be negative");
        }
        if self.view_count < 0 {
            errors.add("view_count", "must not be negative");
        }

        errors.into_result()
    }

    /// Validate and normalize the pending/associated state before persisting
    pub fn pre_save(&mut self) -> AttachmentResult<()> {
        self.validate()?;

        if self.content_id == 0 {
            if self.temp_hash.is_empty() {
                return Err(AttachmentError::Logic(
                    "Temp hash must be specified if no content is specified.".to_string(),
                ));
            }
            self.unassociated = true;
        } else {
            self.temp_hash.clear();
            self.unassociated = false;
        }

        Ok(())
    }
}

impl Identifiable for Attachment {
    fn id(&self) -> Option<Id> {
        self.attachment_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{post, registry, Member, PostHandler};

    fn data_row() -> AttachmentData {
        AttachmentData {
            data_id: 2345,
            user_id: 1,
            filename: "Holiday.JPG".to_string(),
            file_size: 48_213,
            file_hash: "9b74c9897bac770ffc029102a200c5de".to_string(),
            width: 1024,
            height: 768,
            thumbnail_width: 150,
            thumbnail_height: 112,
            upload_date: 1_700_000_000,
            attach_count: 1,
        }
    }

    #[test]
    fn test_pending_attachment() {
        let attachment = Attachment::pending(1, "abc", 1_700_000_000);
        assert!(attachment.is_pending());
        assert!(attachment.unassociated);
        assert!(attachment.is_new_record());
        assert_eq!(attachment.content_id, 0);
        assert_eq!(attachment.view_count, 0);
    }

    #[test]
    fn test_generate_temp_hash() {
        let hash = generate_temp_hash();
        assert_eq!(hash.len(), MAX_TEMP_HASH_LEN);
        assert_ne!(hash, generate_temp_hash());
    }

    #[test]
    fn test_derived_defaults_without_data() {
        let attachment = Attachment::pending(1, "abc", 0);
        assert_eq!(attachment.filename(), "");
        assert_eq!(attachment.extension(), "");
        assert_eq!(attachment.file_size(), 0);
        assert!(!attachment.has_thumbnail());
        assert_eq!(attachment.thumbnail_url("/data/attachments"), "");
    }

    #[test]
    fn test_derived_from_data() {
        let attachment = Attachment::for_content(2345, "post", 10, 0).with_data(data_row());
        assert_eq!(attachment.filename(), "Holiday.JPG");
        assert_eq!(attachment.extension(), "jpg");
        assert_eq!(attachment.file_size(), 48_213);
        assert!(attachment.has_thumbnail());
        assert_eq!(
            attachment.thumbnail_url("/data/attachments/"),
            "/data/attachments/2/2345-9b74c9897bac770ffc029102a200c5de.jpg"
        );
    }

    #[test]
    fn test_data_without_thumbnail() {
        let data = AttachmentData::new(3, "notes", 10);
        assert_eq!(data.extension(), "");
        assert_eq!(data.thumbnail_url("/thumbs"), "");
    }

    #[test]
    fn test_pre_save_pending() {
        let mut attachment = Attachment::pending(1, "abc", 0);
        attachment.unassociated = false;
        attachment.pre_save().unwrap();
        assert!(attachment.unassociated);
        assert_eq!(attachment.temp_hash, "abc");
    }

    #[test]
    fn test_pre_save_associated_clears_hash() {
        let mut attachment = Attachment::pending(1, "abc", 0);
        attachment.content_type = "post".to_string();
        attachment.content_id = 5;
        attachment.pre_save().unwrap();
        assert!(!attachment.unassociated);
        assert_eq!(attachment.temp_hash, "");
    }

    #[test]
    fn test_pre_save_requires_hash_or_content() {
        let mut attachment = Attachment::pending(1, "", 0);
        let err = attachment.pre_save().unwrap_err();
        assert!(matches!(err, AttachmentError::Logic(_)));
    }

    #[test]
    fn test_validate_columns() {
        let mut attachment = Attachment::pending(0, "x".repeat(33), 0);
        attachment.content_type = "a_very_long_content_type_key".to_string();

        let errors = attachment.validate().unwrap_err();
        assert!(errors.has_error("data_id"));
        assert!(errors.has_error("temp_hash"));
        assert!(errors.has_error("content_type"));

        assert!(matches!(
            attachment.pre_save(),
            Err(AttachmentError::Validation(_))
        ));
    }

    #[test]
    fn test_columns_drops_relations() {
        let mut attachment = Attachment::for_content(2345, "post", 10, 0).with_data(data_row());
        attachment.set_container(None);
        let columns = attachment.columns();
        assert!(columns.data.is_none());
        assert!(!columns.container.initialized());
        assert_eq!(columns.content_type, "post");
        assert_eq!(columns.content_id, 10);
    }

    #[tokio::test]
    async fn test_can_view_denies_pending() {
        let handler = PostHandler::new();
        handler.add_post(post(10, true));
        let registry = registry(handler);

        let mut attachment = Attachment::for_content(1, "post", 10, 0);
        attachment.temp_hash = "abc".to_string();

        let decision = attachment.can_view(&Member::new(1), &registry).await.unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn test_can_view_denies_without_content_type() {
        let registry = registry(PostHandler::new());
        let attachment = Attachment::for_content(1, "", 10, 0);
        let decision = attachment.can_view(&Member::new(1), &registry).await.unwrap();
        assert_eq!(decision, ViewDecision::deny());
    }

    #[tokio::test]
    async fn test_can_view_denies_unknown_handler() {
        let registry = registry(PostHandler::new());
        let attachment = Attachment::for_content(1, "profile_post", 10, 0);
        let decision = attachment.can_view(&Member::new(1), &registry).await.unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn test_can_view_denies_missing_container() {
        let registry = registry(PostHandler::new());
        let attachment = Attachment::for_content(1, "post", 99, 0);
        let decision = attachment.can_view(&Member::new(1), &registry).await.unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn test_can_view_delegates_to_handler() {
        let handler = PostHandler::new();
        handler.add_post(post(10, true));
        handler.add_post(post(11, false));
        let registry = registry(handler);

        let visible = Attachment::for_content(1, "post", 10, 0);
        assert!(visible
            .can_view(&Member::new(1), &registry)
            .await
            .unwrap()
            .is_allowed());

        let hidden = Attachment::for_content(1, "post", 11, 0);
        let decision = hidden.can_view(&Member::new(1), &registry).await.unwrap();
        assert_eq!(decision.reason(), Some("This post is awaiting moderation."));

        assert!(hidden
            .can_view(&Member::admin(2), &registry)
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test]
    async fn test_container_is_memoized() {
        let handler = Arc::new(PostHandler::new());
        handler.add_post(post(10, true));
        let registry = HandlerRegistry::new().with_handler(handler.clone());

        let attachment = Attachment::for_content(1, "post", 10, 0);
        assert!(attachment.container(&registry).await.unwrap().is_some());
        assert!(attachment.container(&registry).await.unwrap().is_some());
        assert_eq!(handler.lookups(), 1);
    }

    #[tokio::test]
    async fn test_set_container_skips_lookup() {
        let handler = Arc::new(PostHandler::new());
        let registry = HandlerRegistry::new().with_handler(handler.clone());

        let mut attachment = Attachment::for_content(1, "post", 10, 0);
        let preloaded: ContainerRef = Arc::new(post(10, true));
        attachment.set_container(Some(preloaded));

        let link = attachment.container_link(&registry).await.unwrap();
        assert_eq!(
            link,
            Some(ContainerLink::with_title("/posts/10", "Post #10"))
        );
        assert_eq!(handler.lookups(), 0);
    }

    #[tokio::test]
    async fn test_container_link_none_without_container() {
        let registry = registry(PostHandler::new());
        let attachment = Attachment::for_content(1, "post", 10, 0);
        assert_eq!(attachment.container_link(&registry).await.unwrap(), None);

        let unknown = Attachment::for_content(1, "thread", 10, 0);
        assert_eq!(unknown.container_link(&registry).await.unwrap(), None);
    }

    #[test]
    fn test_content_type_phrase() {
        let registry = registry(PostHandler::new());
        let attachment = Attachment::for_content(1, "post", 10, 0);
        assert_eq!(attachment.content_type_phrase(&registry), Some("Post".to_string()));

        let unknown = Attachment::for_content(1, "thread", 10, 0);
        assert_eq!(unknown.content_type_phrase(&registry), None);
    }
}
