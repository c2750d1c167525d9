//! Content-type handlers
//!
//! Every kind of content that can own attachments (forum posts, profile
//! messages, ...) registers one [`ContentTypeHandler`]. The handler knows how
//! to find the container for a content id, who may view its attachments, and
//! how to clean up when an attachment goes away.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ca_core::{Id, UserContext};
use serde::{Deserialize, Serialize};

use crate::error::AttachmentResult;
use crate::model::Attachment;

/// The domain object an attachment hangs off
pub trait Container: Any + Send + Sync + fmt::Debug {
    fn container_id(&self) -> Id;

    fn title(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Container {
    /// Downcast to the handler's concrete container type
    pub fn downcast_ref<T: Container>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

pub type ContainerRef = Arc<dyn Container>;

/// Navigable reference to a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLink {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ContainerLink {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title: None,
        }
    }

    pub fn with_title(href: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title: Some(title.into()),
        }
    }
}

/// Outcome of a view permission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewDecision {
    Allowed,
    /// Denied, optionally with a message fit for the viewer
    Denied(Option<String>),
}

impl ViewDecision {
    pub fn deny() -> Self {
        Self::Denied(None)
    }

    pub fn deny_with(reason: impl Into<String>) -> Self {
        Self::Denied(Some(reason.into()))
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Denied(reason) => reason.as_deref(),
            Self::Allowed => None,
        }
    }
}

impl From<bool> for ViewDecision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::deny()
        }
    }
}

/// Content-type specific behaviour for attachments
#[async_trait]
pub trait ContentTypeHandler: Send + Sync {
    /// Registry key, e.g. `"post"`
    fn content_type(&self) -> &str;

    /// Load the container for `content_id`; `None` if it no longer exists
    async fn container_entity(&self, content_id: Id) -> AttachmentResult<Option<ContainerRef>>;

    async fn can_view(
        &self,
        attachment: &Attachment,
        container: &ContainerRef,
        viewer: &dyn UserContext,
    ) -> AttachmentResult<ViewDecision>;

    fn container_link(&self, container: &ContainerRef) -> ContainerLink;

    /// Human-readable label for this content type
    fn content_type_phrase(&self) -> String;

    /// Called after an attachment row is deleted. `container` is `None` when
    /// the container is already gone.
    async fn on_attachment_delete(
        &self,
        attachment: &Attachment,
        container: Option<&ContainerRef>,
    ) -> AttachmentResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Page(Id);

    impl Container for Page {
        fn container_id(&self) -> Id {
            self.0
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_downcast_container() {
        let container: ContainerRef = Arc::new(Page(4));
        assert_eq!(container.container_id(), 4);
        assert!(container.title().is_none());
        assert_eq!(container.downcast_ref::<Page>().map(|p| p.0), Some(4));
    }

    #[test]
    fn test_view_decision() {
        assert!(ViewDecision::from(true).is_allowed());
        assert_eq!(ViewDecision::from(false), ViewDecision::Denied(None));
        assert_eq!(
            ViewDecision::deny_with("private forum").reason(),
            Some("private forum")
        );
        assert_eq!(ViewDecision::Allowed.reason(), None);
    }
}
