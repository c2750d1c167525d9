//! Test fixtures: a forum post content type and a simple viewer

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ca_core::{Id, UserContext};

use crate::error::AttachmentResult;
use crate::handler::{Container, ContainerLink, ContainerRef, ContentTypeHandler, ViewDecision};
use crate::model::Attachment;
use crate::registry::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct ForumPost {
    pub post_id: Id,
    pub visible: bool,
    pub attach_count: i64,
}

pub fn post(post_id: Id, visible: bool) -> ForumPost {
    ForumPost {
        post_id,
        visible,
        attach_count: 0,
    }
}

impl Container for ForumPost {
    fn container_id(&self) -> Id {
        self.post_id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Delete notification as seen by the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub attachment_id: Option<Id>,
    pub container_id: Option<Id>,
}

#[derive(Default)]
pub struct PostHandler {
    posts: Mutex<HashMap<Id, ForumPost>>,
    lookups: AtomicUsize,
    deletes: Mutex<Vec<DeleteCall>>,
}

impl PostHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post(&self, post: ForumPost) {
        self.posts.lock().unwrap().insert(post.post_id, post);
    }

    pub fn stored_post(&self, post_id: Id) -> Option<ForumPost> {
        self.posts.lock().unwrap().get(&post_id).cloned()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> Vec<DeleteCall> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentTypeHandler for PostHandler {
    fn content_type(&self) -> &str {
        "post"
    }

    async fn container_entity(&self, content_id: Id) -> AttachmentResult<Option<ContainerRef>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let post = self.posts.lock().unwrap().get(&content_id).cloned();
        Ok(post.map(|p| Arc::new(p) as ContainerRef))
    }

    async fn can_view(
        &self,
        _attachment: &Attachment,
        container: &ContainerRef,
        viewer: &dyn UserContext,
    ) -> AttachmentResult<ViewDecision> {
        let visible = container
            .downcast_ref::<ForumPost>()
            .map(|p| p.visible)
            .unwrap_or(false);
        if visible || viewer.is_admin() {
            Ok(ViewDecision::Allowed)
        } else {
            Ok(ViewDecision::deny_with("This post is awaiting moderation."))
        }
    }

    fn container_link(&self, container: &ContainerRef) -> ContainerLink {
        let id = container.container_id();
        ContainerLink::with_title(format!("/posts/{}", id), format!("Post #{}", id))
    }

    fn content_type_phrase(&self) -> String {
        "Post".to_string()
    }

    async fn on_attachment_delete(
        &self,
        attachment: &Attachment,
        container: Option<&ContainerRef>,
    ) -> AttachmentResult<()> {
        let container_id = container.map(|c| c.container_id());
        if let Some(id) = container_id {
            if let Some(post) = self.posts.lock().unwrap().get_mut(&id) {
                post.attach_count = (post.attach_count - 1).max(0);
            }
        }
        self.deletes.lock().unwrap().push(DeleteCall {
            attachment_id: attachment.attachment_id,
            container_id,
        });
        Ok(())
    }
}

pub fn registry(handler: PostHandler) -> HandlerRegistry {
    HandlerRegistry::new().with_handler(Arc::new(handler))
}

pub struct Member {
    user_id: Id,
    admin: bool,
}

impl Member {
    pub fn new(user_id: Id) -> Self {
        Self {
            user_id,
            admin: false,
        }
    }

    pub fn admin(user_id: Id) -> Self {
        Self {
            user_id,
            admin: true,
        }
    }
}

impl UserContext for Member {
    fn user_id(&self) -> Id {
        self.user_id
    }

    fn is_admin(&self) -> bool {
        self.admin
    }

    fn allowed_globally(&self, _permission: &str) -> bool {
        self.admin
    }
}
