//! Attachment Service
//!
//! Runs the attachment lifecycle around the store: pre-save normalization,
//! the write itself, then the side effects on the shared data row and the
//! owning content-type handler.

use std::sync::Arc;

use ca_core::config::AttachmentSettings;
use ca_core::{Clock, Id, SystemClock, UserContext};
use tracing::{debug, info, instrument, warn};

use crate::error::{AttachmentError, AttachmentResult};
use crate::handler::{ContainerLink, ViewDecision};
use crate::model::Attachment;
use crate::registry::HandlerRegistry;
use crate::store::{AttachmentDataStore, AttachmentStore};

/// Attachment service
pub struct AttachmentService<St: AttachmentStore, D: AttachmentDataStore> {
    store: Arc<St>,
    data_store: Arc<D>,
    registry: Arc<HandlerRegistry>,
    clock: Arc<dyn Clock>,
    settings: AttachmentSettings,
}

impl<St: AttachmentStore, D: AttachmentDataStore> AttachmentService<St, D> {
    pub fn new(
        store: Arc<St>,
        data_store: Arc<D>,
        registry: Arc<HandlerRegistry>,
        settings: AttachmentSettings,
    ) -> Self {
        Self {
            store,
            data_store,
            registry,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// New pending upload stamped with the current time
    pub fn new_pending(&self, data_id: Id, temp_hash: impl Into<String>) -> Attachment {
        Attachment::pending(data_id, temp_hash, self.clock.unix_now())
    }

    /// New attachment for existing content, stamped with the current time
    pub fn new_for_content(
        &self,
        data_id: Id,
        content_type: impl Into<String>,
        content_id: Id,
    ) -> Attachment {
        Attachment::for_content(data_id, content_type, content_id, self.clock.unix_now())
    }

    /// Load an attachment with its data row
    pub async fn get(&self, attachment_id: Id) -> AttachmentResult<Option<Attachment>> {
        self.store.find(attachment_id).await
    }

    pub async fn for_content(
        &self,
        content_type: &str,
        content_id: Id,
    ) -> AttachmentResult<Vec<Attachment>> {
        self.store.find_for_content(content_type, content_id).await
    }

    /// Insert or update `attachment`.
    ///
    /// A record without a content id must carry a temp hash; violating that is
    /// a [`AttachmentError::Logic`] and nothing is written.
    #[instrument(skip(self, attachment), fields(attachment_id = ?attachment.attachment_id, data_id = attachment.data_id))]
    pub async fn save(&self, attachment: &mut Attachment) -> AttachmentResult<()> {
        attachment.pre_save()?;

        match attachment.attachment_id {
            None => {
                let id = self.store.insert(attachment).await?;
                attachment.attachment_id = Some(id);
                self.post_insert(attachment).await?;
                info!(
                    attachment_id = id,
                    content_type = %attachment.content_type,
                    content_id = attachment.content_id,
                    "Attachment created"
                );
            }
            Some(id) => {
                let existing = self
                    .store
                    .find(id)
                    .await?
                    .ok_or(AttachmentError::NotFound(id))?;
                if existing.content_id != 0 && attachment.content_id == 0 {
                    return Err(AttachmentError::Unsupported(format!(
                        "attachment {} is already associated with {} {}",
                        id, existing.content_type, existing.content_id
                    )));
                }
                self.store.update(attachment).await?;
                debug!(attachment_id = id, "Attachment updated");
            }
        }

        Ok(())
    }

    async fn post_insert(&self, attachment: &mut Attachment) -> AttachmentResult<()> {
        match self
            .data_store
            .increment_attach_count(attachment.data_id)
            .await?
        {
            Some(count) => {
                if let Some(data) = attachment.data.as_mut() {
                    data.attach_count = count;
                }
            }
            None => debug!(data_id = attachment.data_id, "No data row to count against"),
        }
        Ok(())
    }

    /// Delete `attachment`, release its data row reference, and notify its handler.
    ///
    /// Side effects follow the deleted row as stored, not the fields of `attachment`.
    #[instrument(skip(self, attachment), fields(attachment_id = ?attachment.attachment_id))]
    pub async fn delete(&self, attachment: &Attachment) -> AttachmentResult<()> {
        let id = attachment
            .attachment_id
            .ok_or_else(|| AttachmentError::Logic("Cannot delete an unsaved attachment".into()))?;

        let deleted = self
            .store
            .delete(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        self.post_delete(&deleted).await?;
        info!(
            attachment_id = id,
            data_id = deleted.data_id,
            content_id = deleted.content_id,
            "Attachment deleted"
        );
        Ok(())
    }

    async fn post_delete(&self, attachment: &Attachment) -> AttachmentResult<()> {
        if self
            .data_store
            .decrement_attach_count(attachment.data_id)
            .await?
            .is_none()
        {
            debug!(
                data_id = attachment.data_id,
                "Attach count already zero or data row missing"
            );
        }

        if attachment.content_id == 0 {
            return Ok(());
        }

        if let Some(handler) = attachment.handler(&self.registry) {
            let container = handler.container_entity(attachment.content_id).await?;
            handler
                .on_attachment_delete(attachment, container.as_ref())
                .await?;
        }
        Ok(())
    }

    /// Attach every pending upload under `temp_hash` to the given content.
    ///
    /// All records are validated before any is written. A store failure part
    /// way through leaves the earlier records associated; calling again picks
    /// up the remainder, since associated records no longer match `temp_hash`.
    #[instrument(skip(self))]
    pub async fn associate_pending(
        &self,
        temp_hash: &str,
        content_type: &str,
        content_id: Id,
    ) -> AttachmentResult<Vec<Attachment>> {
        if content_id <= 0 {
            return Err(AttachmentError::Logic(
                "Pending attachments can only be associated with real content".into(),
            ));
        }

        let mut pending = self.store.find_by_temp_hash(temp_hash).await?;
        for attachment in pending.iter_mut() {
            attachment.content_type = content_type.to_string();
            attachment.content_id = content_id;
            attachment.pre_save()?;
        }

        let mut associated = Vec::with_capacity(pending.len());
        for mut attachment in pending {
            self.save(&mut attachment).await?;
            associated.push(attachment);
        }

        info!(
            count = associated.len(),
            content_type,
            content_id,
            "Pending attachments associated"
        );
        Ok(associated)
    }

    /// Count one view of `attachment`
    pub async fn log_view(&self, attachment: &Attachment) -> AttachmentResult<()> {
        let id = attachment
            .attachment_id
            .ok_or_else(|| AttachmentError::Logic("Cannot log a view of an unsaved attachment".into()))?;
        self.store.increment_view_count(id).await
    }

    /// Delete pending uploads older than `older_than_seconds`, or the
    /// configured TTL when `None`
    #[instrument(skip(self))]
    pub async fn delete_unassociated(
        &self,
        older_than_seconds: Option<i64>,
    ) -> AttachmentResult<usize> {
        let ttl = older_than_seconds.unwrap_or(self.settings.unassociated_ttl_seconds);
        let cutoff = self.clock.unix_now() - ttl;
        let stale = self.store.find_unassociated_before(cutoff).await?;

        let mut deleted = 0;
        for attachment in stale {
            match self.delete(&attachment).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(
                    attachment_id = ?attachment.attachment_id,
                    error = %e,
                    "Failed to delete unassociated attachment"
                ),
            }
        }

        info!(count = deleted, cutoff, "Unassociated attachments cleaned up");
        Ok(deleted)
    }

    pub async fn can_view(
        &self,
        attachment: &Attachment,
        viewer: &dyn UserContext,
    ) -> AttachmentResult<ViewDecision> {
        attachment.can_view(viewer, &self.registry).await
    }

    pub async fn container_link(
        &self,
        attachment: &Attachment,
    ) -> AttachmentResult<Option<ContainerLink>> {
        attachment.container_link(&self.registry).await
    }

    pub fn content_type_phrase(&self, attachment: &Attachment) -> Option<String> {
        attachment.content_type_phrase(&self.registry)
    }

    pub fn thumbnail_url(&self, attachment: &Attachment) -> String {
        attachment.thumbnail_url(&self.settings.thumbnail_base_url)
    }
}
