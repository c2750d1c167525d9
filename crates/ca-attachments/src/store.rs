//! Persistence contracts and the in-memory store

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use ca_core::Id;
use tokio::sync::RwLock;

use crate::error::{AttachmentError, AttachmentResult};
use crate::model::{Attachment, AttachmentData};

/// Attachment row storage
///
/// Every read returns attachments with their data row attached.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn find(&self, attachment_id: Id) -> AttachmentResult<Option<Attachment>>;

    /// Insert a new row and return its id
    async fn insert(&self, attachment: &Attachment) -> AttachmentResult<Id>;

    /// Write every column except the view counter
    async fn update(&self, attachment: &Attachment) -> AttachmentResult<()>;

    /// Remove the row and return it as it was stored, `None` when there was no row
    async fn delete(&self, attachment_id: Id) -> AttachmentResult<Option<Attachment>>;

    async fn find_by_temp_hash(&self, temp_hash: &str) -> AttachmentResult<Vec<Attachment>>;

    async fn find_for_content(
        &self,
        content_type: &str,
        content_id: Id,
    ) -> AttachmentResult<Vec<Attachment>>;

    /// Pending uploads attached before `cutoff` (unix seconds)
    async fn find_unassociated_before(&self, cutoff: i64) -> AttachmentResult<Vec<Attachment>>;

    async fn increment_view_count(&self, attachment_id: Id) -> AttachmentResult<()>;
}

/// Access to the shared file data rows
///
/// Counter changes must be single atomic operations in the backing store.
#[async_trait]
pub trait AttachmentDataStore: Send + Sync {
    async fn find_data(&self, data_id: Id) -> AttachmentResult<Option<AttachmentData>>;

    /// `attach_count + 1`; returns the new count, `None` when the row is missing
    async fn increment_attach_count(&self, data_id: Id) -> AttachmentResult<Option<i64>>;

    /// `attach_count - 1` unless already zero; returns the new count, `None`
    /// when the row is missing or the count was zero
    async fn decrement_attach_count(&self, data_id: Id) -> AttachmentResult<Option<i64>>;
}

/// In-memory store for tests and embedding
pub struct MemoryAttachmentStore {
    attachments: RwLock<BTreeMap<Id, Attachment>>,
    data: RwLock<HashMap<Id, AttachmentData>>,
    next_id: AtomicI64,
}

impl Default for MemoryAttachmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self {
            attachments: RwLock::new(BTreeMap::new()),
            data: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed a data row
    pub async fn put_data(&self, data: AttachmentData) {
        self.data.write().await.insert(data.data_id, data);
    }

    pub async fn attachment_count(&self) -> usize {
        self.attachments.read().await.len()
    }

    async fn with_data(&self, attachment: &Attachment) -> Attachment {
        let data = self.data.read().await.get(&attachment.data_id).cloned();
        let mut loaded = attachment.columns();
        loaded.data = data;
        loaded
    }

    async fn load_all<F>(&self, filter: F) -> Vec<Attachment>
    where
        F: Fn(&Attachment) -> bool,
    {
        let matching: Vec<Attachment> = self
            .attachments
            .read()
            .await
            .values()
            .filter(|a| filter(*a))
            .map(Attachment::columns)
            .collect();

        let mut loaded = Vec::with_capacity(matching.len());
        for attachment in &matching {
            loaded.push(self.with_data(attachment).await);
        }
        loaded
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn find(&self, attachment_id: Id) -> AttachmentResult<Option<Attachment>> {
        let row = self
            .attachments
            .read()
            .await
            .get(&attachment_id)
            .map(Attachment::columns);
        match row {
            Some(row) => Ok(Some(self.with_data(&row).await)),
            None => Ok(None),
        }
    }

    async fn insert(&self, attachment: &Attachment) -> AttachmentResult<Id> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut row = attachment.columns();
        row.attachment_id = Some(id);

        self.attachments.write().await.insert(id, row);
        Ok(id)
    }

    async fn update(&self, attachment: &Attachment) -> AttachmentResult<()> {
        let id = attachment
            .attachment_id
            .ok_or_else(|| AttachmentError::Logic("Cannot update an unsaved attachment".into()))?;

        let mut attachments = self.attachments.write().await;
        let existing = attachments
            .get_mut(&id)
            .ok_or(AttachmentError::NotFound(id))?;

        let view_count = existing.view_count;
        *existing = attachment.columns();
        existing.view_count = view_count;
        Ok(())
    }

    async fn delete(&self, attachment_id: Id) -> AttachmentResult<Option<Attachment>> {
        let removed = self.attachments.write().await.remove(&attachment_id);
        match removed {
            Some(row) => Ok(Some(self.with_data(&row).await)),
            None => Ok(None),
        }
    }

    async fn find_by_temp_hash(&self, temp_hash: &str) -> AttachmentResult<Vec<Attachment>> {
        if temp_hash.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.load_all(|a| a.temp_hash == temp_hash).await)
    }

    async fn find_for_content(
        &self,
        content_type: &str,
        content_id: Id,
    ) -> AttachmentResult<Vec<Attachment>> {
        Ok(self
            .load_all(|a| a.content_type == content_type && a.content_id == content_id)
            .await)
    }

    async fn find_unassociated_before(&self, cutoff: i64) -> AttachmentResult<Vec<Attachment>> {
        Ok(self
            .load_all(|a| a.unassociated && a.attach_date < cutoff)
            .await)
    }

    async fn increment_view_count(&self, attachment_id: Id) -> AttachmentResult<()> {
        let mut attachments = self.attachments.write().await;
        let row = attachments
            .get_mut(&attachment_id)
            .ok_or(AttachmentError::NotFound(attachment_id))?;
        row.view_count += 1;
        Ok(())
    }
}

#[async_trait]
impl AttachmentDataStore for MemoryAttachmentStore {
    async fn find_data(&self, data_id: Id) -> AttachmentResult<Option<AttachmentData>> {
        Ok(self.data.read().await.get(&data_id).cloned())
    }

    async fn increment_attach_count(&self, data_id: Id) -> AttachmentResult<Option<i64>> {
        let mut data = self.data.write().await;
        Ok(data.get_mut(&data_id).map(|row| {
            row.attach_count += 1;
            row.attach_count
        }))
    }

    async fn decrement_attach_count(&self, data_id: Id) -> AttachmentResult<Option<i64>> {
        let mut data = self.data.write().await;
        Ok(data
            .get_mut(&data_id)
            .filter(|row| row.attach_count > 0)
            .map(|row| {
                row.attach_count -= 1;
                row.attach_count
            }))
    }
}
