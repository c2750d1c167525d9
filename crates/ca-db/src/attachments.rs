//! Attachments repository
//!
//! Rows are always read joined with their `attachment_data` row.

use async_trait::async_trait;
use ca_attachments::{
    Attachment, AttachmentData, AttachmentDataStore, AttachmentError, AttachmentResult,
    AttachmentStore,
};
use ca_core::Id;
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::repository::RepositoryError;

const SELECT_ATTACHMENT: &str = r#"
    SELECT a.attachment_id, a.data_id, a.content_type, a.content_id, a.attach_date,
           a.temp_hash, a.unassociated, a.view_count,
           d.data_id AS d_data_id, d.user_id AS d_user_id, d.filename AS d_filename,
           d.file_size AS d_file_size, d.file_hash AS d_file_hash, d.width AS d_width,
           d.height AS d_height, d.thumbnail_width AS d_thumbnail_width,
           d.thumbnail_height AS d_thumbnail_height, d.upload_date AS d_upload_date,
           d.attach_count AS d_attach_count
    FROM attachments a
    LEFT JOIN attachment_data d ON d.data_id = a.data_id
"#;

/// Deletes one row and returns it joined like `SELECT_ATTACHMENT`
const DELETE_ATTACHMENT: &str = r#"
    WITH a AS (
        DELETE FROM attachments WHERE attachment_id = $1
        RETURNING attachment_id, data_id, content_type, content_id, attach_date,
                  temp_hash, unassociated, view_count
    )
    SELECT a.attachment_id, a.data_id, a.content_type, a.content_id, a.attach_date,
           a.temp_hash, a.unassociated, a.view_count,
           d.data_id AS d_data_id, d.user_id AS d_user_id, d.filename AS d_filename,
           d.file_size AS d_file_size, d.file_hash AS d_file_hash, d.width AS d_width,
           d.height AS d_height, d.thumbnail_width AS d_thumbnail_width,
           d.thumbnail_height AS d_thumbnail_height, d.upload_date AS d_upload_date,
           d.attach_count AS d_attach_count
    FROM a
    LEFT JOIN attachment_data d ON d.data_id = a.data_id
"#;

const SELECT_DATA: &str = r#"
    SELECT data_id, user_id, filename, file_size, file_hash, width, height,
           thumbnail_width, thumbnail_height, upload_date, attach_count
    FROM attachment_data
"#;

/// Attachment row joined with its data row
#[derive(Debug, Clone, FromRow)]
pub struct AttachmentRow {
    pub attachment_id: i64,
    pub data_id: i64,
    pub content_type: String,
    pub content_id: i64,
    pub attach_date: i64,
    pub temp_hash: String,
    pub unassociated: bool,
    pub view_count: i64,
    pub d_data_id: Option<i64>,
    pub d_user_id: Option<i64>,
    pub d_filename: Option<String>,
    pub d_file_size: Option<i64>,
    pub d_file_hash: Option<String>,
    pub d_width: Option<i32>,
    pub d_height: Option<i32>,
    pub d_thumbnail_width: Option<i32>,
    pub d_thumbnail_height: Option<i32>,
    pub d_upload_date: Option<i64>,
    pub d_attach_count: Option<i64>,
}

impl AttachmentRow {
    /// The joined data row, if the join matched
    pub fn data(&self) -> Option<AttachmentData> {
        let data_id = self.d_data_id?;
        Some(AttachmentData {
            data_id,
            user_id: self.d_user_id.unwrap_or(0),
            filename: self.d_filename.clone().unwrap_or_default(),
            file_size: self.d_file_size.unwrap_or(0),
            file_hash: self.d_file_hash.clone().unwrap_or_default(),
            width: self.d_width.unwrap_or(0),
            height: self.d_height.unwrap_or(0),
            thumbnail_width: self.d_thumbnail_width.unwrap_or(0),
            thumbnail_height: self.d_thumbnail_height.unwrap_or(0),
            upload_date: self.d_upload_date.unwrap_or(0),
            attach_count: self.d_attach_count.unwrap_or(0),
        })
    }

    pub fn into_attachment(self) -> Attachment {
        let data = self.data();
        let mut attachment = Attachment::pending(self.data_id, self.temp_hash, self.attach_date);
        attachment.attachment_id = Some(self.attachment_id);
        attachment.content_type = self.content_type;
        attachment.content_id = self.content_id;
        attachment.unassociated = self.unassociated;
        attachment.view_count = self.view_count;
        attachment.data = data;
        attachment
    }
}

#[derive(Debug, Clone, FromRow)]
struct DataRow {
    data_id: i64,
    user_id: i64,
    filename: String,
    file_size: i64,
    file_hash: String,
    width: i32,
    height: i32,
    thumbnail_width: i32,
    thumbnail_height: i32,
    upload_date: i64,
    attach_count: i64,
}

impl From<DataRow> for AttachmentData {
    fn from(row: DataRow) -> Self {
        Self {
            data_id: row.data_id,
            user_id: row.user_id,
            filename: row.filename,
            file_size: row.file_size,
            file_hash: row.file_hash,
            width: row.width,
            height: row.height,
            thumbnail_width: row.thumbnail_width,
            thumbnail_height: row.thumbnail_height,
            upload_date: row.upload_date,
            attach_count: row.attach_count,
        }
    }
}

/// Attachment repository
pub struct AttachmentRepository {
    pool: PgPool,
}

impl AttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self, sql: &str, binds: Binds<'_>) -> AttachmentResult<Vec<Attachment>> {
        let mut query = sqlx::query_as::<_, AttachmentRow>(sql);
        query = match binds {
            Binds::Text(text) => query.bind(text),
            Binds::Content(content_type, content_id) => query.bind(content_type).bind(content_id),
            Binds::Cutoff(cutoff) => query.bind(cutoff),
        };

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(AttachmentRow::into_attachment).collect())
    }
}

enum Binds<'a> {
    Text(&'a str),
    Content(&'a str, Id),
    Cutoff(i64),
}

#[async_trait]
impl AttachmentStore for AttachmentRepository {
    async fn find(&self, attachment_id: Id) -> AttachmentResult<Option<Attachment>> {
        let sql = format!("{} WHERE a.attachment_id = $1", SELECT_ATTACHMENT);
        let row = sqlx::query_as::<_, AttachmentRow>(&sql)
            .bind(attachment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(AttachmentRow::into_attachment))
    }

    async fn insert(&self, attachment: &Attachment) -> AttachmentResult<Id> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO attachments (
                data_id, content_type, content_id, attach_date,
                temp_hash, unassociated, view_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING attachment_id
            "#,
        )
        .bind(attachment.data_id)
        .bind(&attachment.content_type)
        .bind(attachment.content_id)
        .bind(attachment.attach_date)
        .bind(&attachment.temp_hash)
        .bind(attachment.unassociated)
        .bind(attachment.view_count)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(id)
    }

    async fn update(&self, attachment: &Attachment) -> AttachmentResult<()> {
        let id = attachment
            .attachment_id
            .ok_or_else(|| AttachmentError::Logic("Cannot update an unsaved attachment".into()))?;

        let result = sqlx::query(
            r#"
            UPDATE attachments
            SET data_id = $2, content_type = $3, content_id = $4, attach_date = $5,
                temp_hash = $6, unassociated = $7
            WHERE attachment_id = $1
            "#,
        )
        .bind(id)
        .bind(attachment.data_id)
        .bind(&attachment.content_type)
        .bind(attachment.content_id)
        .bind(attachment.attach_date)
        .bind(&attachment.temp_hash)
        .bind(attachment.unassociated)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(AttachmentError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, attachment_id: Id) -> AttachmentResult<Option<Attachment>> {
        let row = sqlx::query_as::<_, AttachmentRow>(DELETE_ATTACHMENT)
            .bind(attachment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(AttachmentRow::into_attachment))
    }

    async fn find_by_temp_hash(&self, temp_hash: &str) -> AttachmentResult<Vec<Attachment>> {
        if temp_hash.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{} WHERE a.temp_hash = $1 ORDER BY a.attach_date, a.attachment_id",
            SELECT_ATTACHMENT
        );
        self.fetch_all(&sql, Binds::Text(temp_hash)).await
    }

    async fn find_for_content(
        &self,
        content_type: &str,
        content_id: Id,
    ) -> AttachmentResult<Vec<Attachment>> {
        let sql = format!(
            "{} WHERE a.content_type = $1 AND a.content_id = $2 ORDER BY a.attach_date, a.attachment_id",
            SELECT_ATTACHMENT
        );
        self.fetch_all(&sql, Binds::Content(content_type, content_id))
            .await
    }

    async fn find_unassociated_before(&self, cutoff: i64) -> AttachmentResult<Vec<Attachment>> {
        let sql = format!(
            "{} WHERE a.unassociated = TRUE AND a.attach_date < $1 ORDER BY a.attach_date",
            SELECT_ATTACHMENT
        );
        self.fetch_all(&sql, Binds::Cutoff(cutoff)).await
    }

    async fn increment_view_count(&self, attachment_id: Id) -> AttachmentResult<()> {
        let result =
            sqlx::query("UPDATE attachments SET view_count = view_count + 1 WHERE attachment_id = $1")
                .bind(attachment_id)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(AttachmentError::NotFound(attachment_id));
        }
        Ok(())
    }
}

#[async_trait]
impl AttachmentDataStore for AttachmentRepository {
    async fn find_data(&self, data_id: Id) -> AttachmentResult<Option<AttachmentData>> {
        let sql = format!("{} WHERE data_id = $1", SELECT_DATA);
        let row = sqlx::query_as::<_, DataRow>(&sql)
            .bind(data_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(AttachmentData::from))
    }

    async fn increment_attach_count(&self, data_id: Id) -> AttachmentResult<Option<i64>> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE attachment_data
            SET attach_count = attach_count + 1
            WHERE data_id = $1
            RETURNING attach_count
            "#,
        )
        .bind(data_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        debug!(data_id, ?count, "attach_count incremented");
        Ok(count)
    }

    async fn decrement_attach_count(&self, data_id: Id) -> AttachmentResult<Option<i64>> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE attachment_data
            SET attach_count = attach_count - 1
            WHERE data_id = $1 AND attach_count > 0
            RETURNING attach_count
            "#,
        )
        .bind(data_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        debug!(data_id, ?count, "attach_count decremented");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AttachmentRow {
        AttachmentRow {
            attachment_id: 31,
            data_id: 4001,
            content_type: "post".to_string(),
            content_id: 12,
            attach_date: 1_700_000_000,
            temp_hash: String::new(),
            unassociated: false,
            view_count: 9,
            d_data_id: Some(4001),
            d_user_id: Some(3),
            d_filename: Some("diagram.PNG".to_string()),
            d_file_size: Some(5120),
            d_file_hash: Some("f00d".to_string()),
            d_width: Some(640),
            d_height: Some(480),
            d_thumbnail_width: Some(150),
            d_thumbnail_height: Some(112),
            d_upload_date: Some(1_699_999_000),
            d_attach_count: Some(2),
        }
    }

    #[test]
    fn test_row_into_attachment() {
        let attachment = row().into_attachment();
        assert_eq!(attachment.attachment_id, Some(31));
        assert_eq!(attachment.content_id, 12);
        assert!(!attachment.unassociated);
        assert_eq!(attachment.view_count, 9);
        assert_eq!(attachment.extension(), "png");
        assert_eq!(attachment.file_size(), 5120);
        assert_eq!(
            attachment.thumbnail_url("/thumbs"),
            "/thumbs/4/4001-f00d.jpg"
        );
    }

    #[test]
    fn test_row_without_data() {
        let mut row = row();
        row.d_data_id = None;
        let attachment = row.into_attachment();
        assert!(attachment.data.is_none());
        assert_eq!(attachment.filename(), "");
        assert!(!attachment.has_thumbnail());
    }

    #[test]
    fn test_select_joins_data() {
        assert!(SELECT_ATTACHMENT.contains("LEFT JOIN attachment_data d"));
        assert!(SELECT_DATA.contains("attach_count"));
        assert!(DELETE_ATTACHMENT.contains("RETURNING attachment_id"));
        assert!(DELETE_ATTACHMENT.contains("LEFT JOIN attachment_data d"));
    }
}
