//! Table definitions

use sqlx::PgPool;

use crate::repository::RepositoryResult;

/// DDL for the attachment tables, applied in order
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS attachment_data (
        data_id          BIGSERIAL PRIMARY KEY,
        user_id          BIGINT NOT NULL DEFAULT 0,
        filename         VARCHAR(100) NOT NULL,
        file_size        BIGINT NOT NULL DEFAULT 0,
        file_hash        VARCHAR(32) NOT NULL DEFAULT '',
        width            INTEGER NOT NULL DEFAULT 0,
        height           INTEGER NOT NULL DEFAULT 0,
        thumbnail_width  INTEGER NOT NULL DEFAULT 0,
        thumbnail_height INTEGER NOT NULL DEFAULT 0,
        upload_date      BIGINT NOT NULL DEFAULT 0,
        attach_count     BIGINT NOT NULL DEFAULT 0 CHECK (attach_count >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attachments (
        attachment_id BIGSERIAL PRIMARY KEY,
        data_id       BIGINT NOT NULL,
        content_type  VARCHAR(25) NOT NULL DEFAULT '',
        content_id    BIGINT NOT NULL DEFAULT 0 CHECK (content_id >= 0),
        attach_date   BIGINT NOT NULL,
        temp_hash     VARCHAR(32) NOT NULL DEFAULT '',
        unassociated  BOOLEAN NOT NULL DEFAULT TRUE,
        view_count    BIGINT NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS attachments_content ON attachments (content_type, content_id, attach_date)",
    "CREATE INDEX IF NOT EXISTS attachments_temp_hash ON attachments (temp_hash, attach_date)",
    "CREATE INDEX IF NOT EXISTS attachments_unassociated ON attachments (unassociated, attach_date)",
    "CREATE INDEX IF NOT EXISTS attachments_data_id ON attachments (data_id)",
];

/// Create the attachment tables if they do not exist
pub async fn ensure_schema(pool: &PgPool) -> RepositoryResult<()> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    tracing::info!(statements = SCHEMA.len(), "Attachment schema ensured");
    Ok(())
}
