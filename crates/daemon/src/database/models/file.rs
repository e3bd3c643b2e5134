use common::prelude::{FileId, PermissionValue};
use mime::Mime;
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

use crate::database::types::{DFileId, DPermission};
use crate::database::Database;

/// Metadata of a hosted file. The bytes live in the content store under
/// `id`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct File {
    pub id: DFileId,
    pub name: String,
    pub namespace: String,
    pub mime: String,
    pub size: i64,
    pub default_permission: DPermission,
}

impl File {
    pub fn content_type(&self) -> Mime {
        self.mime
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
    }

    /// Insert a file whose content is already stored, with its final
    /// size and type.
    pub async fn insert<'e, E>(
        id: &FileId,
        namespace: &str,
        name: &str,
        mime: &Mime,
        size: i64,
        default_permission: PermissionValue,
        conn: E,
    ) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO files (id, name, namespace, mime, size, default_permission)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(id.as_str())
        .bind(name)
        .bind(namespace)
        .bind(mime.as_ref())
        .bind(size)
        .bind(DPermission::from(default_permission))
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn get(id: &FileId, db: &Database) -> Result<Option<File>, sqlx::Error> {
        sqlx::query_as::<_, File>(
            r#"
            SELECT id, name, namespace, mime, size, default_permission
            FROM files
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&**db)
        .await
    }

    pub async fn get_by_path(
        namespace: &str,
        name: &str,
        db: &Database,
    ) -> Result<Option<File>, sqlx::Error> {
        sqlx::query_as::<_, File>(
            r#"
            SELECT id, name, namespace, mime, size, default_permission
            FROM files
            WHERE namespace = ?1 AND name = ?2
            "#,
        )
        .bind(namespace)
        .bind(name)
        .fetch_optional(&**db)
        .await
    }

    pub async fn in_namespace(namespace: &str, db: &Database) -> Result<Vec<File>, sqlx::Error> {
        sqlx::query_as::<_, File>(
            r#"
            SELECT id, name, namespace, mime, size, default_permission
            FROM files
            WHERE namespace = ?1
            ORDER BY name ASC
            "#,
        )
        .bind(namespace)
        .fetch_all(&**db)
        .await
    }

    /// Record the size and type of freshly written content
    pub async fn set_content_meta(
        id: &FileId,
        size: i64,
        mime: &Mime,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET size = ?1, mime = ?2, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?3
            "#,
        )
        .bind(size)
        .bind(mime.as_ref())
        .bind(id.as_str())
        .execute(&**db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_size(id: &FileId, size: i64, db: &Database) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE files SET size = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        )
        .bind(size)
        .bind(id.as_str())
        .execute(&**db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(id: &FileId, db: &Database) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?1")
            .bind(id.as_str())
            .execute(&**db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
