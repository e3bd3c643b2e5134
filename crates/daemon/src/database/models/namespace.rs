use common::prelude::PermissionValue;
use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

use crate::database::types::{DFileId, DMimeList, DPermission};
use crate::database::Database;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Namespace {
    pub name: String,
    pub parent: Option<String>,
    pub default_permission: DPermission,
    pub mime_types: DMimeList,
}

impl Namespace {
    pub async fn create(
        name: &str,
        parent: Option<&str>,
        default_permission: PermissionValue,
        mime_types: &DMimeList,
        db: &Database,
    ) -> Result<Namespace, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO namespaces (name, parent, default_permission, mime_types)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(name)
        .bind(parent)
        .bind(DPermission::from(default_permission))
        .bind(mime_types)
        .execute(&**db)
        .await?;

        Self::get(name, db).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get(name: &str, db: &Database) -> Result<Option<Namespace>, sqlx::Error> {
        sqlx::query_as::<_, Namespace>(
            r#"
            SELECT name, parent, default_permission, mime_types
            FROM namespaces
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&**db)
        .await
    }

    /// Direct children only
    pub async fn children(name: &str, db: &Database) -> Result<Vec<Namespace>, sqlx::Error> {
        sqlx::query_as::<_, Namespace>(
            r#"
            SELECT name, parent, default_permission, mime_types
            FROM namespaces
            WHERE parent = ?1
            ORDER BY name ASC
            "#,
        )
        .bind(name)
        .fetch_all(&**db)
        .await
    }

    pub async fn roots(db: &Database) -> Result<Vec<Namespace>, sqlx::Error> {
        sqlx::query_as::<_, Namespace>(
            r#"
            SELECT name, parent, default_permission, mime_types
            FROM namespaces
            WHERE parent IS NULL
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&**db)
        .await
    }

    pub async fn set_mime_types(
        name: &str,
        mime_types: &DMimeList,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE namespaces SET mime_types = ?1 WHERE name = ?2")
            .bind(mime_types)
            .bind(name)
            .execute(&**db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_default_permission(
        name: &str,
        value: PermissionValue,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE namespaces SET default_permission = ?1 WHERE name = ?2")
            .bind(DPermission::from(value))
            .bind(name)
            .execute(&**db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Ids of every file in `name` and all of its descendants.
    ///
    /// `UNION` (not `UNION ALL`) keeps the walk finite even if the parent
    /// links contain a cycle.
    pub async fn subtree_file_ids<'e, E>(name: &str, conn: E) -> Result<Vec<DFileId>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, DFileId>(
            r#"
            WITH RECURSIVE subtree(name) AS (
                SELECT name FROM namespaces WHERE name = ?1
                UNION
                SELECT n.name FROM namespaces n JOIN subtree s ON n.parent = s.name
            )
            SELECT id FROM files WHERE namespace IN (SELECT name FROM subtree)
            "#,
        )
        .bind(name)
        .fetch_all(conn)
        .await
    }

    /// Delete a namespace. Descendant namespaces, their files and every
    /// grant on them cascade in the same statement.
    pub async fn delete<'e, E>(name: &str, conn: E) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM namespaces WHERE name = ?1")
            .bind(name)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
