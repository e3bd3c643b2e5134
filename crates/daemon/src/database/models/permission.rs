use common::prelude::{PermissionValue, TargetType};
use serde::Serialize;
use sqlx::{Row, SqliteExecutor};

use crate::database::types::DPermission;
use crate::database::Database;

/// An explicit grant of `value` to `user` on a file or namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permission {
    pub user: String,
    pub target: String,
    pub target_type: TargetType,
    pub value: DPermission,
}

/// Grants live in one table per target type; table and column names never
/// come from input.
fn table_for(target_type: TargetType) -> (&'static str, &'static str) {
    match target_type {
        TargetType::File => ("file_permissions", "file"),
        TargetType::Namespace => ("namespace_permissions", "namespace"),
    }
}

impl Permission {
    /// The explicit grant for `user` on `target`, if any. This is the one
    /// lookup the resolver counts.
    pub async fn lookup(
        user: &str,
        target: &str,
        target_type: TargetType,
        db: &Database,
    ) -> Result<Option<DPermission>, sqlx::Error> {
        let (table, column) = table_for(target_type);
        let sql = format!("SELECT permission FROM {table} WHERE user = ?1 AND {column} = ?2");

        sqlx::query_scalar::<_, DPermission>(&sql)
            .bind(user)
            .bind(target)
            .fetch_optional(&**db)
            .await
    }

    /// Insert or replace a grant
    pub async fn upsert(
        user: &str,
        target: &str,
        target_type: TargetType,
        value: PermissionValue,
        db: &Database,
    ) -> Result<Permission, sqlx::Error> {
        Self::upsert_with(user, target, target_type, value, &**db).await
    }

    /// [`Permission::upsert`] on any executor, so a grant can join a
    /// larger transaction.
    pub async fn upsert_with<'e, E>(
        user: &str,
        target: &str,
        target_type: TargetType,
        value: PermissionValue,
        conn: E,
    ) -> Result<Permission, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let (table, column) = table_for(target_type);
        let sql = format!(
            r#"
            INSERT INTO {table} (user, {column}, permission)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user, {column}) DO UPDATE SET permission = excluded.permission
            "#
        );

        sqlx::query(&sql)
            .bind(user)
            .bind(target)
            .bind(DPermission::from(value))
            .execute(conn)
            .await?;

        Ok(Permission {
            user: user.to_string(),
            target: target.to_string(),
            target_type,
            value: value.into(),
        })
    }

    /// Change an existing grant; `false` if there was none
    pub async fn update(
        user: &str,
        target: &str,
        target_type: TargetType,
        value: PermissionValue,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let (table, column) = table_for(target_type);
        let sql = format!("UPDATE {table} SET permission = ?1 WHERE user = ?2 AND {column} = ?3");

        let result = sqlx::query(&sql)
            .bind(DPermission::from(value))
            .bind(user)
            .bind(target)
            .execute(&**db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(
        user: &str,
        target: &str,
        target_type: TargetType,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let (table, column) = table_for(target_type);
        let sql = format!("DELETE FROM {table} WHERE user = ?1 AND {column} = ?2");

        let result = sqlx::query(&sql)
            .bind(user)
            .bind(target)
            .execute(&**db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every grant held by `user`, namespaces first
    pub async fn for_user(user: &str, db: &Database) -> Result<Vec<Permission>, sqlx::Error> {
        let mut grants = Vec::new();
        for target_type in [TargetType::Namespace, TargetType::File] {
            let (table, column) = table_for(target_type);
            let sql = format!(
                "SELECT user, {column} AS target, permission FROM {table} WHERE user = ?1 ORDER BY target ASC"
            );
            let rows = sqlx::query(&sql).bind(user).fetch_all(&**db).await?;
            for row in rows {
                grants.push(Self::from_row(&row, target_type)?);
            }
        }
        Ok(grants)
    }

    /// Every grant on one target
    pub async fn for_target(
        target: &str,
        target_type: TargetType,
        db: &Database,
    ) -> Result<Vec<Permission>, sqlx::Error> {
        let (table, column) = table_for(target_type);
        let sql = format!(
            "SELECT user, {column} AS target, permission FROM {table} WHERE {column} = ?1 ORDER BY user ASC"
        );
        let rows = sqlx::query(&sql).bind(target).fetch_all(&**db).await?;
        rows.iter()
            .map(|row| Self::from_row(row, target_type))
            .collect()
    }

    fn from_row(
        row: &sqlx::sqlite::SqliteRow,
        target_type: TargetType,
    ) -> Result<Permission, sqlx::Error> {
        Ok(Permission {
            user: row.try_get("user")?,
            target: row.try_get("target")?,
            target_type,
            value: row.try_get("permission")?,
        })
    }
}
