//! Effective-permission resolution.
//!
//! For an authenticated user the first explicit grant found wins, checked
//! in order: the file itself, its namespace, then each ancestor namespace
//! nearest first. Without a grant the target's own default applies.
//! Anonymous callers only ever get the target's default.

use common::prelude::{FileId, PermissionValue, TargetType};

use crate::database::models::{File, Namespace, Permission, User};
use crate::database::Database;

use super::{AccessError, NamespaceTree};

const KNOWN_BITS: u8 = PermissionValue::READ_WRITE.bits() | PermissionValue::CREATOR.bits();

#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    File(&'a File),
    Namespace(&'a Namespace),
}

impl Target<'_> {
    fn default_permission(&self) -> PermissionValue {
        match self {
            Target::File(file) => *file.default_permission,
            Target::Namespace(namespace) => *namespace.default_permission,
        }
    }
}

/// Where a resolved value came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Anonymous,
    FileGrant(FileId),
    NamespaceGrant(String),
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub value: PermissionValue,
    pub source: Source,
    /// Permission rows consulted
    pub lookups: usize,
}

#[derive(Clone, Debug)]
pub struct PermissionResolver {
    db: Database,
    tree: NamespaceTree,
}

impl PermissionResolver {
    pub fn new(db: Database, tree: NamespaceTree) -> Self {
        Self { db, tree }
    }

    pub async fn resolve(
        &self,
        user: Option<&User>,
        target: Target<'_>,
    ) -> Result<Resolution, AccessError> {
        let Some(user) = user else {
            return Ok(Resolution {
                value: target.default_permission(),
                source: Source::Anonymous,
                lookups: 0,
            });
        };

        let mut lookups = 0;

        let namespace = match target {
            Target::File(file) => {
                lookups += 1;
                let grant =
                    Permission::lookup(&user.email, file.id.as_str(), TargetType::File, &self.db)
                        .await?;
                if let Some(value) = grant {
                    return Ok(Resolution {
                        value: *value,
                        source: Source::FileGrant((*file.id).clone()),
                        lookups,
                    });
                }
                self.tree.get(&file.namespace).await?.ok_or_else(|| {
                    AccessError::Configuration(format!(
                        "file {} belongs to missing namespace {}",
                        file.id, file.namespace
                    ))
                })?
            }
            Target::Namespace(namespace) => namespace.clone(),
        };

        let ancestors = self.tree.ancestors_of(&namespace).await?;
        for candidate in std::iter::once(&namespace).chain(ancestors.iter()) {
            lookups += 1;
            let grant = Permission::lookup(
                &user.email,
                &candidate.name,
                TargetType::Namespace,
                &self.db,
            )
            .await?;
            if let Some(value) = grant {
                return Ok(Resolution {
                    value: *value,
                    source: Source::NamespaceGrant(candidate.name.clone()),
                    lookups,
                });
            }
        }

        Ok(Resolution {
            value: target.default_permission(),
            source: Source::Default,
            lookups,
        })
    }

    async fn check_grant_target(
        &self,
        user: &str,
        target: &str,
        target_type: TargetType,
    ) -> Result<(), AccessError> {
        if User::get(user, &self.db).await?.is_none() {
            return Err(AccessError::not_found(format!("user {user}")));
        }
        let exists = match target_type {
            TargetType::File => {
                let id: FileId = target
                    .parse()
                    .map_err(|e| AccessError::Malformed(format!("file id: {e}")))?;
                File::get(&id, &self.db).await?.is_some()
            }
            TargetType::Namespace => self.tree.get(target).await?.is_some(),
        };
        if !exists {
            return Err(AccessError::not_found(format!("{target_type} {target}")));
        }
        Ok(())
    }

    fn check_value(value: PermissionValue) -> Result<(), AccessError> {
        if value.bits() & !KNOWN_BITS != 0 {
            return Err(AccessError::Malformed(format!(
                "unknown permission bits in {}",
                value.bits()
            )));
        }
        Ok(())
    }

    /// Create or replace an explicit grant.
    pub async fn grant(
        &self,
        user: &str,
        target: &str,
        target_type: TargetType,
        value: PermissionValue,
    ) -> Result<Permission, AccessError> {
        Self::check_value(value)?;
        self.check_grant_target(user, target, target_type).await?;
        let permission = Permission::upsert(user, target, target_type, value, &self.db).await?;
        tracing::info!(user, target, %target_type, %value, "permission granted");
        Ok(permission)
    }

    /// Change an existing grant.
    pub async fn update(
        &self,
        user: &str,
        target: &str,
        target_type: TargetType,
        value: PermissionValue,
    ) -> Result<Permission, AccessError> {
        Self::check_value(value)?;
        if !Permission::update(user, target, target_type, value, &self.db).await? {
            return Err(AccessError::not_found(format!(
                "grant for {user} on {target_type} {target}"
            )));
        }
        Ok(Permission {
            user: user.to_string(),
            target: target.to_string(),
            target_type,
            value: value.into(),
        })
    }

    /// Remove a grant; `false` if there was none.
    pub async fn revoke(
        &self,
        user: &str,
        target: &str,
        target_type: TargetType,
    ) -> Result<bool, AccessError> {
        let removed = Permission::delete(user, target, target_type, &self.db).await?;
        if removed {
            tracing::info!(user, target, %target_type, "permission revoked");
        }
        Ok(removed)
    }

    pub async fn permissions_of_user(&self, user: &str) -> Result<Vec<Permission>, AccessError> {
        Ok(Permission::for_user(user, &self.db).await?)
    }

    pub async fn permissions_on_target(
        &self,
        target: &str,
        target_type: TargetType,
    ) -> Result<Vec<Permission>, AccessError> {
        Ok(Permission::for_target(target, target_type, &self.db).await?)
    }
}
