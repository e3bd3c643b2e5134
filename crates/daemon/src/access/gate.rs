//! Per-request access decisions.
//!
//! Each operation walks `Unauthenticated -> Authenticated -> Resolved ->
//! Authorized -> Committed`; any step may end in a rejection carrying the
//! [`AccessError`]. Every operation runs under the configured deadline.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use common::prelude::{FileId, PermissionValue, TargetType};

use crate::database::models::{AuthToken, File, Namespace, Permission, User};
use crate::database::types::DMimeList;
use crate::database::Database;

use super::file_store::validate_file_name;
use super::namespace_tree::RESERVED_ROOT;
use super::resolver::{Resolution, Target};
use super::{
    AccessError, AuthValidator, Credentials, FileContent, FileStore, NamespaceTree,
    PermissionResolver,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Unauthenticated,
    Authenticated,
    Resolved,
    Authorized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Unauthenticated => "unauthenticated",
            Stage::Authenticated => "authenticated",
            Stage::Resolved => "resolved",
            Stage::Authorized => "authorized",
        };
        f.write_str(name)
    }
}

/// Log a rejection with the stage it happened in and pass the error on.
fn rejected(op: &'static str, stage: Stage) -> impl FnOnce(AccessError) -> AccessError {
    move |err| {
        tracing::debug!(op, %stage, error = %err, "rejected");
        err
    }
}

/// How a request names a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileLocator {
    Id(FileId),
    Path { namespace: String, name: String },
}

impl FileLocator {
    /// Parse the part of a request path after `/file/`: either
    /// `direct/{id}` or `{namespace}/{name}` where the namespace may itself
    /// contain `/`.
    pub fn from_route(path: &str) -> Result<Self, AccessError> {
        let path = path.trim_start_matches('/');

        if let Some(id) = path
            .strip_prefix(RESERVED_ROOT)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            let id = id
                .parse::<FileId>()
                .map_err(|e| AccessError::Malformed(format!("file id: {e}")))?;
            return Ok(FileLocator::Id(id));
        }

        let (namespace, name) = path
            .rsplit_once('/')
            .ok_or_else(|| AccessError::Malformed("expected {namespace}/{name}".to_string()))?;
        if namespace.is_empty() {
            return Err(AccessError::Malformed("empty namespace".to_string()));
        }
        validate_file_name(name)?;

        Ok(FileLocator::Path {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileLocator::Id(id) => write!(f, "{RESERVED_ROOT}/{id}"),
            FileLocator::Path { namespace, name } => write!(f, "{namespace}/{name}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub file: File,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct NamespaceListing {
    pub namespace: Namespace,
    pub children: Vec<Namespace>,
    pub files: Vec<File>,
}

/// Settings for a new namespace.
#[derive(Debug, Clone, Default)]
pub struct NewNamespace {
    pub name: String,
    pub parent: Option<String>,
    pub default_permission: PermissionValue,
    pub mime_types: DMimeList,
}

#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    pub token_ttl: Duration,
    pub recovery_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            recovery_ttl: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccessGate {
    auth: AuthValidator,
    tree: NamespaceTree,
    resolver: PermissionResolver,
    files: FileStore,
    deadline: Duration,
}

impl AccessGate {
    pub fn new(db: Database, content: content_store::ContentStore, config: GateConfig) -> Self {
        let tree = NamespaceTree::new(db.clone());
        Self {
            auth: AuthValidator::new(db.clone(), config.token_ttl, config.recovery_ttl),
            resolver: PermissionResolver::new(db.clone(), tree.clone()),
            files: FileStore::new(db, content, tree.clone()),
            tree,
            deadline: config.request_timeout,
        }
    }

    pub fn auth(&self) -> &AuthValidator {
        &self.auth
    }

    pub fn tree(&self) -> &NamespaceTree {
        &self.tree
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    async fn within<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, AccessError>>,
    ) -> Result<T, AccessError> {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, deadline_ms = self.deadline.as_millis() as u64, "deadline exceeded");
                Err(AccessError::Timeout)
            }
        }
    }

    async fn authenticate(
        &self,
        op: &'static str,
        credentials: Option<&Credentials>,
    ) -> Result<Option<User>, AccessError> {
        let user = self
            .auth
            .authenticate(credentials)
            .await
            .map_err(rejected(op, Stage::Unauthenticated))?;
        tracing::debug!(op, user = user.as_ref().map(|u| u.email.as_str()), "authenticated");
        Ok(user)
    }

    async fn require_user(
        &self,
        op: &'static str,
        credentials: Option<&Credentials>,
    ) -> Result<User, AccessError> {
        self.authenticate(op, credentials)
            .await?
            .ok_or(AccessError::AuthFailure)
            .map_err(rejected(op, Stage::Unauthenticated))
    }

    async fn find(&self, locator: &FileLocator) -> Result<Option<File>, AccessError> {
        match locator {
            FileLocator::Id(id) => self.files.get(id).await,
            FileLocator::Path { namespace, name } => self.files.get_by_path(namespace, name).await,
        }
    }

    async fn locate(&self, op: &'static str, locator: &FileLocator) -> Result<File, AccessError> {
        self.find(locator)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("file {locator}")))
            .map_err(rejected(op, Stage::Authenticated))
    }

    async fn resolve(
        &self,
        op: &'static str,
        user: Option<&User>,
        target: Target<'_>,
    ) -> Result<Resolution, AccessError> {
        let resolution = self
            .resolver
            .resolve(user, target)
            .await
            .map_err(rejected(op, Stage::Authenticated))?;
        tracing::debug!(
            op,
            value = %resolution.value,
            source = ?resolution.source,
            lookups = resolution.lookups,
            "resolved"
        );
        Ok(resolution)
    }

    fn authorize(
        op: &'static str,
        resolution: &Resolution,
        allowed: fn(&PermissionValue) -> bool,
        what: &str,
    ) -> Result<(), AccessError> {
        if allowed(&resolution.value) {
            tracing::debug!(op, stage = %Stage::Authorized, "transition");
            Ok(())
        } else {
            Err(rejected(op, Stage::Resolved)(AccessError::Forbidden(
                what.to_string(),
            )))
        }
    }

    fn log_storage(err: &AccessError, file: &File) {
        Self::log_storage_at(err, Some(&*file.id), &file.namespace, &file.name);
    }

    /// A file that is still being created has no id yet.
    fn log_storage_at(err: &AccessError, id: Option<&FileId>, namespace: &str, name: &str) {
        if err.is_storage() {
            tracing::error!(
                id = id.map(|id| id.as_str()),
                namespace,
                name,
                error = %err,
                "storage failure"
            );
        }
    }

    /// Fetch a file's bytes. Requires Read.
    pub async fn read(
        &self,
        credentials: Option<&Credentials>,
        locator: &FileLocator,
    ) -> Result<FileContent, AccessError> {
        const OP: &str = "read";
        self.within(OP, async {
            let user = self.authenticate(OP, credentials).await?;
            let file = self.locate(OP, locator).await?;
            let resolution = self.resolve(OP, user.as_ref(), Target::File(&file)).await?;
            Self::authorize(OP, &resolution, PermissionValue::can_read, "read")?;

            self.files
                .read(&file)
                .await
                .inspect_err(|e| Self::log_storage(e, &file))
        })
        .await
    }

    /// Replace a file's bytes, or create the file when addressed by path in
    /// an existing namespace. Requires Write on the file, or on the
    /// namespace for a creation.
    pub async fn write(
        &self,
        credentials: Option<&Credentials>,
        locator: &FileLocator,
        bytes: Bytes,
    ) -> Result<WriteOutcome, AccessError> {
        const OP: &str = "write";
        self.within(OP, async {
            let user = self.authenticate(OP, credentials).await?;

            if let Some(file) = self.find(locator).await? {
                let resolution = self.resolve(OP, user.as_ref(), Target::File(&file)).await?;
                Self::authorize(OP, &resolution, PermissionValue::can_write, "write")?;

                let file = self
                    .files
                    .write(&file, bytes)
                    .await
                    .inspect_err(|e| Self::log_storage(e, &file))?;
                return Ok(WriteOutcome {
                    file,
                    created: false,
                });
            }

            let FileLocator::Path { namespace, name } = locator else {
                return Err(rejected(OP, Stage::Authenticated)(AccessError::not_found(
                    format!("file {locator}"),
                )));
            };

            let namespace = self
                .tree
                .require(namespace)
                .await
                .map_err(rejected(OP, Stage::Authenticated))?;
            let resolution = self
                .resolve(OP, user.as_ref(), Target::Namespace(&namespace))
                .await?;
            Self::authorize(OP, &resolution, PermissionValue::can_write, "create")?;

            let file = self
                .files
                .create(
                    &namespace.name,
                    name,
                    *namespace.default_permission,
                    bytes,
                    user.as_ref().map(|u| u.email.as_str()),
                )
                .await
                .inspect_err(|e| Self::log_storage_at(e, None, &namespace.name, name))?;

            Ok(WriteOutcome {
                file,
                created: true,
            })
        })
        .await
    }

    /// Delete a file. Requires Write.
    pub async fn delete(
        &self,
        credentials: Option<&Credentials>,
        locator: &FileLocator,
    ) -> Result<(), AccessError> {
        const OP: &str = "delete";
        self.within(OP, async {
            let user = self.authenticate(OP, credentials).await?;
            let file = self.locate(OP, locator).await?;
            let resolution = self.resolve(OP, user.as_ref(), Target::File(&file)).await?;
            Self::authorize(OP, &resolution, PermissionValue::can_write, "delete")?;

            self.files
                .delete(&file)
                .await
                .inspect_err(|e| Self::log_storage(e, &file))
        })
        .await
    }

    /// A namespace with its direct children and files. Requires Read.
    pub async fn list_namespace(
        &self,
        credentials: Option<&Credentials>,
        name: &str,
    ) -> Result<NamespaceListing, AccessError> {
        const OP: &str = "list_namespace";
        self.within(OP, async {
            let user = self.authenticate(OP, credentials).await?;
            let namespace = self
                .tree
                .require(name)
                .await
                .map_err(rejected(OP, Stage::Authenticated))?;
            let resolution = self
                .resolve(OP, user.as_ref(), Target::Namespace(&namespace))
                .await?;
            Self::authorize(OP, &resolution, PermissionValue::can_read, "list")?;

            Ok(NamespaceListing {
                children: self.tree.get_children(name).await?,
                files: self.files.list(name).await?,
                namespace,
            })
        })
        .await
    }

    /// Admins may create anywhere; everyone else needs Write on the parent.
    /// The caller receives Creator on the new namespace.
    pub async fn create_namespace(
        &self,
        credentials: Option<&Credentials>,
        request: NewNamespace,
    ) -> Result<Namespace, AccessError> {
        const OP: &str = "create_namespace";
        self.within(OP, async {
            let user = self.require_user(OP, credentials).await?;

            if !user.admin {
                let Some(parent) = &request.parent else {
                    return Err(rejected(OP, Stage::Authenticated)(AccessError::Forbidden(
                        "only admins create root namespaces".to_string(),
                    )));
                };
                let parent = self
                    .tree
                    .require(parent)
                    .await
                    .map_err(rejected(OP, Stage::Authenticated))?;
                let resolution = self
                    .resolve(OP, Some(&user), Target::Namespace(&parent))
                    .await?;
                Self::authorize(OP, &resolution, PermissionValue::can_write, "create namespace")?;
            }

            let namespace = self
                .tree
                .create(
                    &request.name,
                    request.parent.as_deref(),
                    request.default_permission,
                    request.mime_types,
                )
                .await?;

            self.resolver
                .grant(
                    &user.email,
                    &namespace.name,
                    TargetType::Namespace,
                    PermissionValue::CREATOR,
                )
                .await?;
            Ok(namespace)
        })
        .await
    }

    async fn require_namespace_owner(
        &self,
        op: &'static str,
        user: &User,
        name: &str,
    ) -> Result<Namespace, AccessError> {
        let namespace = self
            .tree
            .require(name)
            .await
            .map_err(rejected(op, Stage::Authenticated))?;
        if !user.admin {
            let resolution = self
                .resolve(op, Some(user), Target::Namespace(&namespace))
                .await?;
            Self::authorize(op, &resolution, PermissionValue::is_creator, "not the creator")?;
        }
        Ok(namespace)
    }

    /// Change a namespace's allow-list and/or default. Admin or Creator.
    pub async fn update_namespace(
        &self,
        credentials: Option<&Credentials>,
        name: &str,
        mime_types: Option<DMimeList>,
        default_permission: Option<PermissionValue>,
    ) -> Result<Namespace, AccessError> {
        const OP: &str = "update_namespace";
        self.within(OP, async {
            let user = self.require_user(OP, credentials).await?;
            let mut namespace = self.require_namespace_owner(OP, &user, name).await?;

            if let Some(mime_types) = mime_types {
                namespace = self.tree.set_mime_types(name, mime_types).await?;
            }
            if let Some(value) = default_permission {
                namespace = self.tree.set_default_permission(name, value).await?;
            }
            Ok(namespace)
        })
        .await
    }

    /// Delete a namespace subtree with every file in it. Admin or Creator.
    /// Returns how many files were removed.
    pub async fn delete_namespace(
        &self,
        credentials: Option<&Credentials>,
        name: &str,
    ) -> Result<usize, AccessError> {
        const OP: &str = "delete_namespace";
        self.within(OP, async {
            let user = self.require_user(OP, credentials).await?;
            self.require_namespace_owner(OP, &user, name).await?;

            let ids = self.tree.delete(name).await?;
            let purged = self.files.purge_content(&ids).await;
            if purged < ids.len() {
                tracing::warn!(
                    namespace = name,
                    orphaned = ids.len() - purged,
                    "namespace deleted with orphaned content"
                );
            }
            Ok(ids.len())
        })
        .await
    }

    /// Requires Write on the target; handing out Creator requires Creator.
    async fn authorize_grant(
        &self,
        op: &'static str,
        user: &User,
        target: &str,
        target_type: TargetType,
        value: Option<PermissionValue>,
    ) -> Result<(), AccessError> {
        let resolution = match target_type {
            TargetType::File => {
                let id: FileId = target
                    .parse()
                    .map_err(|e| AccessError::Malformed(format!("file id: {e}")))?;
                let file = self.locate(op, &FileLocator::Id(id)).await?;
                self.resolve(op, Some(user), Target::File(&file)).await?
            }
            TargetType::Namespace => {
                let namespace = self
                    .tree
                    .require(target)
                    .await
                    .map_err(rejected(op, Stage::Authenticated))?;
                self.resolve(op, Some(user), Target::Namespace(&namespace))
                    .await?
            }
        };

        Self::authorize(op, &resolution, PermissionValue::can_write, "grant")?;
        if value.is_some_and(|v| v.is_creator()) {
            Self::authorize(op, &resolution, PermissionValue::is_creator, "grant creator")?;
        }
        Ok(())
    }

    pub async fn grant(
        &self,
        credentials: Option<&Credentials>,
        grantee: &str,
        target: &str,
        target_type: TargetType,
        value: PermissionValue,
    ) -> Result<Permission, AccessError> {
        const OP: &str = "grant";
        self.within(OP, async {
            let user = self.require_user(OP, credentials).await?;
            self.authorize_grant(OP, &user, target, target_type, Some(value))
                .await?;
            self.resolver
                .grant(grantee, target, target_type, value)
                .await
        })
        .await
    }

    pub async fn revoke(
        &self,
        credentials: Option<&Credentials>,
        grantee: &str,
        target: &str,
        target_type: TargetType,
    ) -> Result<bool, AccessError> {
        const OP: &str = "revoke";
        self.within(OP, async {
            let user = self.require_user(OP, credentials).await?;
            self.authorize_grant(OP, &user, target, target_type, None)
                .await?;
            self.resolver.revoke(grantee, target, target_type).await
        })
        .await
    }

    /// The caller's own explicit grants.
    pub async fn my_permissions(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<Permission>, AccessError> {
        const OP: &str = "my_permissions";
        self.within(OP, async {
            let user = self.require_user(OP, credentials).await?;
            self.resolver.permissions_of_user(&user.email).await
        })
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken, AccessError> {
        self.within("login", self.auth.login(email, password)).await
    }

    pub async fn logout(&self, credentials: Option<&Credentials>) -> Result<bool, AccessError> {
        const OP: &str = "logout";
        self.within(OP, async {
            let credentials = credentials
                .ok_or(AccessError::AuthFailure)
                .map_err(rejected(OP, Stage::Unauthenticated))?;
            self.auth.logout(credentials).await
        })
        .await
    }

    /// Admin only.
    pub async fn issue_recovery(
        &self,
        credentials: Option<&Credentials>,
        email: &str,
    ) -> Result<AuthToken, AccessError> {
        const OP: &str = "issue_recovery";
        self.within(OP, async {
            let user = self.require_user(OP, credentials).await?;
            if !user.admin {
                return Err(rejected(OP, Stage::Authenticated)(AccessError::Forbidden(
                    "admin only".to_string(),
                )));
            }
            self.auth.issue_recovery_token(email, &user.email).await
        })
        .await
    }

    pub async fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), AccessError> {
        self.within(
            "reset_password",
            self.auth.reset_password(email, token, new_password),
        )
        .await
    }
}
