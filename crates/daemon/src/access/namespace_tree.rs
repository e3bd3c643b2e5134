//! The namespace hierarchy.
//!
//! Parent links are explicit (`namespaces.parent`) and the permission walk
//! follows them, not the spelling of names. Creation keeps the two in
//! agreement: a child is always named `{parent}/{segment}`.

use std::collections::HashSet;

use common::prelude::{FileId, PermissionValue};
use mime::Mime;

use crate::database::models::Namespace;
use crate::database::types::DMimeList;
use crate::database::Database;

use super::AccessError;

const MAX_NAMESPACE_LEN: usize = 255;

/// First path segment reserved by the `/file/direct/{id}` route.
pub const RESERVED_ROOT: &str = "direct";

/// Namespace names are `/` separated segments of `[A-Za-z0-9._-]`.
pub fn validate_namespace_name(name: &str) -> Result<(), AccessError> {
    let malformed = |why: &str| Err(AccessError::Malformed(format!("namespace {name:?}: {why}")));

    if name.is_empty() || name.len() > MAX_NAMESPACE_LEN {
        return malformed("length must be between 1 and 255");
    }
    for segment in name.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return malformed("empty or relative segment");
        }
        let valid = segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !valid {
            return malformed("invalid character");
        }
    }
    if name.split('/').next() == Some(RESERVED_ROOT) {
        return malformed("reserved name");
    }
    Ok(())
}

/// A root has a single segment; a child extends its parent by exactly one.
pub fn check_placement(name: &str, parent: Option<&str>) -> Result<(), AccessError> {
    let implied = name.rsplit_once('/').map(|(head, _)| head);
    if implied != parent {
        return Err(AccessError::Malformed(match parent {
            Some(parent) => format!("namespace {name:?} is not a direct child of {parent:?}"),
            None => format!("namespace {name:?} is not a root name"),
        }));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct NamespaceTree {
    db: Database,
}

impl NamespaceTree {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, name: &str) -> Result<Option<Namespace>, AccessError> {
        Ok(Namespace::get(name, &self.db).await?)
    }

    pub async fn require(&self, name: &str) -> Result<Namespace, AccessError> {
        self.get(name)
            .await?
            .ok_or_else(|| AccessError::not_found(format!("namespace {name}")))
    }

    /// The direct parent of `name`; `None` for a root.
    pub async fn get_parent(&self, name: &str) -> Result<Option<Namespace>, AccessError> {
        let namespace = self.require(name).await?;
        match &namespace.parent {
            None => Ok(None),
            Some(parent) => self.get(parent).await?.map(Some).ok_or_else(|| {
                AccessError::Configuration(format!(
                    "namespace {name} points at missing parent {parent}"
                ))
            }),
        }
    }

    /// Strict ancestors of `name`, nearest first, ending at the root.
    pub async fn get_ancestors(&self, name: &str) -> Result<Vec<Namespace>, AccessError> {
        let namespace = self.require(name).await?;
        self.ancestors_of(&namespace).await
    }

    /// Ancestors of an already loaded namespace. A cycle or a dangling
    /// parent link is a configuration error, never an endless walk.
    pub async fn ancestors_of(&self, namespace: &Namespace) -> Result<Vec<Namespace>, AccessError> {
        let mut seen = HashSet::from([namespace.name.clone()]);
        let mut ancestors = Vec::new();
        let mut next = namespace.parent.clone();

        while let Some(parent_name) = next {
            if !seen.insert(parent_name.clone()) {
                return Err(AccessError::Configuration(format!(
                    "namespace {} has a parent cycle through {parent_name}",
                    namespace.name
                )));
            }
            let parent = self.get(&parent_name).await?.ok_or_else(|| {
                AccessError::Configuration(format!(
                    "namespace {} has missing ancestor {parent_name}",
                    namespace.name
                ))
            })?;
            next = parent.parent.clone();
            ancestors.push(parent);
        }

        Ok(ancestors)
    }

    /// Direct children of `name`.
    pub async fn get_children(&self, name: &str) -> Result<Vec<Namespace>, AccessError> {
        self.require(name).await?;
        Ok(Namespace::children(name, &self.db).await?)
    }

    pub async fn list_roots(&self) -> Result<Vec<Namespace>, AccessError> {
        Ok(Namespace::roots(&self.db).await?)
    }

    /// Whether uploads of `mime` are accepted into `name`. Compared on the
    /// MIME essence, so `text/plain; charset=utf-8` matches `text/plain`.
    pub async fn is_mime_allowed(&self, name: &str, mime: &Mime) -> Result<bool, AccessError> {
        let namespace = self.require(name).await?;
        Ok(namespace.mime_types.allows(mime))
    }

    pub async fn create(
        &self,
        name: &str,
        parent: Option<&str>,
        default_permission: PermissionValue,
        mime_types: DMimeList,
    ) -> Result<Namespace, AccessError> {
        validate_namespace_name(name)?;
        if let Some(parent) = parent {
            self.require(parent).await?;
        }
        check_placement(name, parent)?;
        if self.get(name).await?.is_some() {
            return Err(AccessError::Conflict(format!("namespace {name} exists")));
        }

        match Namespace::create(name, parent, default_permission, &mime_types, &self.db).await {
            Ok(namespace) => {
                tracing::info!(namespace = name, parent, "namespace created");
                Ok(namespace)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AccessError::Conflict(format!("namespace {name} exists")))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_mime_types(
        &self,
        name: &str,
        mime_types: DMimeList,
    ) -> Result<Namespace, AccessError> {
        if !Namespace::set_mime_types(name, &mime_types, &self.db).await? {
            return Err(AccessError::not_found(format!("namespace {name}")));
        }
        self.require(name).await
    }

    pub async fn set_default_permission(
        &self,
        name: &str,
        value: PermissionValue,
    ) -> Result<Namespace, AccessError> {
        if !Namespace::set_default_permission(name, value, &self.db).await? {
            return Err(AccessError::not_found(format!("namespace {name}")));
        }
        self.require(name).await
    }

    /// Delete `name` with all descendants, their files and grants.
    ///
    /// Returns the ids of the removed files; their bytes are still in the
    /// content store and are the caller's to drop.
    pub async fn delete(&self, name: &str) -> Result<Vec<FileId>, AccessError> {
        let mut tx = self.db.begin().await?;

        let ids = Namespace::subtree_file_ids(name, &mut *tx).await?;
        if !Namespace::delete(name, &mut *tx).await? {
            return Err(AccessError::not_found(format!("namespace {name}")));
        }
        tx.commit().await?;

        tracing::info!(namespace = name, files = ids.len(), "namespace deleted");
        Ok(ids.into_iter().map(FileId::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tree() -> NamespaceTree {
        NamespaceTree::new(Database::in_memory().await.unwrap())
    }

    async fn add(tree: &NamespaceTree, name: &str, parent: Option<&str>) {
        tree.create(name, parent, PermissionValue::NOTHING, DMimeList::default())
            .await
            .unwrap();
    }

    fn names(namespaces: &[Namespace]) -> Vec<&str> {
        namespaces.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_namespace_names() {
        for ok in ["images", "images/cats", "a.b_c-d/e"] {
            assert!(validate_namespace_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "/a", "a/", "a//b", "a/../b", "a b", "direct", "direct/x"] {
            assert!(validate_namespace_name(bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_ancestors_nearest_first() {
        let tree = tree().await;
        add(&tree, "a", None).await;
        add(&tree, "a/b", Some("a")).await;
        add(&tree, "a/b/c", Some("a/b")).await;

        let ancestors = tree.get_ancestors("a/b/c").await.unwrap();
        assert_eq!(names(&ancestors), vec!["a/b", "a"]);
        assert!(tree.get_ancestors("a").await.unwrap().is_empty());

        let parent = tree.get_parent("a/b").await.unwrap().unwrap();
        assert_eq!(parent.name, "a");
        assert!(tree.get_parent("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_children_are_direct_only() {
        let tree = tree().await;
        add(&tree, "a", None).await;
        add(&tree, "a/b", Some("a")).await;
        add(&tree, "a/b/c", Some("a/b")).await;
        add(&tree, "a/d", Some("a")).await;

        let children = tree.get_children("a").await.unwrap();
        assert_eq!(names(&children), vec!["a/b", "a/d"]);
        assert_eq!(names(&tree.list_roots().await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_not_found() {
        let tree = tree().await;
        assert!(matches!(
            tree.get_ancestors("nope").await,
            Err(AccessError::NotFound(_))
        ));
        assert!(matches!(
            tree.create("x", Some("nope"), PermissionValue::NOTHING, DMimeList::default())
                .await,
            Err(AccessError::NotFound(_))
        ));
    }

    #[test]
    fn test_placement() {
        assert!(check_placement("a", None).is_ok());
        assert!(check_placement("a/b", Some("a")).is_ok());
        assert!(check_placement("a/b/c", Some("a/b")).is_ok());
        for (name, parent) in [
            ("a/b", None),
            ("b", Some("a")),
            ("x/b", Some("a")),
            ("a/b/c", Some("a")),
            ("ab", Some("a")),
        ] {
            assert!(
                matches!(check_placement(name, parent), Err(AccessError::Malformed(_))),
                "{name} under {parent:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_child_name_must_extend_parent() {
        let tree = tree().await;
        add(&tree, "a", None).await;
        add(&tree, "z", None).await;

        for (name, parent) in [("z/b", Some("a")), ("a/b/c", Some("a")), ("a/b", None)] {
            assert!(
                matches!(
                    tree.create(name, parent, PermissionValue::NOTHING, DMimeList::default())
                        .await,
                    Err(AccessError::Malformed(_))
                ),
                "{name} under {parent:?}"
            );
        }
        assert!(tree.get_children("a").await.unwrap().is_empty());
        assert_eq!(names(&tree.list_roots().await.unwrap()), vec!["a", "z"]);
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let tree = tree().await;
        add(&tree, "a", None).await;
        assert!(matches!(
            tree.create("a", None, PermissionValue::NOTHING, DMimeList::default())
                .await,
            Err(AccessError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_parent_cycle_is_configuration_error() {
        let tree = tree().await;
        add(&tree, "a", None).await;
        add(&tree, "a/b", Some("a")).await;
        sqlx::query("UPDATE namespaces SET parent = 'a/b' WHERE name = 'a'")
            .execute(&*tree.db)
            .await
            .unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            tree.get_ancestors("a/b"),
        )
        .await
        .expect("walk terminated");
        assert!(matches!(result, Err(AccessError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_dangling_parent_is_configuration_error() {
        let tree = tree().await;
        add(&tree, "a", None).await;
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&*tree.db)
            .await
            .unwrap();
        sqlx::query("UPDATE namespaces SET parent = 'ghost' WHERE name = 'a'")
            .execute(&*tree.db)
            .await
            .unwrap();

        assert!(matches!(
            tree.get_ancestors("a").await,
            Err(AccessError::Configuration(_))
        ));
        assert!(matches!(
            tree.get_parent("a").await,
            Err(AccessError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_mime_allow_list() {
        let tree = tree().await;
        tree.create(
            "images",
            None,
            PermissionValue::NOTHING,
            ["image/png", "image/jpeg"].into_iter().collect(),
        )
        .await
        .unwrap();
        add(&tree, "closed", None).await;

        assert!(tree.is_mime_allowed("images", &mime::IMAGE_PNG).await.unwrap());
        assert!(!tree.is_mime_allowed("images", &mime::IMAGE_GIF).await.unwrap());
        assert!(!tree.is_mime_allowed("closed", &mime::TEXT_PLAIN).await.unwrap());

        tree.set_mime_types("closed", ["text/plain"].into_iter().collect())
            .await
            .unwrap();
        let utf8: Mime = "text/plain; charset=utf-8".parse().unwrap();
        assert!(tree.is_mime_allowed("closed", &utf8).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_descendants() {
        let tree = tree().await;
        add(&tree, "a", None).await;
        add(&tree, "a/b", Some("a")).await;
        add(&tree, "a/b/c", Some("a/b")).await;
        add(&tree, "z", None).await;

        let id = FileId::generate();
        crate::database::models::File::insert(
            &id,
            "a/b/c",
            "f.txt",
            &mime::TEXT_PLAIN,
            0,
            PermissionValue::READ,
            &*tree.db,
        )
        .await
        .unwrap();

        let removed = tree.delete("a").await.unwrap();
        assert_eq!(removed, vec![id.clone()]);
        assert!(tree.get("a/b/c").await.unwrap().is_none());
        assert!(crate::database::models::File::get(&id, &tree.db)
            .await
            .unwrap()
            .is_none());
        assert!(tree.get("z").await.unwrap().is_some());

        assert!(matches!(tree.delete("a").await, Err(AccessError::NotFound(_))));
    }
}
