//! Access control core: who may do what to which file.

mod auth;
mod error;
mod file_store;
mod gate;
mod namespace_tree;
mod password;
mod resolver;

pub use auth::{AuthValidator, Credentials};
pub use error::AccessError;
pub use file_store::{validate_file_name, FileContent, FileStore};
pub use gate::{
    AccessGate, FileLocator, GateConfig, NamespaceListing, NewNamespace, Stage, WriteOutcome,
};
pub use namespace_tree::{validate_namespace_name, NamespaceTree};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use resolver::{PermissionResolver, Resolution, Source, Target};
