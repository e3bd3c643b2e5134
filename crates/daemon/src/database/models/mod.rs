mod auth_token;
mod file;
mod namespace;
mod permission;
mod user;

pub use auth_token::AuthToken;
pub use file::File;
pub use namespace::Namespace;
pub use permission::Permission;
pub use user::User;
