pub mod daemon;
pub mod file;
pub mod health;
pub mod init;
pub mod login;
pub mod namespace;
pub mod permission;
pub mod user;
pub mod version;

pub use daemon::Daemon;
pub use file::File;
pub use health::Health;
pub use init::Init;
pub use login::{Login, Logout, Reset};
pub use namespace::Namespace;
pub use permission::Permission;
pub use user::User;
pub use version::Version;
