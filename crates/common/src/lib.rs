/**
 * Opaque identifiers: random file ids and
 *  random credential tokens.
 */
pub mod ids;
/**
 * Capability bitmasks and the tags that say what
 *  a permission row points at.
 */
pub mod permission;
/**
 * Content sniffing. Decides the MIME type of an
 *  upload from its leading bytes, never from its name.
 */
pub mod sniff;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::ids::{generate_token, FileId, FileIdError, FILE_ID_LENGTH, TOKEN_LENGTH};
    pub use crate::permission::{
        PermissionValue, PermissionValueError, TargetType, TargetTypeError,
    };
    pub use crate::sniff::sniff;
    pub use crate::version::{build_info, BuildInfo};
}
