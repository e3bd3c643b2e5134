mod dfile_id;
mod dmime_list;
mod dpermission;

pub use dfile_id::DFileId;
pub use dmime_list::DMimeList;
pub use dpermission::DPermission;
