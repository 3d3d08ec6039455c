// System Layer
pub mod archive;
pub mod filesystem;

pub use archive::{
    archive_base_name, is_tar_content, ArchiveProgressEvent, ArchiveReader, CachedPassword,
    ItemInfo, PasswordQuery, PasswordReply, PasswordRequest, StagedEntry, StaticPassword,
};
pub use filesystem::{FileInfo, FileSystem, MoveOutcome};
