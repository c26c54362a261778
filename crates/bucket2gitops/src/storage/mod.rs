//! Durable output: atomic writes, backups of replaced files, free-space
//! checks.

pub mod disk;
mod file_manager;

pub use disk::available_space;
pub use file_manager::{
    FileManager, FileManagerSettings, WriteResult, DEFAULT_BACKUP_DIR, DEFAULT_MIN_FREE_BYTES,
};
