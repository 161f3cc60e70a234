//! Shared utilities across goldbox modules.

pub mod files;
pub mod hash;
pub mod temp;

pub use files::{copy_tree, create_private_dir, write_file_mode, write_file_with_dirs, write_new_file_mode};
pub use hash::sha256_file;
pub use temp::{remove_tree, sweep_stale, Workspace};
