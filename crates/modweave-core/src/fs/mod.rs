//! Filesystem primitives shared across features.

pub mod link;
pub mod link_mode;

pub use link::{link_file, prune_empty_dirs, remove_path_if_exists, unlink_file};
pub use link_mode::LinkMethod;
