//! # Devyard Filesystem Utilities (`common::fs`)
//!
//! File: cli/src/common/fs/mod.rs
//!
//! Filesystem helpers shared by the settings loader, the stack file loader and
//! the cluster providers. Import from the submodule, e.g.
//! `crate::common::fs::io::ensure_dir_exists`.
//!

/// Basic file I/O (`ensure_dir_exists`, `read_file_to_string`, `write_string_to_file`, `remove_dir_best_effort`).
pub mod io;
