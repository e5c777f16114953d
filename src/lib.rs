//! mtree - staging trees for a content-addressed store
//!
//! a [`MutableTree`] is an in-memory directory hierarchy that is built up
//! incrementally (add files, create or descend into subdirectories) and then
//! written to a content-addressed [`Store`] in one pass. each node can cache
//! the checksums of its already-written contents and metadata so unchanged
//! subtrees are never serialized twice.
//!
//! # Core concepts
//!
//! - **Blob**: file content, addressed by a hash over ownership, mode, xattrs and content
//! - **DirTree**: a directory's files and subdirectories by checksum (CBOR + zstd)
//! - **DirMeta**: a directory's ownership, mode and xattrs (CBOR + zstd)
//! - **MutableTree**: the staging structure; knows checksums only as opaque strings
//!
//! # Example usage
//!
//! ```no_run
//! use mtree::{write_mtree, MutableTree, Store, WriteOptions};
//! use std::path::Path;
//!
//! let store = Store::init(Path::new("/path/to/store")).unwrap();
//!
//! let mut tree = MutableTree::new();
//! mtree::stage_dir(&store, &mut tree, Path::new("/source")).unwrap();
//!
//! let (contents, metadata) = write_mtree(&store, &mut tree, &WriteOptions::default()).unwrap();
//! println!("{} {}", contents, metadata);
//! ```

mod config;
mod error;
mod hash;
mod store;

pub mod mtree;
pub mod path;
pub mod stage;
pub mod types;
pub mod write;

pub use config::{Config, StoreConfig, DEFAULT_COMPRESSION_LEVEL};
pub use error::{Error, Result};
pub use hash::{compute_blob_hash, compute_object_hash, compute_symlink_hash, Hash, SYMLINK_MODE};
pub use mtree::{Entry, MutableTree};
pub use stage::{stage_dir, StageStats};
pub use store::{ObjectWriter, Store};
pub use types::{DirEntry, DirMeta, DirTree, FileEntry, Xattr};
pub use write::{load_mtree, write_mtree, WriteOptions};
