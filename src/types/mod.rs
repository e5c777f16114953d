mod metadata;
mod tree;

pub use metadata::{DirMeta, Xattr};
pub use tree::{DirEntry, DirTree, FileEntry};
