//! writing a [`MutableTree`] into the store, and loading it back

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::mtree::MutableTree;
use crate::store::{ObjectWriter, Store};
use crate::types::{DirEntry, DirMeta, DirTree, FileEntry};

/// options for [`write_mtree`]
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// metadata for directories staged without a metadata checksum; when
    /// unset such directories are an error
    pub default_dir_meta: Option<DirMeta>,
}

/// write `tree` and everything below it, returning the root's
/// `(contents, metadata)` checksums
///
/// subtrees that already carry a contents checksum are trusted and not
/// descended into. every node written gets its checksums cached, so writing
/// the same tree again only touches what changed in between.
pub fn write_mtree<W: ObjectWriter + ?Sized>(
    writer: &W,
    tree: &mut MutableTree,
    options: &WriteOptions,
) -> Result<(String, String)> {
    write_node(writer, tree, "/", options)
}

fn write_node<W: ObjectWriter + ?Sized>(
    writer: &W,
    tree: &mut MutableTree,
    path: &str,
    options: &WriteOptions,
) -> Result<(String, String)> {
    let metadata = match tree.metadata_checksum() {
        Some(checksum) => checksum.to_string(),
        None => {
            let meta = options
                .default_dir_meta
                .as_ref()
                .ok_or_else(|| Error::MissingMetadata(path.to_string()))?;
            let checksum = writer.write_dirmeta(meta)?.to_hex();
            tree.set_metadata_checksum(checksum.clone());
            checksum
        }
    };

    if let Some(contents) = tree.contents_checksum() {
        trace!(path, contents, "reusing cached subtree");
        return Ok((contents.to_string(), metadata));
    }

    let files = tree
        .files()
        .iter()
        .map(|(name, checksum)| {
            Hash::from_hex(checksum).map(|hash| FileEntry::new(name.as_str(), hash))
        })
        .collect::<Result<Vec<_>>>()?;

    let names: Vec<String> = tree.subdirs().keys().cloned().collect();
    let mut dirs = Vec::with_capacity(names.len());
    for name in names {
        let child_path = child_path(path, &name);
        let child = tree.ensure_dir(&name)?;
        let (contents, metadata) = write_node(writer, child, &child_path, options)?;
        dirs.push(DirEntry::new(
            name,
            Hash::from_hex(&contents)?,
            Hash::from_hex(&metadata)?,
        ));
    }

    let dirtree = DirTree::new(files, dirs)?;
    let contents = writer.write_dirtree(&dirtree)?.to_hex();
    debug!(path, contents = %contents, entries = dirtree.len(), "wrote dirtree");

    tree.set_contents_checksum(contents.clone());
    Ok((contents, metadata))
}

/// read a stored tree into a fresh [`MutableTree`]
///
/// every node comes back with its checksums cached, so writing it again
/// without changes produces no new objects.
pub fn load_mtree(store: &Store, contents: &Hash, metadata: &Hash) -> Result<MutableTree> {
    let dirtree = store.read_dirtree(contents)?;
    let mut tree = MutableTree::new();

    for file in dirtree.files() {
        tree.replace_file(&file.name, file.checksum.to_hex())?;
    }
    for dir in dirtree.dirs() {
        *tree.ensure_dir(&dir.name)? = load_mtree(store, &dir.contents, &dir.metadata)?;
    }

    // set last: the inserts above clear the contents checksum
    tree.set_metadata_checksum(metadata.to_hex());
    tree.set_contents_checksum(contents.to_hex());
    Ok(tree)
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}
