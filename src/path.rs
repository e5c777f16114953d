//! path splitting and path-level operations on a [`MutableTree`]

use crate::error::{Error, Result};
use crate::mtree::{Entry, MutableTree};

/// split a `/`-separated path into validated components
///
/// leading, trailing and repeated slashes are ignored. the root path (empty
/// or only slashes) yields no components.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let components: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for component in &components {
        validate_name(component).map_err(|_| Error::InvalidPath(path.to_string()))?;
    }

    Ok(components)
}

/// validate a single entry name
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}

/// resolve `path` to the entry it names
pub fn lookup_path<'a>(root: &'a MutableTree, path: &str) -> Result<Entry<'a>> {
    let components = split_path(path)?;
    let Some(last) = components.last() else {
        return Ok(Entry::Dir(root));
    };

    root.walk(&components, 0)?.lookup(last)
}

/// set the file at `path`, which must name an existing parent directory
pub fn replace_file_at(root: &mut MutableTree, path: &str, checksum: &str) -> Result<()> {
    let components = split_path(path)?;
    let Some(last) = components.last() else {
        return Err(Error::InvalidPath(path.to_string()));
    };

    // conflicts are found before walk_mut clears anything
    root.walk(&components, 0)?.check_file_slot(last)?;
    root.walk_mut(&components, 0)?.replace_file(last, checksum)
}

/// set the file at `path`, creating missing parent directories with
/// `dir_metadata` as their metadata checksum
pub fn put_file_at(
    root: &mut MutableTree,
    path: &str,
    checksum: &str,
    dir_metadata: &str,
) -> Result<()> {
    let components = split_path(path)?;
    let Some(last) = components.last() else {
        return Err(Error::InvalidPath(path.to_string()));
    };

    // a missing parent gets created empty, so only an existing one can conflict
    if let Ok(parent) = root.walk(&components, 0) {
        parent.check_file_slot(last)?;
    }
    root.ensure_parent_dirs(&components, dir_metadata)?
        .replace_file(last, checksum)
}

/// get or create the directory at `path`; the root path returns `root`
pub fn ensure_dir_at<'a>(root: &'a mut MutableTree, path: &str) -> Result<&'a mut MutableTree> {
    let components = split_path(path)?;
    let Some(last) = components.last() else {
        return Ok(root);
    };

    root.walk(&components, 0)?.check_dir_slot(last)?;
    root.walk_mut(&components, 0)?.ensure_dir(last)
}

/// remove the entry at `path`
pub fn remove_at(root: &mut MutableTree, path: &str, allow_noent: bool) -> Result<()> {
    let components = split_path(path)?;
    let Some(last) = components.last() else {
        return Err(Error::InvalidPath(path.to_string()));
    };

    match root.walk_mut(&components, 0) {
        Ok(parent) => parent.remove(last, allow_noent),
        Err(Error::NotFound(_)) if allow_noent => Ok(()),
        Err(e) => Err(e),
    }
}
