//! in-memory mutable tree used to stage a directory hierarchy before it is
//! written to the store.
//!
//! each node is one directory level: a map of file names to file checksums,
//! a map of subdirectory names to owned child nodes, and two optional cached
//! checksums (contents and metadata) the writer fills in once it knows them.
//!
//! a node's cached contents checksum is cleared by every operation that
//! changes, or hands out mutable access to, what the node contains. the
//! metadata checksum describes the directory itself and is left alone.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// one directory level of a tree being staged
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutableTree {
    contents_checksum: Option<String>,
    metadata_checksum: Option<String>,
    files: BTreeMap<String, String>,
    subdirs: BTreeMap<String, MutableTree>,
}

/// result of resolving a name against a node's immediate children
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry<'a> {
    /// file checksum
    File(&'a str),
    /// subdirectory node
    Dir(&'a MutableTree),
}

impl<'a> Entry<'a> {
    /// file checksum, if this is a file
    pub fn as_file(&self) -> Option<&'a str> {
        match *self {
            Entry::File(checksum) => Some(checksum),
            Entry::Dir(_) => None,
        }
    }

    /// subdirectory node, if this is a directory
    pub fn as_dir(&self) -> Option<&'a MutableTree> {
        match *self {
            Entry::Dir(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }

    /// is this a directory entry
    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Dir(_))
    }

    /// get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Entry::File(_) => "file",
            Entry::Dir(_) => "directory",
        }
    }
}

impl MutableTree {
    /// create an empty node
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata_checksum(&self) -> Option<&str> {
        self.metadata_checksum.as_deref()
    }

    /// cache the checksum of this directory's metadata object
    pub fn set_metadata_checksum(&mut self, checksum: impl Into<String>) {
        self.metadata_checksum = Some(checksum.into());
    }

    pub fn clear_metadata_checksum(&mut self) {
        self.metadata_checksum = None;
    }

    pub fn contents_checksum(&self) -> Option<&str> {
        self.contents_checksum.as_deref()
    }

    /// cache the checksum of this directory's contents object
    ///
    /// only valid until the next mutation of this node, which clears it.
    pub fn set_contents_checksum(&mut self, checksum: impl Into<String>) {
        self.contents_checksum = Some(checksum.into());
    }

    pub fn clear_contents_checksum(&mut self) {
        self.contents_checksum = None;
    }

    /// file entries, name -> checksum
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    /// subdirectory entries, name -> node
    pub fn subdirs(&self) -> &BTreeMap<String, MutableTree> {
        &self.subdirs
    }

    /// number of entries (files and subdirectories)
    pub fn len(&self) -> usize {
        self.files.len() + self.subdirs.len()
    }

    /// has no entries
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.subdirs.is_empty()
    }

    /// insert or overwrite the file `name`
    ///
    /// fails with `TypeConflict` if `name` is a subdirectory; a file never
    /// replaces a directory.
    pub fn replace_file(&mut self, name: &str, checksum: impl Into<String>) -> Result<()> {
        self.check_file_slot(name)?;

        self.files.insert(name.to_string(), checksum.into());
        self.contents_checksum = None;
        Ok(())
    }

    /// get the subdirectory `name`, creating an empty one if needed
    ///
    /// fails with `TypeConflict` if `name` is a file.
    pub fn ensure_dir(&mut self, name: &str) -> Result<&mut MutableTree> {
        self.check_dir_slot(name)?;

        // caller gets mutable access below us
        self.contents_checksum = None;
        Ok(self.subdirs.entry(name.to_string()).or_default())
    }

    /// fail with `TypeConflict` if `replace_file(name, ..)` would
    pub fn check_file_slot(&self, name: &str) -> Result<()> {
        match self.lookup(name) {
            Ok(entry @ Entry::Dir(_)) => {
                Err(Error::type_conflict(name, entry.type_name(), "file"))
            }
            _ => Ok(()),
        }
    }

    /// fail with `TypeConflict` if `ensure_dir(name)` would
    pub fn check_dir_slot(&self, name: &str) -> Result<()> {
        match self.lookup(name) {
            Ok(entry @ Entry::File(_)) => {
                Err(Error::type_conflict(name, entry.type_name(), "directory"))
            }
            _ => Ok(()),
        }
    }

    /// resolve `name` against this node's immediate children
    pub fn lookup(&self, name: &str) -> Result<Entry<'_>> {
        if let Some(subdir) = self.subdirs.get(name) {
            return Ok(Entry::Dir(subdir));
        }

        self.files
            .get(name)
            .map(|checksum| Entry::File(checksum.as_str()))
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// remove the file or subdirectory `name`
    ///
    /// a missing name is an error unless `allow_noent` is set.
    pub fn remove(&mut self, name: &str, allow_noent: bool) -> Result<()> {
        let removed = self.files.remove(name).is_some() || self.subdirs.remove(name).is_some();

        if removed {
            self.contents_checksum = None;
        } else if !allow_noent {
            return Err(Error::NotFound(name.to_string()));
        }

        Ok(())
    }

    /// find the node that is the direct parent of the last component
    ///
    /// components from `start` up to (not including) the last one must all be
    /// subdirectories. the last component itself is not resolved, so a single
    /// component path returns `self`.
    pub fn walk<S: AsRef<str>>(&self, components: &[S], start: usize) -> Result<&MutableTree> {
        if start >= components.len() {
            return Err(Error::NotFound(past_end(components)));
        }

        if start == components.len() - 1 {
            return Ok(self);
        }

        let name = components[start].as_ref();
        match self.subdirs.get(name) {
            Some(subdir) => subdir.walk(components, start + 1),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    /// mutable variant of [`walk`](Self::walk)
    ///
    /// clears the contents checksum of every node descended through. a failed
    /// walk leaves the tree untouched.
    pub fn walk_mut<S: AsRef<str>>(
        &mut self,
        components: &[S],
        start: usize,
    ) -> Result<&mut MutableTree> {
        self.walk(components, start)?;

        let mut current = self;
        for name in &components[start..components.len() - 1] {
            let name = name.as_ref();
            current.contents_checksum = None;
            current = current
                .subdirs
                .get_mut(name)
                .ok_or_else(|| Error::NotFound(name.to_string()))?;
        }

        Ok(current)
    }

    /// like [`walk_mut`](Self::walk_mut) from the root, but creates missing
    /// intermediate directories
    ///
    /// newly created directories get `metadata_checksum`. nothing is created
    /// if an intermediate component turns out to be a file.
    pub fn ensure_parent_dirs<S: AsRef<str>>(
        &mut self,
        components: &[S],
        metadata_checksum: &str,
    ) -> Result<&mut MutableTree> {
        let Some((_, parents)) = components.split_last() else {
            return Err(Error::NotFound(String::new()));
        };

        // check the existing prefix first so a conflict mutates nothing
        let mut probe: &MutableTree = self;
        for name in parents {
            let name = name.as_ref();
            probe.check_dir_slot(name)?;
            match probe.subdirs.get(name) {
                Some(subdir) => probe = subdir,
                None => break,
            }
        }

        let mut current = self;
        for name in parents {
            current.contents_checksum = None;
            current = current
                .subdirs
                .entry(name.as_ref().to_string())
                .or_insert_with(|| {
                    let mut dir = MutableTree::new();
                    dir.set_metadata_checksum(metadata_checksum);
                    dir
                });
        }

        Ok(current)
    }
}

/// name to report when a walk runs off the end of its components
fn past_end<S: AsRef<str>>(components: &[S]) -> String {
    components
        .last()
        .map(|c| c.as_ref().to_string())
        .unwrap_or_default()
}
