use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::path::validate_name;

/// serialized contents of one directory: its files and subdirectories
///
/// each list is sorted by name (byte-wise) and a name appears at most once
/// across both lists, so equal directories serialize to equal bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirTree {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    files: Vec<FileEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dirs: Vec<DirEntry>,
}

impl DirTree {
    /// create a dirtree, validating names and sorting entries
    pub fn new(mut files: Vec<FileEntry>, mut dirs: Vec<DirEntry>) -> Result<Self> {
        for name in files.iter().map(|f| &f.name).chain(dirs.iter().map(|d| &d.name)) {
            validate_name(name)?;
        }

        files.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        dirs.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        // a name may not repeat within a list, nor appear in both
        let mut names: Vec<&str> = files
            .iter()
            .map(|f| f.name.as_str())
            .chain(dirs.iter().map(|d| d.name.as_str()))
            .collect();
        names.sort_unstable();
        for window in names.windows(2) {
            if window[0] == window[1] {
                return Err(Error::DuplicateEntryName(window[0].to_string()));
            }
        }

        Ok(Self { files, dirs })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn dirs(&self) -> &[DirEntry] {
        &self.dirs
    }

    /// look up a file by name
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.files[i])
    }

    /// look up a subdirectory by name
    pub fn dir(&self, name: &str) -> Option<&DirEntry> {
        self.dirs
            .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|i| &self.dirs[i])
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// a file in a dirtree, pointing at its blob
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub checksum: Hash,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, checksum: Hash) -> Self {
        Self {
            name: name.into(),
            checksum,
        }
    }
}

/// a subdirectory in a dirtree, pointing at its contents and metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub contents: Hash,
    pub metadata: Hash,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, contents: Hash, metadata: Hash) -> Self {
        Self {
            name: name.into(),
            contents,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash {
        Hash::from_bytes([byte; 32])
    }

    #[test]
    fn test_dirtree_empty() {
        let t = DirTree::empty();
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
    }

    #[test]
    fn test_dirtree_sorting() {
        let t = DirTree::new(
            vec![FileEntry::new("zebra", h(1)), FileEntry::new("alpha", h(2))],
            vec![DirEntry::new("usr", h(3), h(4)), DirEntry::new("etc", h(5), h(6))],
        )
        .unwrap();

        let files: Vec<_> = t.files().iter().map(|e| e.name.as_str()).collect();
        let dirs: Vec<_> = t.dirs().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(files, vec!["alpha", "zebra"]);
        assert_eq!(dirs, vec!["etc", "usr"]);
    }

    #[test]
    fn test_dirtree_lookup() {
        let t = DirTree::new(
            vec![FileEntry::new("motd", h(1))],
            vec![DirEntry::new("etc", h(2), h(3))],
        )
        .unwrap();

        assert_eq!(t.file("motd").unwrap().checksum, h(1));
        assert_eq!(t.dir("etc").unwrap().metadata, h(3));
        assert!(t.file("etc").is_none());
        assert!(t.dir("motd").is_none());
    }

    #[test]
    fn test_dirtree_rejects_bad_names() {
        for bad in ["", "a/b", ".", "..", "nul\0"] {
            assert!(DirTree::new(vec![FileEntry::new(bad, h(1))], vec![]).is_err());
            assert!(DirTree::new(vec![], vec![DirEntry::new(bad, h(1), h(2))]).is_err());
        }
    }

    #[test]
    fn test_dirtree_rejects_duplicates() {
        let same_list = DirTree::new(
            vec![FileEntry::new("same", h(1)), FileEntry::new("same", h(2))],
            vec![],
        );
        assert!(matches!(same_list, Err(Error::DuplicateEntryName(_))));

        let across = DirTree::new(
            vec![FileEntry::new("both", h(1))],
            vec![DirEntry::new("both", h(2), h(3))],
        );
        assert!(matches!(across, Err(Error::DuplicateEntryName(ref n)) if n == "both"));
    }

    #[test]
    fn test_dirtree_cbor_determinism() {
        let t1 = DirTree::new(
            vec![FileEntry::new("b", h(1)), FileEntry::new("a", h(2))],
            vec![],
        )
        .unwrap();
        let t2 = DirTree::new(
            vec![FileEntry::new("a", h(2)), FileEntry::new("b", h(1))],
            vec![],
        )
        .unwrap();

        let mut bytes1 = Vec::new();
        let mut bytes2 = Vec::new();
        ciborium::into_writer(&t1, &mut bytes1).unwrap();
        ciborium::into_writer(&t2, &mut bytes2).unwrap();
        assert_eq!(bytes1, bytes2);

        let parsed: DirTree = ciborium::from_reader(&bytes1[..]).unwrap();
        assert_eq!(parsed, t1);
    }
}
