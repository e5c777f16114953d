use serde::{Deserialize, Serialize};

/// extended attribute (name + value)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xattr {
    pub name: String,
    pub value: Vec<u8>,
}

impl Xattr {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// directory metadata object: ownership, mode and xattrs
///
/// stored separately from the directory contents so identical permissions
/// across many directories dedup to one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirMeta {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xattrs: Vec<Xattr>,
}

impl DirMeta {
    pub fn new(uid: u32, gid: u32, mode: u32) -> Self {
        Self {
            uid,
            gid,
            mode,
            xattrs: vec![],
        }
    }

    /// attach xattrs, kept sorted by name for determinism
    pub fn with_xattrs(mut self, mut xattrs: Vec<Xattr>) -> Self {
        xattrs.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        self.xattrs = xattrs;
        self
    }
}
