use std::path::PathBuf;

use crate::Hash;

/// error type for mutable tree and store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("can't replace {existing} with {requested}: {name}")]
    TypeConflict {
        name: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("duplicate tree entry name: {0}")]
    DuplicateEntryName(String),

    #[error("no metadata for directory: {0}")]
    MissingMetadata(String),

    #[error("store not found at {0}")]
    NoStore(PathBuf),

    #[error("store already exists at {0}")]
    StoreExists(PathBuf),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error("corrupt object: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("xattr error on {path}: {message}")]
    Xattr { path: PathBuf, message: String },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// file/directory collision at `name`
    pub(crate) fn type_conflict(
        name: &str,
        existing: &'static str,
        requested: &'static str,
    ) -> Self {
        Error::TypeConflict {
            name: name.to_string(),
            existing,
            requested,
        }
    }
}

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_conflict_message() {
        let e = Error::type_conflict("motd", "file", "directory");
        assert_eq!(e.to_string(), "can't replace file with directory: motd");
    }

    #[test]
    fn test_not_found_message() {
        let e = Error::NotFound("etc".to_string());
        assert_eq!(e.to_string(), "no such file or directory: etc");
    }

    #[test]
    fn test_with_path() {
        let res: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        let err = res.with_path("/some/where").unwrap_err();
        match err {
            Error::Io { path, .. } => assert_eq!(path, PathBuf::from("/some/where")),
            other => panic!("expected io error, got {:?}", other),
        }
    }
}
