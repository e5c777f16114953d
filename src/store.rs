//! on-disk content-addressed object store
//!
//! layout:
//!
//! ```text
//! config.toml
//! objects/blobs/ab/cdef...    file content, addressed by compute_blob_hash
//! objects/trees/ab/cdef...    DirTree, CBOR + zstd, addressed by the compressed bytes
//! objects/dirmeta/ab/cdef...  DirMeta, CBOR + zstd, addressed by the compressed bytes
//! tmp/                        staging area for atomic writes
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_blob_hash, compute_object_hash, Hash};
use crate::types::{DirMeta, DirTree, Xattr};

/// where the tree writer sends finished objects
pub trait ObjectWriter {
    /// persist a directory's contents, returning its checksum
    fn write_dirtree(&self, tree: &DirTree) -> Result<Hash>;

    /// persist a directory's metadata, returning its checksum
    fn write_dirmeta(&self, meta: &DirMeta) -> Result<Hash>;
}

/// an object store rooted at a directory
pub struct Store {
    path: PathBuf,
    config: Config,
}

impl Store {
    /// initialize a new store at the given path
    pub fn init(path: &Path) -> Result<Self> {
        Self::init_with_config(path, Config::default())
    }

    /// initialize a new store with an explicit configuration
    pub fn init_with_config(path: &Path, config: Config) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::StoreExists(path.to_path_buf()));
        }

        for sub in ["objects/blobs", "objects/trees", "objects/dirmeta", "tmp"] {
            fs::create_dir_all(path.join(sub)).with_path(path)?;
        }
        config.save(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// open an existing store
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoStore(path.to_path_buf()));
        }

        let config = Config::load(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.path.join("objects/blobs")
    }

    pub fn trees_path(&self) -> PathBuf {
        self.path.join("objects/trees")
    }

    pub fn dirmeta_path(&self) -> PathBuf {
        self.path.join("objects/dirmeta")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// write file content as a blob
    ///
    /// the checksum covers ownership, mode and xattrs as well as content, so
    /// the same bytes with different permissions are different blobs.
    pub fn write_blob(
        &self,
        content: &[u8],
        uid: u32,
        gid: u32,
        mode: u32,
        xattrs: &[Xattr],
    ) -> Result<Hash> {
        let hash = compute_blob_hash(uid, gid, mode, xattrs, content);
        self.store_bytes(&self.blobs_path(), &hash, content)?;
        Ok(hash)
    }

    /// read blob content
    pub fn read_blob(&self, hash: &Hash) -> Result<Vec<u8>> {
        let path = object_path(&self.blobs_path(), hash);
        fs::read(&path).map_err(|e| not_found_or_io(e, hash, path))
    }

    pub fn blob_exists(&self, hash: &Hash) -> bool {
        object_path(&self.blobs_path(), hash).exists()
    }

    pub fn read_dirtree(&self, hash: &Hash) -> Result<DirTree> {
        self.read_object(&self.trees_path(), hash)
    }

    pub fn read_dirmeta(&self, hash: &Hash) -> Result<DirMeta> {
        self.read_object(&self.dirmeta_path(), hash)
    }

    pub fn dirtree_exists(&self, hash: &Hash) -> bool {
        object_path(&self.trees_path(), hash).exists()
    }

    /// serialize as CBOR, compress, store under the hash of the compressed bytes
    fn write_object<T: Serialize>(&self, dir: &Path, value: &T) -> Result<Hash> {
        let mut cbor_bytes = Vec::new();
        ciborium::into_writer(value, &mut cbor_bytes)?;

        let compressed = zstd::encode_all(&cbor_bytes[..], self.config.store.compression_level)
            .map_err(|e| Error::Io {
                path: PathBuf::from("<zstd>"),
                source: e,
            })?;

        let hash = compute_object_hash(&compressed);
        self.store_bytes(dir, &hash, &compressed)?;
        Ok(hash)
    }

    fn read_object<T: DeserializeOwned>(&self, dir: &Path, hash: &Hash) -> Result<T> {
        let path = object_path(dir, hash);
        let compressed = fs::read(&path).map_err(|e| not_found_or_io(e, hash, path.clone()))?;

        if compute_object_hash(&compressed) != *hash {
            return Err(Error::CorruptObject(*hash));
        }

        let cbor_bytes = zstd::decode_all(&compressed[..]).with_path(&path)?;
        Ok(ciborium::from_reader(&cbor_bytes[..])?)
    }

    /// atomic write: temp -> fsync -> rename, skipped if the object exists
    fn store_bytes(&self, dir: &Path, hash: &Hash, bytes: &[u8]) -> Result<()> {
        let (fanout, file) = hash.to_path_components();
        let object_dir = dir.join(&fanout);
        let object_path = object_dir.join(&file);

        if object_path.exists() {
            trace!(%hash, "object already stored");
            return Ok(());
        }

        fs::create_dir_all(&object_dir).with_path(&object_dir)?;

        let tmp_path = self.tmp_path().join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(bytes).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }

        fs::rename(&tmp_path, &object_path).with_path(&object_path)?;

        let dir_file = File::open(&object_dir).with_path(&object_dir)?;
        dir_file.sync_all().with_path(&object_dir)?;

        Ok(())
    }
}

impl ObjectWriter for Store {
    fn write_dirtree(&self, tree: &DirTree) -> Result<Hash> {
        self.write_object(&self.trees_path(), tree)
    }

    fn write_dirmeta(&self, meta: &DirMeta) -> Result<Hash> {
        self.write_object(&self.dirmeta_path(), meta)
    }
}

fn object_path(dir: &Path, hash: &Hash) -> PathBuf {
    let (fanout, file) = hash.to_path_components();
    dir.join(fanout).join(file)
}

fn not_found_or_io(e: std::io::Error, hash: &Hash, path: PathBuf) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::ObjectNotFound(*hash)
    } else {
        Error::Io { path, source: e }
    }
}
