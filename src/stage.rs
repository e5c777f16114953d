//! staging a directory on disk into a [`MutableTree`]

use std::fs::{self, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::libc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::SYMLINK_MODE;
use crate::mtree::MutableTree;
use crate::store::{ObjectWriter, Store};
use crate::types::{DirMeta, Xattr};

/// counts of what a staging pass added
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageStats {
    pub dirs: usize,
    pub files: usize,
    pub symlinks: usize,
    /// devices, fifos and sockets, which the store can't hold
    pub skipped: usize,
}

/// stage everything under `source` into `tree`
///
/// file contents become blobs and directory metadata becomes dirmeta objects
/// in `store`; the tree only records their checksums. staging several
/// sources into one tree overlays them: later files replace earlier ones and
/// a file meeting a directory of the same name is a `TypeConflict`.
///
/// names must be valid UTF-8, anything else is `InvalidPath`. on error the
/// tree is left partly staged (the root metadata is already replaced), so
/// callers should discard it.
pub fn stage_dir(store: &Store, tree: &mut MutableTree, source: &Path) -> Result<StageStats> {
    let root_meta = fs::symlink_metadata(source).with_path(source)?;
    if !root_meta.is_dir() {
        return Err(Error::InvalidPath(source.display().to_string()));
    }
    tree.set_metadata_checksum(write_dir_meta(store, source, &root_meta)?);

    let mut stats = StageStats::default();

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            Error::Io {
                path,
                source: e.into(),
            }
        })?;
        let path = entry.path();

        let components = path
            .strip_prefix(source)
            .unwrap_or(path)
            .components()
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidPath(path.display().to_string()))
            })
            .collect::<Result<Vec<String>>>()?;
        let Some(name) = components.last() else {
            continue;
        };

        let meta = entry.metadata().map_err(|e| Error::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let file_type = meta.file_type();

        if !(file_type.is_dir() || file_type.is_file() || file_type.is_symlink()) {
            warn!(path = %path.display(), "skipping special file");
            stats.skipped += 1;
            continue;
        }

        // conflicts are found before walk_mut clears anything
        let parent = tree.walk(&components, 0)?;
        if file_type.is_dir() {
            parent.check_dir_slot(name)?;
        } else {
            parent.check_file_slot(name)?;
        }
        let parent = tree.walk_mut(&components, 0)?;

        if file_type.is_dir() {
            let checksum = write_dir_meta(store, path, &meta)?;
            parent.ensure_dir(name)?.set_metadata_checksum(checksum);
            stats.dirs += 1;
        } else if file_type.is_file() {
            let content = fs::read(path).with_path(path)?;
            let xattrs = read_xattrs(path)?;
            let hash = store.write_blob(&content, meta.uid(), meta.gid(), meta.mode(), &xattrs)?;
            parent.replace_file(name, hash.to_hex())?;
            stats.files += 1;
        } else if file_type.is_symlink() {
            let target = fs::read_link(path).with_path(path)?;
            let target = target.to_string_lossy();
            let xattrs = read_xattrs(path)?;
            let hash = store.write_blob(
                target.as_bytes(),
                meta.uid(),
                meta.gid(),
                SYMLINK_MODE,
                &xattrs,
            )?;
            parent.replace_file(name, hash.to_hex())?;
            stats.symlinks += 1;
        }
    }

    debug!(
        source = %source.display(),
        dirs = stats.dirs,
        files = stats.files,
        symlinks = stats.symlinks,
        skipped = stats.skipped,
        "staged directory"
    );
    Ok(stats)
}

fn write_dir_meta(store: &Store, path: &Path, meta: &Metadata) -> Result<String> {
    let dirmeta = DirMeta::new(meta.uid(), meta.gid(), meta.mode()).with_xattrs(read_xattrs(path)?);
    Ok(store.write_dirmeta(&dirmeta)?.to_hex())
}

/// read all extended attributes of `path` without following symlinks
pub fn read_xattrs(path: &Path) -> Result<Vec<Xattr>> {
    let names = match xattr::list(path) {
        Ok(names) => names,
        Err(e) => {
            // no xattr support on this filesystem means no xattrs
            if matches!(
                e.raw_os_error(),
                Some(libc::ENOTSUP) | Some(libc::ENODATA) | Some(libc::EOPNOTSUPP)
            ) {
                return Ok(vec![]);
            }
            return Err(Error::Xattr {
                path: path.to_path_buf(),
                message: format!("failed to list: {}", e),
            });
        }
    };

    let mut xattrs = Vec::new();
    for name in names {
        let name = name.to_string_lossy().into_owned();
        match xattr::get(path, &name) {
            Ok(Some(value)) => xattrs.push(Xattr::new(name, value)),
            // removed between list and get
            Ok(None) => {}
            Err(e) if e.raw_os_error() == Some(libc::ENODATA) => {}
            Err(e) => {
                warn!(path = %path.display(), xattr = %name, error = %e, "failed to read xattr");
            }
        }
    }

    xattrs.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    Ok(xattrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{compute_blob_hash, compute_symlink_hash};
    use crate::mtree::Entry;
    use crate::path::lookup_path;
    use crate::write::{write_mtree, WriteOptions};
    use std::os::unix::fs::{symlink, PermissionsExt};
    use tempfile::tempdir;

    fn test_store(dir: &Path) -> Store {
        Store::init(&dir.join("store")).unwrap()
    }

    fn write_file(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn test_stage_nested() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir_all(source.join("etc/ssh")).unwrap();
        write_file(&source.join("etc/passwd"), "root:x:0:0");
        write_file(&source.join("etc/ssh/sshd_config"), "Port 22");
        write_file(&source.join("motd"), "hello");

        let mut tree = MutableTree::new();
        let stats = stage_dir(&store, &mut tree, &source).unwrap();

        assert_eq!(stats.dirs, 2);
        assert_eq!(stats.files, 3);
        assert!(tree.metadata_checksum().is_some());

        let meta = fs::symlink_metadata(source.join("etc/passwd")).unwrap();
        let expected = compute_blob_hash(meta.uid(), meta.gid(), meta.mode(), &[], b"root:x:0:0");
        let passwd = lookup_path(&tree, "/etc/passwd").unwrap();
        assert_eq!(passwd, Entry::File(expected.to_hex().as_str()));
        assert!(store.blob_exists(&expected));

        let ssh = lookup_path(&tree, "/etc/ssh").unwrap().as_dir().unwrap();
        assert!(ssh.metadata_checksum().is_some());
        assert!(ssh.files().contains_key("sshd_config"));
    }

    #[test]
    fn test_stage_symlink() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        symlink("/usr/bin/busybox", source.join("sh")).unwrap();

        let mut tree = MutableTree::new();
        let stats = stage_dir(&store, &mut tree, &source).unwrap();
        assert_eq!(stats.symlinks, 1);

        let meta = fs::symlink_metadata(source.join("sh")).unwrap();
        let expected = compute_symlink_hash(meta.uid(), meta.gid(), &[], "/usr/bin/busybox");
        assert_eq!(
            tree.lookup("sh").unwrap().as_file(),
            Some(expected.to_hex().as_str())
        );
    }

    #[test]
    fn test_stage_is_deterministic() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir_all(source.join("a/b")).unwrap();
        write_file(&source.join("a/b/file"), "deep");

        let mut t1 = MutableTree::new();
        let mut t2 = MutableTree::new();
        stage_dir(&store, &mut t1, &source).unwrap();
        stage_dir(&store, &mut t2, &source).unwrap();

        let options = WriteOptions::default();
        assert_eq!(
            write_mtree(&store, &mut t1, &options).unwrap(),
            write_mtree(&store, &mut t2, &options).unwrap()
        );
    }

    #[test]
    fn test_stage_overlay() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let base = dir.path().join("base");
        fs::create_dir_all(base.join("etc")).unwrap();
        write_file(&base.join("etc/hostname"), "base");
        write_file(&base.join("etc/fstab"), "none");

        let layer = dir.path().join("layer");
        fs::create_dir_all(layer.join("etc")).unwrap();
        write_file(&layer.join("etc/hostname"), "layer");

        let mut tree = MutableTree::new();
        stage_dir(&store, &mut tree, &base).unwrap();
        let before = lookup_path(&tree, "/etc/hostname").unwrap().as_file().unwrap().to_string();
        stage_dir(&store, &mut tree, &layer).unwrap();

        let etc = tree.lookup("etc").unwrap().as_dir().unwrap();
        assert_eq!(etc.files().len(), 2);
        assert_ne!(etc.files()["hostname"], before);
    }

    #[test]
    fn test_stage_overlay_type_conflict() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let base = dir.path().join("base");
        fs::create_dir(&base).unwrap();
        write_file(&base.join("name"), "file");

        let layer = dir.path().join("layer");
        fs::create_dir_all(layer.join("name")).unwrap();

        let mut tree = MutableTree::new();
        stage_dir(&store, &mut tree, &base).unwrap();
        let err = stage_dir(&store, &mut tree, &layer).unwrap_err();
        assert!(matches!(err, Error::TypeConflict { ref name, .. } if name == "name"));
    }

    #[test]
    fn test_stage_overlay_conflict_keeps_cached_checksums() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let base = dir.path().join("base");
        fs::create_dir_all(base.join("etc/ssh")).unwrap();

        let layer = dir.path().join("layer");
        fs::create_dir_all(layer.join("etc")).unwrap();
        write_file(&layer.join("etc/ssh"), "not a dir");

        let mut tree = MutableTree::new();
        stage_dir(&store, &mut tree, &base).unwrap();
        write_mtree(&store, &mut tree, &WriteOptions::default()).unwrap();
        let etc_contents = tree.subdirs()["etc"].contents_checksum().map(str::to_string);
        assert!(etc_contents.is_some());

        let err = stage_dir(&store, &mut tree, &layer).unwrap_err();
        assert!(matches!(err, Error::TypeConflict { ref name, .. } if name == "ssh"));
        assert_eq!(
            tree.subdirs()["etc"].contents_checksum().map(str::to_string),
            etc_contents
        );
    }

    #[test]
    fn test_stage_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let store = test_store(dir.path());

        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        write_file(&source.join(OsStr::from_bytes(b"a\xff")), "one");
        write_file(&source.join(OsStr::from_bytes(b"a\xfe")), "two");

        let mut tree = MutableTree::new();
        let err = stage_dir(&store, &mut tree, &source).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
        assert!(tree.files().is_empty());
    }

    #[test]
    fn test_stage_rejects_non_directory() {
        let dir = tempdir().unwrap();
        let store = test_store(dir.path());
        let file = dir.path().join("file");
        write_file(&file, "x");

        let mut tree = MutableTree::new();
        assert!(matches!(
            stage_dir(&store, &mut tree, &file),
            Err(Error::InvalidPath(_))
        ));
    }
}
