use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::types::Xattr;
use crate::Error;

/// SHA-256 digest addressing an object in the store
///
/// the mutable tree only ever sees these as hex strings; parsing back into a
/// `Hash` happens when the store is asked for an object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// parse a 64 char hex checksum
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s, &mut arr).map_err(|_| Error::InvalidHashHex(s.to_string()))?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// fan-out directory and file name inside an object directory
    pub fn to_path_components(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..].to_string())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..12])
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// mode used for every symlink blob
pub const SYMLINK_MODE: u32 = 0o120777;

/// hash a file blob together with its ownership, mode and xattrs
///
/// layout, all integers u32 LE:
///   uid | gid | mode | xattr_count | (name_len name value_len value)* | content
/// xattrs are hashed in name order regardless of input order.
pub fn compute_blob_hash(uid: u32, gid: u32, mode: u32, xattrs: &[Xattr], content: &[u8]) -> Hash {
    let mut hasher = Sha256::new();

    hasher.update(uid.to_le_bytes());
    hasher.update(gid.to_le_bytes());
    hasher.update(mode.to_le_bytes());
    update_xattrs(&mut hasher, xattrs);
    hasher.update(content);

    Hash(hasher.finalize().into())
}

/// hash a symlink blob; the target is the content
pub fn compute_symlink_hash(uid: u32, gid: u32, xattrs: &[Xattr], target: &str) -> Hash {
    compute_blob_hash(uid, gid, SYMLINK_MODE, xattrs, target.as_bytes())
}

/// hash stored object bytes (compressed dirtree and dirmeta)
pub fn compute_object_hash(bytes: &[u8]) -> Hash {
    Hash(Sha256::digest(bytes).into())
}

fn update_xattrs(hasher: &mut Sha256, xattrs: &[Xattr]) {
    let mut sorted: Vec<&Xattr> = xattrs.iter().collect();
    sorted.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

    hasher.update((sorted.len() as u32).to_le_bytes());
    for xattr in sorted {
        hasher.update((xattr.name.len() as u32).to_le_bytes());
        hasher.update(xattr.name.as_bytes());
        hasher.update((xattr.value.len() as u32).to_le_bytes());
        hasher.update(&xattr.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789";

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = Hash::from_hex(SAMPLE).unwrap();
        assert_eq!(h.to_hex(), SAMPLE);
        assert_eq!(h.to_string(), SAMPLE);
    }

    #[test]
    fn test_hash_invalid_hex() {
        assert!(Hash::from_hex("not valid hex").is_err());
        assert!(Hash::from_hex("abcd").is_err());
        assert!(Hash::from_hex(&format!("{}ff", SAMPLE)).is_err());
    }

    #[test]
    fn test_hash_path_components() {
        let (dir, file) = Hash::from_hex(SAMPLE).unwrap().to_path_components();
        assert_eq!(dir, "ab");
        assert_eq!(file, &SAMPLE[2..]);
    }

    #[test]
    fn test_blob_hash_covers_metadata() {
        let base = compute_blob_hash(0, 0, 0o100644, &[], b"hello");
        assert_eq!(base, compute_blob_hash(0, 0, 0o100644, &[], b"hello"));
        assert_ne!(base, compute_blob_hash(1, 0, 0o100644, &[], b"hello"));
        assert_ne!(base, compute_blob_hash(0, 1, 0o100644, &[], b"hello"));
        assert_ne!(base, compute_blob_hash(0, 0, 0o100755, &[], b"hello"));
        assert_ne!(base, compute_blob_hash(0, 0, 0o100644, &[], b"world"));
    }

    #[test]
    fn test_blob_hash_xattr_order_independent() {
        let x1 = vec![Xattr::new("user.a", vec![1]), Xattr::new("user.b", vec![2])];
        let x2 = vec![Xattr::new("user.b", vec![2]), Xattr::new("user.a", vec![1])];

        assert_eq!(
            compute_blob_hash(0, 0, 0o100644, &x1, b"hello"),
            compute_blob_hash(0, 0, 0o100644, &x2, b"hello")
        );
        assert_ne!(
            compute_blob_hash(0, 0, 0o100644, &x1, b"hello"),
            compute_blob_hash(0, 0, 0o100644, &[], b"hello")
        );
    }

    #[test]
    fn test_symlink_hash_uses_symlink_mode() {
        assert_eq!(
            compute_symlink_hash(0, 0, &[], "/target"),
            compute_blob_hash(0, 0, SYMLINK_MODE, &[], b"/target")
        );
        assert_ne!(
            compute_symlink_hash(0, 0, &[], "/target"),
            compute_symlink_hash(0, 0, &[], "/other")
        );
    }

    #[test]
    fn test_hash_serde_json() {
        let h = Hash::from_hex(SAMPLE).unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", SAMPLE));
        let parsed: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, parsed);
    }
}
