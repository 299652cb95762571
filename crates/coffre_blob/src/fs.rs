//! Filesystem blob store.

use crate::error::{BlobError, BlobResult};
use crate::store::BlobStore;
use coffre_codec::{RowCodec, TenantKeys};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Blob store over a local directory tree `root/org/id/file_id`.
///
/// Every path component is the obfuscated form of its plaintext id, so
/// the tree structure leaks nothing. Obfuscated components are
/// URL-safe base64 and therefore valid file names on every platform.
#[derive(Debug)]
pub struct FsBlobStore {
    codec: RowCodec,
    root: PathBuf,
}

impl FsBlobStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>, keys: TenantKeys) -> BlobResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            codec: RowCodec::new(keys),
            root,
        })
    }

    /// The directory this store lives under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn org_dir(&self, org: &str) -> BlobResult<PathBuf> {
        Ok(self.root.join(self.codec.crypt_org(org)?))
    }

    fn id_dir(&self, org: &str, id: &str) -> BlobResult<PathBuf> {
        Ok(self.org_dir(org)?.join(self.codec.crypt_id(id)?))
    }

    fn file_path(&self, org: &str, id: &str, file_id: &str) -> BlobResult<PathBuf> {
        Ok(self.id_dir(org, id)?.join(self.codec.crypt_id(file_id)?))
    }

    /// Names of the entries directly under `dir`, decrypted. Entries
    /// that do not decrypt under this tenant's key are skipped.
    fn decrypted_entries(&self, dir: &Path) -> BlobResult<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let storage = name.to_string_lossy();
            match self.codec.decrypt_id(&storage) {
                Ok(plain) => names.push(plain),
                Err(e) => {
                    tracing::warn!(entry = %storage, error = %e, "undecryptable blob entry");
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Removes a directory tree, treating an absent one as already removed.
fn remove_tree(dir: &Path) -> BlobResult<u64> {
    let mut removed = 0u64;
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            removed += remove_tree(&path)?;
        } else {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    fs::remove_dir(dir)?;
    Ok(removed)
}

impl BlobStore for FsBlobStore {
    fn put_file(&self, org: &str, id: &str, file_id: &str, bytes: &[u8]) -> BlobResult<()> {
        let dir = self.id_dir(org, id)?;
        fs::create_dir_all(&dir)?;
        fs::write(self.file_path(org, id, file_id)?, bytes)?;
        tracing::debug!(org, id, file_id, size = bytes.len(), "blob stored");
        Ok(())
    }

    fn get_file(&self, org: &str, id: &str, file_id: &str) -> BlobResult<Vec<u8>> {
        match fs::read(self.file_path(org, id, file_id)?) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BlobError::not_found(org, id, file_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn del_files(&self, org: &str, id: &str, file_ids: &[String]) -> BlobResult<()> {
        for file_id in file_ids {
            match fs::remove_file(self.file_path(org, id, file_id)?) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn del_id(&self, org: &str, id: &str) -> BlobResult<()> {
        remove_tree(&self.id_dir(org, id)?)?;
        Ok(())
    }

    fn del_org(&self, org: &str) -> BlobResult<u64> {
        let removed = remove_tree(&self.org_dir(org)?)?;
        tracing::info!(org, removed, "blob purge");
        Ok(removed)
    }

    fn list_files(&self, org: &str, id: &str) -> BlobResult<Vec<String>> {
        self.decrypted_entries(&self.id_dir(org, id)?)
    }

    fn list_ids(&self, org: &str) -> BlobResult<Vec<String>> {
        self.decrypted_entries(&self.org_dir(org)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffre_codec::SecretKey;
    use tempfile::tempdir;

    fn keys() -> TenantKeys {
        TenantKeys::new("815", SecretKey::from_bytes(&[3u8; 32]).unwrap())
    }

    #[test]
    fn round_trip_and_persistence() {
        let dir = tempdir().unwrap();
        {
            let s = FsBlobStore::open(dir.path(), keys()).unwrap();
            s.put_file("815", "A1", "photo", b"jpeg bytes").unwrap();
        }
        let s = FsBlobStore::open(dir.path(), keys()).unwrap();
        assert_eq!(s.get_file("815", "A1", "photo").unwrap(), b"jpeg bytes");
    }

    #[test]
    fn on_disk_names_are_obfuscated() {
        let dir = tempdir().unwrap();
        let s = FsBlobStore::open(dir.path(), keys()).unwrap();
        s.put_file("815", "A1", "photo", b"x").unwrap();

        let mut walker = vec![dir.path().to_path_buf()];
        while let Some(d) = walker.pop() {
            for entry in fs::read_dir(&d).unwrap() {
                let path = entry.unwrap().path();
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                assert_ne!(name, "815");
                assert_ne!(name, "A1");
                assert_ne!(name, "photo");
                if path.is_dir() {
                    walker.push(path);
                }
            }
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let s = FsBlobStore::open(dir.path(), keys()).unwrap();
        let err = s.get_file("815", "A1", "nope").unwrap_err();
        assert!(matches!(err, BlobError::NotFound { .. }));
    }

    #[test]
    fn listings_decrypt_path_components() {
        let dir = tempdir().unwrap();
        let s = FsBlobStore::open(dir.path(), keys()).unwrap();
        s.put_file("815", "A1", "b", b"2").unwrap();
        s.put_file("815", "A1", "a", b"1").unwrap();
        s.put_file("815", "A2", "c", b"3").unwrap();

        assert_eq!(s.list_files("815", "A1").unwrap(), ["a", "b"]);
        assert_eq!(s.list_ids("815").unwrap(), ["A1", "A2"]);
        assert!(s.list_files("999", "A1").unwrap().is_empty());
    }

    #[test]
    fn deletions_are_idempotent() {
        let dir = tempdir().unwrap();
        let s = FsBlobStore::open(dir.path(), keys()).unwrap();
        s.put_file("815", "A1", "a", b"1").unwrap();

        s.del_files("815", "A1", &["a".into(), "ghost".into()]).unwrap();
        s.del_id("815", "A1").unwrap();
        s.del_id("815", "A1").unwrap();
        assert_eq!(s.del_org("815").unwrap(), 0);
    }

    #[test]
    fn del_org_counts_removed_files() {
        let dir = tempdir().unwrap();
        let s = FsBlobStore::open(dir.path(), keys()).unwrap();
        s.put_file("815", "A1", "a", b"1").unwrap();
        s.put_file("815", "A1", "b", b"2").unwrap();
        s.put_file("815", "A2", "c", b"3").unwrap();

        assert_eq!(s.del_org("815").unwrap(), 3);
        assert!(s.list_ids("815").unwrap().is_empty());
    }
}
