//! In-memory blob store.

use crate::error::{BlobError, BlobResult};
use crate::store::BlobStore;
use coffre_codec::{RowCodec, TenantKeys};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Obfuscated physical key of one attachment.
type BlobKey = (String, String, String);

/// Blob store over an in-process ordered map.
///
/// Keys are obfuscated exactly like the filesystem store's, so tests
/// exercise the same key mapping the persistent store uses.
#[derive(Debug)]
pub struct MemoryBlobStore {
    codec: RowCodec,
    blobs: RwLock<BTreeMap<BlobKey, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store for one tenant.
    #[must_use]
    pub fn new(keys: TenantKeys) -> Self {
        Self {
            codec: RowCodec::new(keys),
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    fn key(&self, org: &str, id: &str, file_id: &str) -> BlobResult<BlobKey> {
        Ok((
            self.codec.crypt_org(org)?,
            self.codec.crypt_id(id)?,
            self.codec.crypt_id(file_id)?,
        ))
    }
}

impl BlobStore for MemoryBlobStore {
    fn put_file(&self, org: &str, id: &str, file_id: &str, bytes: &[u8]) -> BlobResult<()> {
        let key = self.key(org, id, file_id)?;
        self.blobs.write().insert(key, bytes.to_vec());
        Ok(())
    }

    fn get_file(&self, org: &str, id: &str, file_id: &str) -> BlobResult<Vec<u8>> {
        let key = self.key(org, id, file_id)?;
        self.blobs
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(org, id, file_id))
    }

    fn del_files(&self, org: &str, id: &str, file_ids: &[String]) -> BlobResult<()> {
        let mut blobs = self.blobs.write();
        for file_id in file_ids {
            let key = self.key(org, id, file_id)?;
            blobs.remove(&key);
        }
        Ok(())
    }

    fn del_id(&self, org: &str, id: &str) -> BlobResult<()> {
        let storage_org = self.codec.crypt_org(org)?;
        let storage_id = self.codec.crypt_id(id)?;
        self.blobs
            .write()
            .retain(|(o, i, _), _| !(*o == storage_org && *i == storage_id));
        Ok(())
    }

    fn del_org(&self, org: &str) -> BlobResult<u64> {
        let storage_org = self.codec.crypt_org(org)?;
        let mut blobs = self.blobs.write();
        let before = blobs.len();
        blobs.retain(|(o, _, _), _| *o != storage_org);
        let removed = (before - blobs.len()) as u64;
        tracing::info!(org, removed, "blob purge");
        Ok(removed)
    }

    fn list_files(&self, org: &str, id: &str) -> BlobResult<Vec<String>> {
        let storage_org = self.codec.crypt_org(org)?;
        let storage_id = self.codec.crypt_id(id)?;
        let blobs = self.blobs.read();
        let mut files = Vec::new();
        for (o, i, f) in blobs.keys() {
            if *o == storage_org && *i == storage_id {
                files.push(self.codec.decrypt_id(f)?);
            }
        }
        files.sort();
        Ok(files)
    }

    fn list_ids(&self, org: &str) -> BlobResult<Vec<String>> {
        let storage_org = self.codec.crypt_org(org)?;
        let blobs = self.blobs.read();
        let mut ids = Vec::new();
        let mut last: Option<&String> = None;
        for (o, i, _) in blobs.keys() {
            if *o == storage_org && last != Some(i) {
                ids.push(self.codec.decrypt_id(i)?);
                last = Some(i);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
