//! Row codec: documents to physical rows and back.

use crate::error::{CodecError, CodecResult};
use crate::keys::{TenantKeys, NONCE_SIZE, TAG_SIZE};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use coffre_schema::{Collection, Document, FieldValue, Row};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Separator between the organization and local components of a long id.
///
/// `'@'` is outside the base64url alphabet, so the split stays unambiguous
/// whether or not the components are encrypted. Cleartext org codes and
/// local ids must not contain it.
pub const LONG_ID_SEP: char = '@';

/// Converts documents to physical rows and back, applying the tenant's
/// encryption configuration.
///
/// One codec per tenant; providers compose a codec rather than inheriting
/// from it. All methods are `&self` and the codec is cheap to clone into
/// each provider.
#[derive(Clone)]
pub struct RowCodec {
    keys: TenantKeys,
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for RowCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCodec")
            .field("org", &self.keys.org)
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

impl RowCodec {
    /// Creates a codec for one tenant.
    #[must_use]
    pub fn new(keys: TenantKeys) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(keys.key.as_bytes()));
        Self { keys, cipher }
    }

    /// The tenant configuration this codec applies.
    #[must_use]
    pub fn keys(&self) -> &TenantKeys {
        &self.keys
    }

    /// The tenant's plaintext organization code.
    #[must_use]
    pub fn org(&self) -> &str {
        &self.keys.org
    }

    // ---- payload encryption (random nonce) ----

    /// Encrypts payload bytes. Output is `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        self.seal(&nonce_bytes, plaintext)
    }

    /// Decrypts payload bytes produced by [`encrypt`](Self::encrypt) or
    /// [`crypt_deterministic`](Self::crypt_deterministic).
    pub fn decrypt(&self, ciphertext: &[u8]) -> CodecResult<Vec<u8>> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CodecError::decryption("ciphertext too short"));
        }
        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &ciphertext[NONCE_SIZE..])
            .map_err(|_| CodecError::decryption("decryption error"))
    }

    // ---- id obfuscation (deterministic nonce) ----

    /// Encrypts with a nonce derived from SHA-256(key || plaintext), so
    /// equal inputs map to equal outputs. Required for id columns that
    /// feed equality predicates and bounded range scans.
    pub fn crypt_deterministic(&self, plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        let mut hasher = Sha256::new();
        hasher.update(self.keys.key.as_bytes());
        hasher.update(plaintext);
        let digest = hasher.finalize();
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(&digest[..NONCE_SIZE]);
        self.seal(&nonce_bytes, plaintext)
    }

    fn seal(&self, nonce_bytes: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CodecResult<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CodecError::encryption("encryption error"))?;
        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    fn crypt_component(&self, value: &str, enabled: bool) -> CodecResult<String> {
        if !enabled {
            return Ok(value.to_owned());
        }
        let sealed = self.crypt_deterministic(value.as_bytes())?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decrypt_component(&self, value: &str, enabled: bool) -> CodecResult<String> {
        if !enabled {
            return Ok(value.to_owned());
        }
        let sealed = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| CodecError::malformed_id(format!("not base64url: {e}")))?;
        let plain = self.decrypt(&sealed)?;
        String::from_utf8(plain).map_err(|_| CodecError::malformed_id("id is not UTF-8"))
    }

    /// Storage form of a local id.
    pub fn crypt_id(&self, id: &str) -> CodecResult<String> {
        self.crypt_component(id, self.keys.encrypt_id)
    }

    /// Plaintext local id from its storage form.
    pub fn decrypt_id(&self, id: &str) -> CodecResult<String> {
        self.decrypt_component(id, self.keys.encrypt_id)
    }

    /// Storage form of an organization code.
    pub fn crypt_org(&self, org: &str) -> CodecResult<String> {
        self.crypt_component(org, self.keys.encrypt_org)
    }

    /// Plaintext organization code from its storage form.
    pub fn decrypt_org(&self, org: &str) -> CodecResult<String> {
        self.decrypt_component(org, self.keys.encrypt_org)
    }

    // ---- long ids ----

    /// Tenant-prefixed composite id: `crypt_org(org) @ crypt_id(local)`.
    pub fn long_id(&self, local_id: &str) -> CodecResult<String> {
        Ok(format!(
            "{}{}{}",
            self.crypt_org(&self.keys.org)?,
            LONG_ID_SEP,
            self.crypt_id(local_id)?
        ))
    }

    /// Splits a storage long id and returns the plaintext local id.
    ///
    /// # Errors
    ///
    /// Fails if the id has no separator, cannot be decrypted, or belongs
    /// to another tenant.
    pub fn local_id(&self, long_id: &str) -> CodecResult<String> {
        let (org_part, local_part) = long_id
            .split_once(LONG_ID_SEP)
            .ok_or_else(|| CodecError::malformed_id(format!("no separator in {long_id:?}")))?;
        let row_org = self.decrypt_org(org_part)?;
        if row_org != self.keys.org {
            return Err(CodecError::TenantMismatch {
                row_org,
                codec_org: self.keys.org.clone(),
            });
        }
        self.decrypt_id(local_part)
    }

    /// Half-open storage-key range `[lo, hi)` covering every long id of a
    /// namespace. The upper bound replaces the separator with its
    /// successor byte.
    pub fn ns_bounds(&self, ns: &str) -> CodecResult<(String, String)> {
        let storage_org = self.crypt_org(ns)?;
        let lo = format!("{storage_org}{LONG_ID_SEP}");
        let mut hi = storage_org;
        hi.push((LONG_ID_SEP as u8 + 1) as char);
        Ok((lo, hi))
    }

    /// Storage form of a secondary lookup hash, scoped to the tenant so
    /// equal contact phrases in different organizations do not collide.
    pub fn scoped_secondary(&self, hashed_key: &str) -> CodecResult<String> {
        Ok(format!("{}:{hashed_key}", self.crypt_org(&self.keys.org)?))
    }

    // ---- row conversion ----

    /// Converts a document to its physical row.
    ///
    /// Version and expiry columns are copied verbatim; id, sub-id and
    /// hashed-lookup columns go through the id helpers; the payload is
    /// canonical CBOR of the business fields, encrypted when the tenant
    /// flag is set, and absent for zombies and payload-exempt collections.
    pub fn prepare_row(&self, doc: &Document) -> CodecResult<Row> {
        let id = self.long_id(&doc.id)?;
        let sub_id = match &doc.sub_id {
            Some(s) => Some(self.crypt_id(s)?),
            None => None,
        };

        let mut indexed = BTreeMap::new();
        for attr in doc.collection.schema() {
            if matches!(attr.name, "id" | "ids" | "v") {
                continue;
            }
            let value = doc
                .fields
                .get(attr.name)
                .cloned()
                .unwrap_or_else(|| FieldValue::zero(attr.kind));
            let value = if attr.name == "hps1" {
                let hash = value.as_text().unwrap_or_default();
                FieldValue::Text(self.scoped_secondary(hash)?)
            } else {
                value
            };
            indexed.insert(attr.name, value);
        }

        let payload = if doc.zombie || !doc.collection.has_payload() {
            None
        } else {
            let mut bytes = Vec::new();
            ciborium::ser::into_writer(&doc.fields, &mut bytes)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
            if self.keys.encrypt_payload {
                Some(self.encrypt(&bytes)?)
            } else {
                Some(bytes)
            }
        };

        Ok(Row {
            collection: doc.collection,
            id,
            sub_id,
            version: doc.version,
            indexed,
            payload,
        })
    }

    /// Converts a physical row back to its document.
    ///
    /// Payload-exempt collections synthesize the document from indexed
    /// columns with no decryption; zombie rows decode to a zero-valued
    /// document flagged as deleted.
    pub fn decode_row(&self, row: &Row) -> CodecResult<Document> {
        let mut doc = Document::new(row.collection);
        doc.id = self.local_id(&row.id)?;
        doc.sub_id = match &row.sub_id {
            Some(s) => Some(self.decrypt_id(s)?),
            None => None,
        };
        doc.version = row.version;

        if !row.collection.has_payload() {
            // Cheap path: the whole document lives in indexed columns.
            for (name, value) in &row.indexed {
                doc.fields.insert((*name).to_owned(), value.clone());
            }
            return Ok(doc);
        }

        match &row.payload {
            None => {
                doc.zombie = true;
                Ok(doc)
            }
            Some(payload) => {
                let bytes;
                let plain: &[u8] = if self.keys.encrypt_payload {
                    bytes = self.decrypt(payload)?;
                    &bytes
                } else {
                    payload
                };
                doc.fields = ciborium::de::from_reader(plain)
                    .map_err(|e| CodecError::Decode(e.to_string()))?;
                Ok(doc)
            }
        }
    }
}
