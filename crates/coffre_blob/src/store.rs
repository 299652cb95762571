//! The blob store trait.

use crate::error::BlobResult;

/// Byte storage for file attachments, addressed by plaintext
/// `(org, id, file_id)` triples.
///
/// Implementations obfuscate every component before it reaches the
/// physical key space and reverse the mapping when listing, so callers
/// only ever see plaintext ids. Deletions are idempotent: removing an
/// absent file, document or organization is not an error.
pub trait BlobStore: Send + Sync {
    /// Stores (or replaces) one attachment.
    fn put_file(&self, org: &str, id: &str, file_id: &str, bytes: &[u8]) -> BlobResult<()>;

    /// Reads one attachment. Fails with [`BlobError::NotFound`] when
    /// absent.
    ///
    /// [`BlobError::NotFound`]: crate::BlobError::NotFound
    fn get_file(&self, org: &str, id: &str, file_id: &str) -> BlobResult<Vec<u8>>;

    /// Removes the named attachments of one document.
    fn del_files(&self, org: &str, id: &str, file_ids: &[String]) -> BlobResult<()>;

    /// Removes every attachment of one document.
    fn del_id(&self, org: &str, id: &str) -> BlobResult<()>;

    /// Removes every attachment of one organization. Part of the
    /// namespace purge path.
    fn del_org(&self, org: &str) -> BlobResult<u64>;

    /// Plaintext file ids attached to one document, sorted.
    fn list_files(&self, org: &str, id: &str) -> BlobResult<Vec<String>>;

    /// Plaintext document ids of the organization that carry
    /// attachments, sorted.
    fn list_ids(&self, org: &str) -> BlobResult<Vec<String>>;
}
