//! Content-addressed short key derivation.
//!
//! The key of a URL is the MD5 digest of its bytes, hex-encoded and
//! truncated to [`KEY_LENGTH`] characters. Identical input always yields the
//! identical key, which is what lets the storage layer detect repeated
//! submissions as conflicts.

use md5::{Digest, Md5};

/// Length of a derived short key.
pub const KEY_LENGTH: usize = 7;

/// Derives the short key for `content`.
///
/// Callers are expected to reject empty content before deriving a key;
/// an empty slice still hashes to a valid key.
///
/// # Examples
///
/// ```
/// use url_shortener_store::utils::key_deriver::{derive_key, KEY_LENGTH};
///
/// let key = derive_key(b"https://example.com");
/// assert_eq!(key.len(), KEY_LENGTH);
/// assert_eq!(key, derive_key(b"https://example.com"));
/// ```
pub fn derive_key(content: &[u8]) -> String {
    let digest = Md5::digest(content);
    let mut key = hex::encode(digest);
    key.truncate(KEY_LENGTH);
    key
}
