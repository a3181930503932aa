//! Hashing Primitives
//!
//! Deterministic SHA-256 helpers used for:
//! - Input seeding (the input word read by traversal)
//! - Structural binding of admissibility classes
//! - Configuration fingerprints and artifact manifests

use sha2::{Sha256, Digest};

/// Digest output type (256 bits / 32 bytes)
pub type Digest32 = [u8; 32];

/// Domain separator for input seeding.
pub const INPUT_DOMAIN: &[u8] = b"SSP_INPUT_V1";

/// Domain separator for configuration fingerprints.
pub const CONFIG_DOMAIN: &[u8] = b"SSP_CONFIG_V1";

/// SHA-256 builder that starts with a domain separator.
///
/// Fields are fed in a fixed order; variable-length fields go through
/// [`DomainHasher::update_prefixed`].
pub struct DomainHasher {
    inner: Sha256,
}

impl DomainHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        Self {
            inner: Sha256::new_with_prefix(domain),
        }
    }

    /// Create hasher for identity input seeding.
    pub fn for_input() -> Self {
        Self::new(INPUT_DOMAIN)
    }

    /// Create hasher for configuration fingerprints.
    pub fn for_config() -> Self {
        Self::new(CONFIG_DOMAIN)
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.inner.update(value.to_le_bytes());
    }

    /// Update with a length-prefixed byte string.
    ///
    /// The prefix is a little-endian u32, so fields must stay below 4 GiB.
    /// Every caller feeds inputs of at most 256 bytes or rendered config text.
    #[inline]
    pub fn update_prefixed(&mut self, bytes: &[u8]) {
        debug_assert!(u32::try_from(bytes.len()).is_ok(), "prefixed field exceeds u32 length");
        let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        self.update_u32(len);
        self.update_bytes(bytes);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Digest32 {
        self.inner.finalize().into()
    }
}

/// Compute a plain SHA-256 of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest32 {
    Sha256::digest(data).into()
}

/// Lowercase hex SHA-256 of arbitrary data.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_bytes(data))
}

/// Read the first 8 bytes of a digest as a big-endian u64.
#[inline]
pub fn digest_prefix_u64(digest: &Digest32) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_seed_layout() {
        // domain || len_le_u32 || bytes
        let mut expected = INPUT_DOMAIN.to_vec();
        expected.extend_from_slice(&7u32.to_le_bytes());
        expected.extend_from_slice(b"alpha-7");

        let mut hasher = DomainHasher::for_input();
        hasher.update_prefixed(b"alpha-7");
        assert_eq!(hasher.finalize(), hash_bytes(&expected));
    }

    #[test]
    fn test_length_prefix_spans_bytes() {
        let field = vec![b'a'; 300];
        let mut expected = CONFIG_DOMAIN.to_vec();
        expected.extend_from_slice(&[0x2C, 0x01, 0x00, 0x00]);
        expected.extend_from_slice(&field);

        let mut hasher = DomainHasher::for_config();
        hasher.update_prefixed(&field);
        assert_eq!(hasher.finalize(), hash_bytes(&expected));
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        let split = |a: &[u8], b: &[u8]| {
            let mut hasher = DomainHasher::for_config();
            hasher.update_prefixed(a);
            hasher.update_prefixed(b);
            hasher.finalize()
        };

        assert_ne!(split(b"SSP_", b"V03"), split(b"SSP", b"_V03"));
    }

    #[test]
    fn test_input_and_config_domains_differ() {
        let finish = |mut hasher: DomainHasher| {
            hasher.update_prefixed(b"P1");
            hasher.finalize()
        };

        assert_ne!(finish(DomainHasher::for_input()), finish(DomainHasher::for_config()));
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_prefix_is_big_endian() {
        let mut digest = [0u8; 32];
        digest[7] = 1;
        assert_eq!(digest_prefix_u64(&digest), 1);

        digest[0] = 0x80;
        assert_eq!(digest_prefix_u64(&digest), 0x8000_0000_0000_0001);
    }
}
