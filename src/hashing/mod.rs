//! BLAKE3 fingerprints used as cache keys and deterministic seeds.
//!
//! Images are keyed by content, never by file name: two uploads of the same bytes share
//! one fingerprint regardless of where they came from.

use blake3::Hasher;

/// Full 32-byte content fingerprint of an encoded image.
#[inline]
pub fn fingerprint_image(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

/// Fingerprint of a feature vector's little-endian `f32` bytes.
#[inline]
pub fn hash_vector(values: &[f32]) -> [u8; 32] {
    *blake3::hash(bytemuck::cast_slice(values)).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for seeding deterministic generators, not for keys where a collision would
/// return the wrong cached value. Use the 32-byte helpers for those.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Incremental key builder with field separators, so `("ab", "c")` and `("a", "bc")`
/// never collide.
#[derive(Debug, Clone, Default)]
pub struct KeyHasher {
    inner: Hasher,
}

impl KeyHasher {
    /// Starts a key in the given namespace (e.g. `b"search"`).
    pub fn new(namespace: &[u8]) -> Self {
        let mut inner = Hasher::new();
        inner.update(namespace);
        inner.update(b"|");
        Self { inner }
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.inner.update(&(value.len() as u64).to_le_bytes());
        self.inner.update(value);
        self.inner.update(b"|");
        self
    }

    pub fn vector(self, values: &[f32]) -> Self {
        self.bytes(bytemuck::cast_slice(values))
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.inner.update(&value.to_le_bytes());
        self.inner.update(b"|");
        self
    }

    /// Hashes the exact bit pattern, so `0.7` and `0.70000005` produce different keys.
    pub fn f32(self, value: f32) -> Self {
        self.u64(u64::from(value.to_bits()))
    }

    pub fn str(self, value: &str) -> Self {
        self.bytes(value.as_bytes())
    }

    pub fn opt_str(self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.u64(1).str(v),
            None => self.u64(0),
        }
    }

    pub fn finish(self) -> [u8; 32] {
        *self.inner.finalize().as_bytes()
    }
}
