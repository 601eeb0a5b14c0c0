//! Immutable cached values

use std::fmt;

use bytes::Bytes;

use crate::lru::Value;

/// An immutable view of bytes
///
/// Cloning is cheap (reference counted). Callers only ever receive copies or
/// shared read-only views, so cached state cannot be modified through a view.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    b: Bytes,
}

impl ByteView {
    /// Build a view from a copy of `data`
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            b: Bytes::copy_from_slice(data),
        }
    }

    /// Length of the view in bytes
    pub fn len(&self) -> usize {
        self.b.len()
    }

    /// Whether the view holds no bytes
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Returns a copy of the data as a byte vector
    pub fn to_vec(&self) -> Vec<u8> {
        self.b.to_vec()
    }

    /// Shared handle to the underlying buffer, for zero-copy writes
    pub fn bytes(&self) -> Bytes {
        self.b.clone()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self { b: Bytes::from(data) }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        Self::copy_from_slice(data)
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.b
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByteView").field(&self.b).finish()
    }
}

impl Value for ByteView {
    fn size(&self) -> usize {
        self.len()
    }
}
