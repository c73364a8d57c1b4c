//! Reference-counted shared buffers
//!
//! Precomputed extended info and published packets are handed out as
//! `SharedBuffer`s: an exact-size, immutable byte slice behind an `Arc`.
//! Releasing is idempotent so error-recovery paths can call it freely.

use std::sync::{Arc, Weak};

use tracing::{trace, warn};

use super::buffer::PacketBuffer;

/// Immutable, reference-counted byte buffer with an explicit release
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Option<Arc<[u8]>>,
}

impl SharedBuffer {
    /// Copy `bytes` into a new buffer sized exactly to them
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            inner: Some(Arc::from(bytes)),
        }
    }

    /// Copy the written contents of a packet buffer
    pub fn from_packet(buffer: &PacketBuffer) -> Self {
        Self::new(buffer.as_bytes())
    }

    /// Bytes of the buffer, empty once released
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Whether this handle has been released
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Number of live handles sharing this buffer (0 once released)
    pub fn ref_count(&self) -> usize {
        self.inner.as_ref().map(Arc::strong_count).unwrap_or(0)
    }

    /// Weak handle used to observe when the last reference is gone
    pub fn downgrade(&self) -> Option<Weak<[u8]>> {
        self.inner.as_ref().map(Arc::downgrade)
    }

    /// Drop this handle's reference.
    ///
    /// Returns the number of references still held elsewhere. Releasing an
    /// already released handle is a no-op.
    pub fn release(&mut self) -> usize {
        match self.inner.take() {
            Some(arc) => {
                let outstanding = Arc::strong_count(&arc) - 1;
                if outstanding > 0 {
                    warn!(
                        outstanding,
                        len = arc.len(),
                        "Released shared buffer that is still referenced"
                    );
                }
                outstanding
            }
            None => {
                trace!("Shared buffer released twice");
                0
            }
        }
    }
}

impl AsRef<[u8]> for SharedBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for SharedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for SharedBuffer {}
