// src/decoder/control.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Commands the decoder thread can handle.
pub enum DecoderCmd {
    /// Jump to an absolute position and drop everything staged before it.
    Seek(Duration),
    /// Stop decoding and let the thread exit.
    Shutdown,
}

/// Seek handshake between the control side, the decoder and the output
/// callback.
///
/// A seek bumps `requested`. Until the output callback has emptied the ring
/// buffer and caught `flushed` up, the decoder must not push new samples,
/// otherwise they would be thrown away with the stale ones.
#[derive(Debug, Default)]
pub struct FlushSync {
    requested: AtomicU64,
    flushed: AtomicU64,
}

impl FlushSync {
    pub fn request(&self) {
        self.requested.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_pending(&self) -> bool {
        self.flushed.load(Ordering::Acquire) != self.requested.load(Ordering::Acquire)
    }

    /// The request the output side has to catch up to, if any.
    pub fn pending_request(&self) -> Option<u64> {
        let requested = self.requested.load(Ordering::Acquire);
        (self.flushed.load(Ordering::Acquire) != requested).then_some(requested)
    }

    /// Called by the output side after it dropped the buffered samples.
    /// `request` is the value read before clearing.
    pub fn acknowledge(&self, request: u64) {
        self.flushed.store(request, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_handshake() {
        let sync = FlushSync::default();
        assert!(!sync.is_pending());

        sync.request();
        let first = sync.pending_request().unwrap();
        sync.request();

        // A request that arrives mid-flush stays pending.
        sync.acknowledge(first);
        assert!(sync.is_pending());

        let second = sync.pending_request().unwrap();
        sync.acknowledge(second);
        assert!(!sync.is_pending());
        assert_eq!(sync.pending_request(), None);
    }
}
