//! A small pool that lends compressor handles to short-lived callers.
//!
//! Render threads call into the client from many threads, each for a few
//! tiles at a time. Rather than building a fresh zstd context per tile, a
//! caller checks a handle out, uses it, and the guard puts it back on drop.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use super::{Compressor, ImageCodec};
use crate::protocol::codec::CodecError;

/// Lends [`Compressor`] handles created by one [`ImageCodec`].
pub struct CompressorPool {
    codec: Arc<dyn ImageCodec>,
    idle: Mutex<Vec<Box<dyn Compressor>>>,
}

impl CompressorPool {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            codec,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Takes an idle handle, creating one if none is available.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Compression`] if a new handle cannot be created.
    pub fn checkout(&self) -> Result<PooledCompressor<'_>, CodecError> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let handle = match reused {
            Some(handle) => handle,
            None => self.codec.create_compressor()?,
        };
        Ok(PooledCompressor {
            pool: self,
            handle: Some(handle),
        })
    }

    /// Number of handles currently waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn codec(&self) -> &Arc<dyn ImageCodec> {
        &self.codec
    }
}

/// A checked-out handle; returns to its pool when dropped.
pub struct PooledCompressor<'a> {
    pool: &'a CompressorPool,
    handle: Option<Box<dyn Compressor>>,
}

impl Deref for PooledCompressor<'_> {
    type Target = dyn Compressor;

    fn deref(&self) -> &Self::Target {
        // Only `drop` takes the handle out.
        match &self.handle {
            Some(handle) => &**handle,
            None => unreachable!("pooled compressor used after release"),
        }
    }
}

impl DerefMut for PooledCompressor<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.handle {
            Some(handle) => &mut **handle,
            None => unreachable!("pooled compressor used after release"),
        }
    }
}

impl Drop for PooledCompressor<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::ZstdCodec;

    #[test]
    fn test_checkout_returns_handle_on_drop() {
        let pool = CompressorPool::new(Arc::new(ZstdCodec::default()));
        assert_eq!(pool.idle_count(), 0);
        {
            let mut c = pool.checkout().expect("checkout");
            c.compress(&[1, 2, 3, 4], 2, 2, 2).expect("compress");
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_concurrent_checkouts_get_distinct_handles() {
        let pool = CompressorPool::new(Arc::new(ZstdCodec::default()));
        {
            let _a = pool.checkout().expect("checkout");
            let _b = pool.checkout().expect("checkout");
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 2);
        let _c = pool.checkout().expect("checkout");
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_pool_is_shared_across_threads() {
        let pool = Arc::new(CompressorPool::new(Arc::new(ZstdCodec::default())));
        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    let mut c = pool.checkout().expect("checkout");
                    c.compress(&[i; 16], 4, 4, 4).expect("compress").len()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().expect("thread") > 0);
        }
        assert!(pool.idle_count() >= 1);
    }
}
