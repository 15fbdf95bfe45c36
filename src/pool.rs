//! Fixed-size reusable byte buffer pool with scoped return-on-drop (spec §4.4).
//!
//! A single mutex guards an O(1) critical section (a `Vec<Vec<u8>>` used as a free
//! list); acquiring under exhaustion grows the pool by allocating one more buffer,
//! which is still returned on release, so the pool only ever grows, never shrinks.

use std::sync::{Arc, Mutex};

struct Inner {
    buffer_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

impl BufferPool {
    pub fn new(buffer_size: usize, initial_count: usize) -> Self {
        let free = (0..initial_count).map(|_| vec![0u8; buffer_size]).collect();
        Self {
            inner: Arc::new(Inner {
                buffer_size,
                free: Mutex::new(free),
            }),
        }
    }

    /// Acquires a buffer, allocating a new one if the free list is exhausted. The
    /// returned handle puts the buffer back on drop.
    pub fn acquire(&self) -> PooledBuffer {
        let buf = {
            let mut free = self.inner.free.lock().unwrap();
            free.pop()
        }
        .unwrap_or_else(|| vec![0u8; self.inner.buffer_size]);

        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of buffers currently sitting idle in the pool (for tests/diagnostics).
    pub fn free_count(&self) -> usize {
        self.inner.free.lock().unwrap().len()
    }
}

/// A buffer on loan from a [`BufferPool`]. Returned to the pool automatically when
/// dropped; `Deref`/`DerefMut` give transparent access to the underlying bytes.
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: Arc<Inner>,
}

impl std::ops::Deref for PooledBuffer {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().expect("buffer taken before drop")
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().expect("buffer taken before drop")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.iter_mut().for_each(|b| *b = 0);
            self.pool.free.lock().unwrap().push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn preallocates_initial_count() {
        let pool = BufferPool::new(64, 4);
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn acquire_shrinks_and_release_restores_free_count() {
        let pool = BufferPool::new(64, 2);
        let a = pool.acquire();
        assert_eq!(pool.free_count(), 1);
        let b = pool.acquire();
        assert_eq!(pool.free_count(), 0);
        drop(a);
        assert_eq!(pool.free_count(), 1);
        drop(b);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn exhaustion_grows_pool_instead_of_blocking() {
        let pool = BufferPool::new(8, 1);
        let a = pool.acquire();
        let b = pool.acquire(); // pool was exhausted, should allocate rather than panic/block
        assert_eq!(pool.free_count(), 0);
        drop(a);
        drop(b);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn concurrent_acquire_release_never_double_hands_out_a_buffer() {
        let pool = BufferPool::new(32, 4);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let mut buf = pool.acquire();
                        buf[0] = 1;
                        assert_eq!(buf.len(), 32);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.free_count() >= 4);
    }

    #[test]
    fn deref_exposes_buffer_contents() {
        let pool = BufferPool::new(4, 1);
        let mut buf = pool.acquire();
        buf[0] = 7;
        assert_eq!(buf.as_slice(), &[7, 0, 0, 0]);
    }

    fn _assert_send_sync<T: Send + Sync>() {}
    #[test]
    fn pool_is_send_and_sync() {
        _assert_send_sync::<Arc<BufferPool>>();
    }
}
