use image::DynamicImage;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramePoolStats {
    pub outstanding: usize,
    pub acquired: u64,
    pub released: u64,
    pub skipped: u64,
}

struct PoolInner {
    capacity: usize,
    outstanding: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
    skipped: AtomicU64,
}

/// Bounded pool of in-flight camera frames.
///
/// A frame slot is taken by [`FramePool::acquire`] and given back when the
/// returned [`Frame`] is dropped, so every code path releases it exactly once.
#[derive(Clone)]
pub struct FramePool {
    inner: Arc<PoolInner>,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity: capacity.max(1),
                outstanding: AtomicUsize::new(0),
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
            }),
        }
    }

    /// Returns `None` when every slot is in use; the frame is skipped.
    pub fn acquire(&self, image: DynamicImage) -> Option<Frame> {
        let inner = &self.inner;
        let taken = inner
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < inner.capacity).then_some(n + 1)
            })
            .is_ok();

        if !taken {
            inner.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("frame pool exhausted, skipping frame");
            return None;
        }

        let sequence = inner.acquired.fetch_add(1, Ordering::Relaxed);
        Some(Frame {
            image,
            sequence,
            pool: Arc::clone(inner),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn stats(&self) -> FramePoolStats {
        FramePoolStats {
            outstanding: self.inner.outstanding.load(Ordering::Acquire),
            acquired: self.inner.acquired.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
        }
    }
}

pub struct Frame {
    image: DynamicImage,
    sequence: u64,
    pool: Arc<PoolInner>,
}

impl Frame {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Deref for Frame {
    type Target = DynamicImage;

    fn deref(&self) -> &DynamicImage {
        &self.image
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.pool.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
    }

    #[test]
    fn dropping_a_frame_releases_its_slot() {
        let pool = FramePool::new(2);
        let frame = pool.acquire(image()).unwrap();
        assert_eq!(pool.stats().outstanding, 1);
        drop(frame);

        let stats = pool.stats();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.released, 1);
    }

    #[test]
    fn exhausted_pool_skips_frames() {
        let pool = FramePool::new(1);
        let held = pool.acquire(image()).unwrap();
        assert!(pool.acquire(image()).is_none());
        assert_eq!(pool.stats().skipped, 1);

        drop(held);
        assert!(pool.acquire(image()).is_some());
    }

    #[test]
    fn frames_are_numbered_in_acquisition_order() {
        let pool = FramePool::new(4);
        let a = pool.acquire(image()).unwrap();
        let b = pool.acquire(image()).unwrap();
        assert_eq!(a.sequence(), 0);
        assert_eq!(b.sequence(), 1);
        assert_eq!(b.width(), 4);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        assert_eq!(FramePool::new(0).capacity(), 1);
    }

    #[test]
    fn frame_moved_to_another_thread_is_still_released() {
        let pool = FramePool::new(1);
        let frame = pool.acquire(image()).unwrap();
        std::thread::spawn(move || drop(frame)).join().unwrap();
        assert_eq!(pool.stats().released, 1);
        assert_eq!(pool.stats().outstanding, 0);
    }
}
