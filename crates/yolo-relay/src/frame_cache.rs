use crate::frame::Frame;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Slot {
    frame: Option<Arc<Frame>>,
    generation: u64,
}

/// Single-slot "latest frame wins" cache shared between the subscriber
/// callback and the detection loop.
///
/// The lock only covers swapping an `Arc`; the deep copy handed to readers
/// happens after it is released.
#[derive(Clone, Default)]
pub struct FrameCache {
    slot: Arc<Mutex<Slot>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame unconditionally.
    pub fn write(&self, frame: Frame) {
        let frame = Arc::new(frame);
        let mut slot = self.lock();
        slot.frame = Some(frame);
        slot.generation += 1;
    }

    /// Deep copy of the current frame, or `None` if nothing was ever written.
    pub fn read(&self) -> Option<Frame> {
        let shared = self.lock().frame.clone();
        shared.map(|frame| (*frame).clone())
    }

    /// Like [`read`](Self::read), but only if something was written after
    /// generation `seen`. Returns the frame with its generation.
    pub fn read_newer(&self, seen: u64) -> Option<(u64, Frame)> {
        let (generation, shared) = {
            let slot = self.lock();
            if slot.generation <= seen {
                return None;
            }
            (slot.generation, slot.frame.clone())
        };
        shared.map(|frame| (generation, (*frame).clone()))
    }

    /// Number of writes so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panicking writer cannot leave a half-written Arc behind
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn tagged(tag: u32) -> Frame {
        Frame::new(2, 2, 1, tag.to_le_bytes().to_vec()).unwrap()
    }

    fn tag_of(frame: &Frame) -> u32 {
        let bytes: [u8; 4] = frame.as_bytes().try_into().unwrap();
        u32::from_le_bytes(bytes)
    }

    #[test]
    fn test_read_before_write_is_none() {
        let cache = FrameCache::new();
        assert!(cache.read().is_none());
        assert_eq!(cache.generation(), 0);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = FrameCache::new();
        for tag in 1..=10 {
            cache.write(tagged(tag));
        }
        assert_eq!(tag_of(&cache.read().unwrap()), 10);
        assert_eq!(cache.generation(), 10);
    }

    #[test]
    fn test_read_newer_skips_seen_frames() {
        let cache = FrameCache::new();
        assert!(cache.read_newer(0).is_none());

        cache.write(tagged(1));
        let (seen, frame) = cache.read_newer(0).unwrap();
        assert_eq!((seen, tag_of(&frame)), (1, 1));
        assert!(cache.read_newer(seen).is_none());
        // Plain reads still see it
        assert!(cache.read().is_some());

        cache.write(tagged(2));
        cache.write(tagged(3));
        let (seen, frame) = cache.read_newer(seen).unwrap();
        assert_eq!((seen, tag_of(&frame)), (3, 3));
    }

    #[test]
    fn test_read_is_independent_copy() {
        let cache = FrameCache::new();
        cache.write(tagged(7));
        let first = cache.read().unwrap();
        cache.write(tagged(8));
        assert_eq!(tag_of(&first), 7);
        assert_eq!(tag_of(&cache.read().unwrap()), 8);
    }

    #[test]
    fn test_concurrent_readers_never_go_backwards() {
        const WRITES: u32 = 5_000;
        let cache = FrameCache::new();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    let mut last_seen = 0;
                    while last_seen < WRITES {
                        if let Some(frame) = cache.read() {
                            let tag = tag_of(&frame);
                            assert!(tag >= last_seen, "read {} after {}", tag, last_seen);
                            last_seen = tag;
                        }
                    }
                })
            })
            .collect();

        let writer = {
            let cache = cache.clone();
            thread::spawn(move || {
                for tag in 1..=WRITES {
                    cache.write(tagged(tag));
                }
            })
        };

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(tag_of(&cache.read().unwrap()), WRITES);
    }
}
