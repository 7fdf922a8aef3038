use std::collections::BTreeMap;

use super::clock::FrameClock;
use super::loader::LoadedFrame;

/// Bounded store of loaded frames keyed by frame number.
/// When full, the frame that the playhead will reach last is dropped,
/// counting along the play direction and around the wrap.
pub struct FrameCache {
    frames: BTreeMap<i32, LoadedFrame>,
    capacity: usize,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert a frame, evicting relative to the clock's playhead if needed.
    pub fn insert(&mut self, frame: LoadedFrame, clock: &FrameClock) {
        self.frames.insert(frame.frame, frame);

        let playhead = clock.current();
        let direction = clock.direction();
        while self.frames.len() > self.capacity {
            let farthest = self
                .frames
                .keys()
                .copied()
                .max_by_key(|&number| clock.distance(playhead, number, direction));
            match farthest {
                Some(number) => {
                    self.frames.remove(&number);
                }
                None => break,
            }
        }
    }

    pub fn get(&self, frame: i32) -> Option<&LoadedFrame> {
        self.frames.get(&frame)
    }

    pub fn contains(&self, frame: i32) -> bool {
        self.frames.contains_key(&frame)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::clock::Direction;
    use std::time::Duration;

    fn frame(number: i32) -> LoadedFrame {
        LoadedFrame {
            frame: number,
            rgba: vec![0; 4],
            width: 1,
            height: 1,
        }
    }

    /// A forward-playing clock over 1..=100 parked on `playhead`
    fn clock_at(playhead: i32) -> FrameClock {
        let mut clock = FrameClock::new(1, 100, 1.0);
        clock.advance(Duration::from_secs((playhead - 1) as u64));
        assert_eq!(clock.current(), playhead);
        clock
    }

    #[test]
    fn evicts_frames_behind_the_playhead_first() {
        let mut cache = FrameCache::new(3);
        for number in 1..=3 {
            cache.insert(frame(number), &clock_at(1));
        }
        cache.insert(frame(4), &clock_at(2));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(1));
        assert!(cache.contains(2) && cache.contains(3) && cache.contains(4));
    }

    #[test]
    fn keeps_frames_read_ahead_past_the_wrap() {
        let clock = clock_at(95);
        let mut cache = FrameCache::new(32);
        for number in 69..=100 {
            cache.insert(frame(number), &clock);
        }
        cache.insert(frame(1), &clock);

        assert_eq!(cache.len(), 32);
        assert!(cache.contains(1));
        assert!(cache.contains(100));
        // the frame just shown is the last one the playhead comes back to
        assert!(!cache.contains(94));
    }

    #[test]
    fn backward_playback_keeps_lower_frames() {
        let mut clock = clock_at(5);
        clock.toggle(Direction::Backward);
        let mut cache = FrameCache::new(3);
        for number in [5, 6, 4] {
            cache.insert(frame(number), &clock);
        }
        cache.insert(frame(3), &clock);

        assert!(cache.contains(3) && cache.contains(4) && cache.contains(5));
        assert!(!cache.contains(6));
    }

    #[test]
    fn reinserting_replaces_without_growing() {
        let clock = clock_at(5);
        let mut cache = FrameCache::new(2);
        cache.insert(frame(5), &clock);
        cache.insert(frame(5), &clock);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(5).map(|f| f.frame), Some(5));
        assert!(cache.get(6).is_none());
    }

    #[test]
    fn zero_capacity_still_keeps_one_frame() {
        let mut cache = FrameCache::new(0);
        assert!(cache.is_empty());
        cache.insert(frame(1), &clock_at(1));
        cache.insert(frame(2), &clock_at(2));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(2));
    }
}
