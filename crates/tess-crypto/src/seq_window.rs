//! Replay window over wrapping 32-bit sequence numbers.
//!
//! Remembers the highest accepted sequence number and a bitmap of the 128
//! numbers at or below it. Anything older than the bitmap, or already marked
//! in it, is a replay. Distance is measured with wrapping arithmetic, so the
//! window keeps working across the `u32::MAX -> 0` boundary.
//!
//! Not thread-safe; it lives inside a session that is `&mut`-only.

/// Number of sequence numbers tracked behind the highest one.
pub const WINDOW_SIZE: u32 = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceWindow {
    /// Highest accepted sequence number
    highest: u32,
    /// Bit n set = `highest - n` accepted
    bitmap: u128,
    /// Whether anything has been accepted yet
    primed: bool,
}

impl SequenceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a window from saved parts.
    pub fn from_parts(highest: u32, bitmap: u128, primed: bool) -> Self {
        Self {
            highest,
            bitmap,
            primed,
        }
    }

    /// Signed distance of `seq` ahead of the highest accepted number.
    fn distance(&self, seq: u32) -> i64 {
        i64::from(seq.wrapping_sub(self.highest) as i32)
    }

    /// Whether `seq` has not been accepted yet. Does not update state.
    pub fn check(&self, seq: u32) -> bool {
        if !self.primed {
            return true;
        }

        let ahead = self.distance(seq);
        if ahead > 0 {
            return true;
        }

        let offset = -ahead;
        if offset >= i64::from(WINDOW_SIZE) {
            return false;
        }
        self.bitmap & (1u128 << offset) == 0
    }

    /// Mark `seq` accepted. Returns `false`, leaving state untouched, on replay.
    pub fn check_and_update(&mut self, seq: u32) -> bool {
        if !self.check(seq) {
            return false;
        }

        if !self.primed {
            self.highest = seq;
            self.bitmap = 1;
            self.primed = true;
            return true;
        }

        let ahead = self.distance(seq);
        if ahead > 0 {
            if ahead >= i64::from(WINDOW_SIZE) {
                self.bitmap = 1;
            } else {
                self.bitmap = (self.bitmap << ahead) | 1;
            }
            self.highest = seq;
        } else {
            self.bitmap |= 1u128 << (-ahead);
        }
        true
    }

    pub fn highest(&self) -> u32 {
        self.highest
    }

    pub fn bitmap(&self) -> u128 {
        self.bitmap
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential() {
        let mut window = SequenceWindow::new();
        for seq in 1..=300 {
            assert!(window.check_and_update(seq), "seq {} should be accepted", seq);
        }
        assert_eq!(window.highest(), 300);
    }

    #[test]
    fn test_replay_detection() {
        let mut window = SequenceWindow::new();

        assert!(window.check_and_update(1));
        assert!(window.check_and_update(2));
        assert!(window.check_and_update(3));

        assert!(!window.check_and_update(1));
        assert!(!window.check_and_update(2));
        assert!(!window.check_and_update(3));
    }

    #[test]
    fn test_zero_is_a_valid_first_sequence() {
        let mut window = SequenceWindow::new();
        assert!(window.check_and_update(0));
        assert!(!window.check_and_update(0));
    }

    #[test]
    fn test_out_of_order() {
        let mut window = SequenceWindow::new();

        assert!(window.check_and_update(5));
        assert!(window.check_and_update(3));
        assert!(window.check_and_update(4));
        assert!(window.check_and_update(1));
        assert!(window.check_and_update(2));

        for seq in 1..=5 {
            assert!(!window.check_and_update(seq));
        }
    }

    #[test]
    fn test_older_than_window_rejected() {
        let mut window = SequenceWindow::new();
        assert!(window.check_and_update(1000));
        assert!(window.check(1000 - 127));
        assert!(!window.check(1000 - 128));
    }

    #[test]
    fn test_large_jump_resets_bitmap() {
        let mut window = SequenceWindow::new();
        assert!(window.check_and_update(1));
        assert!(window.check_and_update(1000));
        assert_eq!(window.bitmap(), 1);
        assert!(!window.check_and_update(1));
    }

    #[test]
    fn test_wraps_around() {
        let mut window = SequenceWindow::new();
        assert!(window.check_and_update(u32::MAX - 1));
        assert!(window.check_and_update(u32::MAX));
        assert!(window.check_and_update(0));
        assert!(window.check_and_update(1));
        assert_eq!(window.highest(), 1);

        assert!(!window.check_and_update(u32::MAX));
        assert!(!window.check_and_update(u32::MAX - 1));
        assert!(window.check_and_update(u32::MAX - 2));
    }

    #[test]
    fn test_check_does_not_update() {
        let mut window = SequenceWindow::new();
        assert!(window.check_and_update(1));

        assert!(window.check(2));
        assert!(window.check(2));

        assert!(window.check_and_update(2));
        assert!(!window.check(2));
    }

    #[test]
    fn test_parts_restore() {
        let mut window = SequenceWindow::new();
        for seq in [10, 12, 11, 15] {
            assert!(window.check_and_update(seq));
        }

        let restored =
            SequenceWindow::from_parts(window.highest(), window.bitmap(), window.is_primed());
        assert_eq!(restored, window);
        assert!(!restored.check(12));
        assert!(restored.check(13));
    }
}
