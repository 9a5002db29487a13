//! Shuffle/repeat policy

use lunar_common::RepeatMode;
use serde::Serialize;

/// Orthogonal selection flags for the primary playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlaybackMode {
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl PlaybackMode {
    pub fn toggle_shuffle(&mut self) -> bool {
        self.shuffle = !self.shuffle;
        self.shuffle
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_repeat_wraps() {
        let mut mode = PlaybackMode::default();
        assert_eq!(mode.cycle_repeat(), RepeatMode::All);
        assert_eq!(mode.cycle_repeat(), RepeatMode::One);
        assert_eq!(mode.cycle_repeat(), RepeatMode::Off);
    }

    #[test]
    fn test_shuffle_independent_of_repeat() {
        let mut mode = PlaybackMode::default();
        mode.cycle_repeat();
        assert!(mode.toggle_shuffle());
        assert_eq!(mode.repeat, RepeatMode::All);
    }
}
