//! Next/previous target selection
//!
//! Pure functions over (index, length, mode); the session applies the result.

use super::mode::PlaybackMode;
use lunar_common::RepeatMode;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum remembered shuffle positions
const HISTORY_LIMIT: usize = 64;

/// What "previous" does while shuffle is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShufflePreviousPolicy {
    /// Pick another random index, excluding the current one
    #[default]
    Random,
    /// Walk back through previously visited indices
    History,
}

/// Result of a selection step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Move the selection to this index
    Move(usize),
    /// Keep the index, seek back to the start
    Restart,
    /// End of list on a natural track end: hold position, stop playing
    Stop,
}

/// Visited indices, most recent last
#[derive(Debug, Clone, Default)]
pub struct History {
    visited: Vec<usize>,
}

impl History {
    pub fn push(&mut self, index: usize) {
        if self.visited.len() == HISTORY_LIMIT {
            self.visited.remove(0);
        }
        self.visited.push(index);
    }

    pub fn clear(&mut self) {
        self.visited.clear();
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Most recent entry that is still a valid, different index
    fn pop_valid(&mut self, current: usize, len: usize) -> Option<usize> {
        while let Some(index) = self.visited.pop() {
            if index < len && index != current {
                return Some(index);
            }
        }
        None
    }
}

/// Uniform index in `[0, len)` other than `current` (when `len > 1`)
pub fn random_excluding<R: Rng + ?Sized>(current: usize, len: usize, rng: &mut R) -> usize {
    if len <= 1 {
        return 0;
    }
    // Sample from len-1 slots and skip over the current one
    let r = rng.gen_range(0..len - 1);
    if r >= current {
        r + 1
    } else {
        r
    }
}

/// Target for "next"; `auto` marks a natural track end
pub fn next_target<R: Rng + ?Sized>(
    current: usize,
    len: usize,
    mode: PlaybackMode,
    auto: bool,
    rng: &mut R,
) -> Option<Advance> {
    if len == 0 {
        return None;
    }

    // Repeat-one only holds on natural ends; a manual skip moves on
    if auto && mode.repeat == RepeatMode::One {
        return Some(Advance::Restart);
    }

    // A lone track has nowhere to shuffle to; the boundary rules apply
    let advance = if mode.shuffle && len > 1 {
        Advance::Move(random_excluding(current, len, rng))
    } else if current + 1 < len {
        Advance::Move(current + 1)
    } else if mode.repeat == RepeatMode::All || !auto {
        Advance::Move(0)
    } else {
        Advance::Stop
    };

    Some(match advance {
        Advance::Move(index) if index == current => Advance::Restart,
        other => other,
    })
}

/// Target for "previous" once the restart threshold has been ruled out
pub fn previous_target<R: Rng + ?Sized>(
    current: usize,
    len: usize,
    mode: PlaybackMode,
    policy: ShufflePreviousPolicy,
    history: &mut History,
    rng: &mut R,
) -> Option<Advance> {
    if len == 0 {
        return None;
    }

    let index = if mode.shuffle {
        match policy {
            ShufflePreviousPolicy::History => history
                .pop_valid(current, len)
                .unwrap_or_else(|| random_excluding(current, len, rng)),
            ShufflePreviousPolicy::Random => random_excluding(current, len, rng),
        }
    } else if current == 0 {
        len - 1
    } else {
        current - 1
    };

    Some(if index == current {
        Advance::Restart
    } else {
        Advance::Move(index)
    })
}
