//! On-demand play queue.
//!
//! Pure cursor logic over an ordered list of tracks; no playback side
//! effects. The facade consumes the returned entries and drives the
//! launcher itself.

use player_bridge::{TrackId, TrackRef};
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};

/// Queue wrap behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    Off,
    /// Wrap to the first entry after the last.
    All,
    /// Replay the current entry when it ends naturally.
    One,
}

/// Why the queue is being advanced.
///
/// `RepeatMode::One` replays on a natural end but still moves on when the
/// listener explicitly skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    UserRequest,
    NaturalEnd,
}

/// Ordered track list with a cursor, shuffle, and repeat.
#[derive(Debug, Default)]
pub struct PlayQueue {
    entries: Vec<TrackRef>,
    /// Visit order over `entries`; identity when shuffle is off.
    order: Vec<usize>,
    /// Position within `order`. `None` when the queue is empty or finished.
    cursor: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the queue contents, positioning the cursor at `start`.
    ///
    /// With shuffle on, the `start` entry leads the shuffled order so the
    /// listener hears what they picked first.
    pub fn set_entries(&mut self, entries: Vec<TrackRef>, start: usize) {
        self.entries = entries;
        if self.entries.is_empty() {
            self.order.clear();
            self.cursor = None;
            return;
        }

        let start = start.min(self.entries.len() - 1);
        if self.shuffle {
            self.order = shuffled_with_lead(self.entries.len(), start);
            self.cursor = Some(0);
        } else {
            self.order = (0..self.entries.len()).collect();
            self.cursor = Some(start);
        }
    }

    /// The entry under the cursor.
    pub fn current(&self) -> Option<&TrackRef> {
        let cursor = self.cursor?;
        let entry = *self.order.get(cursor)?;
        self.entries.get(entry)
    }

    /// Moves the cursor to the entry with `id`, if present.
    pub fn jump_to(&mut self, id: TrackId) -> Option<&TrackRef> {
        let entry = self.entries.iter().position(|t| t.id == id)?;
        let position = self.order.iter().position(|&i| i == entry)?;
        self.cursor = Some(position);
        self.current()
    }

    /// Advances the cursor and returns the next entry to play.
    ///
    /// Returns `None` when the queue is over: past the last entry with
    /// repeat off. A finished queue restarts from the top on the next call.
    pub fn advance(&mut self, reason: AdvanceReason) -> Option<&TrackRef> {
        if self.entries.is_empty() {
            return None;
        }

        match self.cursor {
            None => {
                self.cursor = Some(0);
            }
            Some(_) if reason == AdvanceReason::NaturalEnd && self.repeat == RepeatMode::One => {
                return self.current();
            }
            Some(cursor) => {
                let next = cursor + 1;
                if next < self.order.len() {
                    self.cursor = Some(next);
                } else if self.repeat == RepeatMode::Off {
                    self.cursor = None;
                    return None;
                } else {
                    // New pass: a fresh shuffle keeps long sessions varied.
                    if self.shuffle {
                        self.order.shuffle(&mut thread_rng());
                    }
                    self.cursor = Some(0);
                }
            }
        }

        self.current()
    }

    /// Steps the cursor back and returns the previous entry.
    ///
    /// Returns `None` at the first entry unless repeat-all wraps to the
    /// last. The caller typically restarts the current track in that case.
    pub fn step_back(&mut self) -> Option<&TrackRef> {
        if self.entries.is_empty() {
            return None;
        }

        match self.cursor {
            None => {
                self.cursor = Some(self.order.len() - 1);
            }
            Some(0) => {
                if self.repeat == RepeatMode::All {
                    self.cursor = Some(self.order.len() - 1);
                } else {
                    return None;
                }
            }
            Some(cursor) => {
                self.cursor = Some(cursor - 1);
            }
        }

        self.current()
    }

    /// Toggles shuffle, preserving the entry under the cursor.
    pub fn set_shuffle(&mut self, shuffle: bool) {
        if shuffle == self.shuffle {
            return;
        }
        self.shuffle = shuffle;
        if self.entries.is_empty() {
            return;
        }

        let current_entry = self.cursor.and_then(|c| self.order.get(c).copied());
        if shuffle {
            match current_entry {
                Some(entry) => {
                    self.order = shuffled_with_lead(self.entries.len(), entry);
                    self.cursor = Some(0);
                }
                None => {
                    self.order = (0..self.entries.len()).collect();
                    self.order.shuffle(&mut thread_rng());
                }
            }
        } else {
            self.order = (0..self.entries.len()).collect();
            self.cursor = current_entry;
        }
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TrackRef] {
        &self.entries
    }
}

/// A random permutation of `0..len` with `lead` first.
fn shuffled_with_lead(len: usize, lead: usize) -> Vec<usize> {
    let mut rest: Vec<usize> = (0..len).filter(|&i| i != lead).collect();
    rest.shuffle(&mut thread_rng());
    let mut order = Vec::with_capacity(len);
    order.push(lead);
    order.extend(rest);
    order
}
